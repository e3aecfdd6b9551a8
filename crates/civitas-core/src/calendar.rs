//! Game calendar: converts ticks into days, weeks, months and years.
//!
//! A year has 365 days split into the usual twelve months. Weeks are
//! counted from the start of the game (every seventh day), not from the
//! start of the month.

use crate::fixed::Ticks;
use serde::{Deserialize, Serialize};

const MONTH_LENGTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Days in a game year.
pub const DAYS_PER_YEAR: u32 = 365;

/// Days in a game week.
pub const DAYS_PER_WEEK: u32 = 7;

/// A calendar date, stored as days elapsed since the first day of the game.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimDate {
    days: u32,
}

impl SimDate {
    pub fn from_days(days: u32) -> Self {
        Self { days }
    }

    pub fn days(self) -> u32 {
        self.days
    }

    /// Zero-based year index.
    pub fn year(self) -> u32 {
        self.days / DAYS_PER_YEAR
    }

    /// Zero-based month index (0 = January).
    pub fn month(self) -> u32 {
        let mut rem = self.days % DAYS_PER_YEAR;
        for (month, &len) in MONTH_LENGTHS.iter().enumerate() {
            if rem < len {
                return month as u32;
            }
            rem -= len;
        }
        11
    }

    /// One-based day of the month.
    pub fn day_of_month(self) -> u32 {
        let mut rem = self.days % DAYS_PER_YEAR;
        for &len in &MONTH_LENGTHS {
            if rem < len {
                return rem + 1;
            }
            rem -= len;
        }
        rem + 1
    }

    pub fn add_days(self, days: u32) -> Self {
        Self {
            days: self.days.saturating_add(days),
        }
    }

    /// Whole days from `earlier` to `self`, zero if `earlier` is later.
    pub fn days_since(self, earlier: SimDate) -> u32 {
        self.days.saturating_sub(earlier.days)
    }
}

/// Which calendar boundaries a tick crossed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateChange {
    pub day: bool,
    pub week: bool,
    pub month: bool,
    pub year: bool,
}

/// Tick counter with a fixed number of ticks per game day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    tick: Ticks,
    ticks_per_day: u32,
}

impl Calendar {
    /// A calendar at tick zero. `ticks_per_day` is clamped to at least 1.
    pub fn new(ticks_per_day: u32) -> Self {
        Self {
            tick: 0,
            ticks_per_day: ticks_per_day.max(1),
        }
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn ticks_per_day(&self) -> u32 {
        self.ticks_per_day
    }

    pub fn date(&self) -> SimDate {
        SimDate::from_days((self.tick / self.ticks_per_day as u64) as u32)
    }

    /// Advance one tick and report the boundaries crossed.
    pub fn advance(&mut self) -> DateChange {
        let before = self.date();
        self.tick += 1;
        let after = self.date();

        if before == after {
            return DateChange::default();
        }

        DateChange {
            day: true,
            week: after.days() % DAYS_PER_WEEK == 0,
            month: after.month() != before.month(),
            year: after.year() != before.year(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_boundaries() {
        assert_eq!(SimDate::from_days(0).month(), 0);
        assert_eq!(SimDate::from_days(30).month(), 0);
        assert_eq!(SimDate::from_days(31).month(), 1);
        assert_eq!(SimDate::from_days(31).day_of_month(), 1);
        assert_eq!(SimDate::from_days(58).month(), 1);
        assert_eq!(SimDate::from_days(59).month(), 2);
        assert_eq!(SimDate::from_days(364).month(), 11);
        assert_eq!(SimDate::from_days(364).day_of_month(), 31);
        assert_eq!(SimDate::from_days(365).year(), 1);
        assert_eq!(SimDate::from_days(365).month(), 0);
    }

    #[test]
    fn advance_reports_day_and_week() {
        let mut cal = Calendar::new(2);
        let first = cal.advance();
        assert!(!first.day);
        let second = cal.advance();
        assert!(second.day);
        assert!(!second.week);

        let mut weeks = 0;
        for _ in 0..(2 * 14 - 2) {
            if cal.advance().week {
                weeks += 1;
            }
        }
        assert_eq!(cal.date().days(), 14);
        assert_eq!(weeks, 2);
    }

    #[test]
    fn advance_reports_month_and_year() {
        let mut cal = Calendar::new(1);
        let mut months = 0;
        let mut years = 0;
        for _ in 0..DAYS_PER_YEAR {
            let change = cal.advance();
            if change.month {
                months += 1;
            }
            if change.year {
                years += 1;
            }
        }
        assert_eq!(months, 12);
        assert_eq!(years, 1);
    }

    #[test]
    fn zero_ticks_per_day_is_clamped() {
        let mut cal = Calendar::new(0);
        assert_eq!(cal.ticks_per_day(), 1);
        assert!(cal.advance().day);
    }

    #[test]
    fn days_since_saturates() {
        let a = SimDate::from_days(10);
        let b = SimDate::from_days(25);
        assert_eq!(b.days_since(a), 15);
        assert_eq!(a.days_since(b), 0);
    }
}
