//! Factory production: converts one good into another over game days.
//!
//! A [`ProductionUnit`] owns a small [`GoodStore`] with an input slot and
//! an output slot. Each cycle it pulls `consume_qty` units of input,
//! accumulates fractional progress every game day in proportion to its
//! yearly rate and staffing, and commits `finished_qty` units of output
//! when progress reaches 100.

use crate::calendar::{DAYS_PER_YEAR, SimDate};
use crate::fixed::Fixed64;
use crate::good::{Good, GoodStock};
use crate::rng::RandomSource;
use crate::store::GoodStore;
use crate::workforce::Workforce;
use serde::{Deserialize, Serialize};

/// Progress at which a batch is complete.
pub const PROGRESS_COMPLETE: i32 = 100;

/// Upper clamp for accumulated progress.
pub const PROGRESS_MAX: i32 = 101;

/// Minimum output stock before a cart is sent.
pub const DELIVERY_THRESHOLD: u32 = 100;

/// Largest input pull requested per supplier trip.
pub const SUPPLY_REQUEST: u32 = 100;

/// Weeks of understaffing after which a collapse roll is made.
pub const UNWORKED_GRACE_WEEKS: u32 = 8;

/// Upper bound (exclusive) of the weekly collapse roll.
pub const COLLAPSE_ROLL: u32 = 42;

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// Static parameters of a production building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionSpec {
    /// Consumed good; `None` for raw producers (farms, pits, mines).
    pub input: Option<Good>,
    pub output: Good,
    /// Batches of progress per game year at full staffing.
    pub rate: Fixed64,
    pub store_capacity: u32,
    pub input_capacity: u32,
    pub output_capacity: u32,
    pub finished_qty: u32,
    pub consume_qty: u32,
    /// Zero disables the collapse check.
    pub max_unworking_weeks: u32,
    /// Produced goods spoil this many days after production.
    pub shelf_life_days: Option<u32>,
}

impl ProductionSpec {
    /// A spec with the usual factory capacities and batch sizes.
    pub fn new(input: Option<Good>, output: Good, rate: Fixed64) -> Self {
        Self {
            input,
            output,
            rate,
            store_capacity: 1000,
            input_capacity: 200,
            output_capacity: 100,
            finished_qty: 100,
            consume_qty: 100,
            max_unworking_weeks: 0,
            shelf_life_days: None,
        }
    }
}

// ---------------------------------------------------------------------------
// State reporting
// ---------------------------------------------------------------------------

/// Why a production unit cannot make progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallReason {
    NoWorkers,
    Inactive,
    MissingInput,
    OutputFull,
}

/// Observable state of a production unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductionState {
    Idle,
    Producing { progress: u32 },
    Stalled { reason: StallReason },
}

/// The outcome of one production step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionOutcome {
    /// Input pulled from the store to start a batch.
    pub consumed: Option<(Good, u32)>,
    /// Output committed to the store.
    pub produced: Option<(Good, u32)>,
    /// The unit started or finished a batch this step.
    pub state_changed: bool,
}

// ---------------------------------------------------------------------------
// ProductionUnit
// ---------------------------------------------------------------------------

/// Runtime state of a factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionUnit {
    input: Option<Good>,
    output: Good,
    progress: Fixed64,
    production_rate: Fixed64,
    active: bool,
    producing: bool,
    finished_qty: u32,
    consume_qty: u32,
    max_unworking_weeks: u32,
    low_worker_weeks: u32,
    shelf_life_days: Option<u32>,
    store: GoodStore,
}

impl ProductionUnit {
    pub fn new(spec: &ProductionSpec) -> Self {
        let mut goods = vec![(spec.output, spec.output_capacity)];
        if let Some(input) = spec.input {
            goods.push((input, spec.input_capacity));
        }
        Self {
            input: spec.input,
            output: spec.output,
            progress: Fixed64::ZERO,
            production_rate: spec.rate,
            active: true,
            producing: false,
            finished_qty: spec.finished_qty,
            consume_qty: spec.consume_qty,
            max_unworking_weeks: spec.max_unworking_weeks,
            low_worker_weeks: 0,
            shelf_life_days: spec.shelf_life_days,
            store: GoodStore::with_goods(spec.store_capacity, &goods),
        }
    }

    // -- Accessors --

    pub fn input(&self) -> Option<Good> {
        self.input
    }

    pub fn output(&self) -> Good {
        self.output
    }

    /// Accumulated progress in `[0, 101]`.
    pub fn progress(&self) -> Fixed64 {
        self.progress
    }

    /// Progress rounded down and clamped to `[0, 100]` for display.
    pub fn progress_percent(&self) -> u32 {
        self.progress
            .to_num::<i32>()
            .clamp(0, PROGRESS_COMPLETE) as u32
    }

    pub fn production_rate(&self) -> Fixed64 {
        self.production_rate
    }

    pub fn set_production_rate(&mut self, rate: Fixed64) {
        self.production_rate = rate;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Switch production on or off (trade advisor "stop production").
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_producing(&self) -> bool {
        self.producing
    }

    pub fn low_worker_weeks(&self) -> u32 {
        self.low_worker_weeks
    }

    pub fn store(&self) -> &GoodStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GoodStore {
        &mut self.store
    }

    /// Quantity of input on hand.
    pub fn input_quantity(&self) -> u32 {
        self.input.map_or(0, |g| self.store.quantity(g))
    }

    pub fn output_quantity(&self) -> u32 {
        self.store.quantity(self.output)
    }

    /// Space available for deliveries of `good`. An unstaffed factory
    /// accepts nothing.
    pub fn max_store(&self, good: Good, workforce: Workforce) -> u32 {
        if !workforce.has_workers() {
            return 0;
        }
        self.store.max_store(good)
    }

    // -- Production --

    /// Whether the unit can make progress right now.
    pub fn may_work(&self, workforce: Workforce) -> bool {
        self.trouble(workforce).is_none()
    }

    /// The first reason the unit cannot make progress, if any.
    pub fn trouble(&self, workforce: Workforce) -> Option<StallReason> {
        if !workforce.has_workers() {
            return Some(StallReason::NoWorkers);
        }
        if !self.active {
            return Some(StallReason::Inactive);
        }
        if self.input.is_some() && !self.producing && self.input_quantity() == 0 {
            return Some(StallReason::MissingInput);
        }
        if self.store.free_capacity(self.output) == 0 {
            return Some(StallReason::OutputFull);
        }
        None
    }

    pub fn state(&self, workforce: Workforce) -> ProductionState {
        if let Some(reason) = self.trouble(workforce) {
            return ProductionState::Stalled { reason };
        }
        if self.producing {
            ProductionState::Producing {
                progress: self.progress_percent(),
            }
        } else {
            ProductionState::Idle
        }
    }

    /// Run one simulation step.
    ///
    /// Progress advances only on day boundaries, by
    /// `rate / 365 * labor_fraction`. A completed batch is committed only
    /// when the output slot has room for all of it; otherwise the unit
    /// holds its progress until a cart empties the slot.
    pub fn step(&mut self, workforce: Workforce, today: SimDate, day_changed: bool) -> ProductionOutcome {
        let mut outcome = ProductionOutcome::default();
        if !self.may_work(workforce) {
            return outcome;
        }

        if self.progress >= Fixed64::from_num(PROGRESS_COMPLETE) {
            if self.producing {
                self.producing = false;
                outcome.state_changed = true;
            }
            if self.store.free_capacity(self.output) >= self.finished_qty {
                self.progress -= Fixed64::from_num(PROGRESS_COMPLETE);
                let mut batch =
                    GoodStock::filled(self.output, self.finished_qty, self.finished_qty);
                if let Some(days) = self.shelf_life_days {
                    batch = batch.with_expiry(today.add_days(days));
                }
                let stored = self.store.store(&mut batch, self.finished_qty);
                outcome.produced = Some((self.output, stored));
            }
        } else if self.producing && day_changed {
            let per_day = self.production_rate / Fixed64::from_num(DAYS_PER_YEAR);
            let increment = per_day * workforce.labor_fraction();
            self.progress = (self.progress + increment)
                .clamp(Fixed64::ZERO, Fixed64::from_num(PROGRESS_MAX));
        }

        if !self.producing {
            match self.input {
                None => {
                    self.producing = true;
                    outcome.state_changed = true;
                }
                Some(input) => {
                    if self.store.quantity(input) >= self.consume_qty
                        && self.output_quantity() < DELIVERY_THRESHOLD
                    {
                        let mut pulled = GoodStock::new(input, self.consume_qty);
                        let taken = self.store.retrieve(&mut pulled, self.consume_qty);
                        self.producing = true;
                        outcome.consumed = Some((input, taken));
                        outcome.state_changed = true;
                    }
                }
            }
        }

        outcome
    }

    /// Weekly staffing review. Returns `true` when the building collapses
    /// from being left unworked too long.
    pub fn weekly_review(&mut self, workforce: Workforce, rng: &mut impl RandomSource) -> bool {
        if self.max_unworking_weeks == 0 {
            return false;
        }
        if workforce.is_understaffed() || !workforce.has_workers() {
            self.low_worker_weeks += 1;
        } else {
            self.low_worker_weeks = self.low_worker_weeks.saturating_sub(1);
        }
        self.low_worker_weeks > UNWORKED_GRACE_WEEKS
            && self.low_worker_weeks > rng.below(COLLAPSE_ROLL)
    }

    /// Discard spoiled goods from the unit's store.
    pub fn remove_spoiled(&mut self, today: SimDate) -> Vec<(Good, u32)> {
        self.store.remove_expired(today)
    }

    // -- Logistics --

    /// How much input a supplier should fetch: up to [`SUPPLY_REQUEST`],
    /// bounded by free input space. `None` for raw producers or when no
    /// space is free.
    pub fn supply_request(&self, workforce: Workforce) -> Option<(Good, u32)> {
        let input = self.input?;
        let qty = self.max_store(input, workforce).min(SUPPLY_REQUEST);
        (qty > 0).then_some((input, qty))
    }

    /// Load a cart with up to `cart_capacity` units of output once at least
    /// [`DELIVERY_THRESHOLD`] units are waiting.
    pub fn load_cart(&mut self, cart_capacity: u32) -> Option<GoodStock> {
        let qty = self.output_quantity();
        if qty < DELIVERY_THRESHOLD {
            return None;
        }
        let mut cart = GoodStock::new(self.output, cart_capacity);
        self.store.retrieve(&mut cart, qty.min(cart_capacity));
        Some(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64;

    struct AlwaysZero;

    impl RandomSource for AlwaysZero {
        fn below(&mut self, _bound: u32) -> u32 {
            0
        }
    }

    struct AlwaysMax;

    impl RandomSource for AlwaysMax {
        fn below(&mut self, bound: u32) -> u32 {
            bound.saturating_sub(1)
        }
    }

    fn pottery() -> ProductionUnit {
        ProductionUnit::new(&ProductionSpec::new(
            Some(Good::Clay),
            Good::Pottery,
            f64_to_fixed64(9.6),
        ))
    }

    fn clay_pit() -> ProductionUnit {
        let mut spec = ProductionSpec::new(None, Good::Clay, f64_to_fixed64(9.6));
        spec.max_unworking_weeks = 12;
        ProductionUnit::new(&spec)
    }

    fn fill_input(unit: &mut ProductionUnit, qty: u32) {
        let good = unit.input().unwrap();
        let mut load = GoodStock::filled(good, qty, qty);
        unit.store_mut().store(&mut load, qty);
    }

    fn today() -> SimDate {
        SimDate::from_days(0)
    }

    // -----------------------------------------------------------------------
    // Test 1: Full production cycle with fractional carry-over
    // -----------------------------------------------------------------------
    #[test]
    fn full_cycle_commits_one_batch() {
        let mut unit = pottery();
        fill_input(&mut unit, 150);
        let staff = Workforce::full(8);
        let per_day = f64_to_fixed64(9.6) / Fixed64::from_num(365);

        let first = unit.step(staff, today(), true);
        assert_eq!(first.consumed, Some((Good::Clay, 100)));
        assert_eq!(unit.input_quantity(), 50);

        let mut produced = None;
        for _ in 0..10_000 {
            let outcome = unit.step(staff, today(), true);
            if outcome.produced.is_some() {
                produced = outcome.produced;
                break;
            }
        }

        assert_eq!(produced, Some((Good::Pottery, 100)));
        assert_eq!(unit.output_quantity(), 100);
        assert!(unit.progress() < per_day);
        assert!(unit.progress() >= Fixed64::ZERO);
        assert_eq!(unit.input_quantity(), 50);
    }

    // -----------------------------------------------------------------------
    // Test 2: Progress only advances on day boundaries
    // -----------------------------------------------------------------------
    #[test]
    fn progress_waits_for_day_change() {
        let mut unit = clay_pit();
        let staff = Workforce::full(10);
        unit.step(staff, today(), false);
        assert!(unit.is_producing());
        unit.step(staff, today(), false);
        assert_eq!(unit.progress(), Fixed64::ZERO);
        unit.step(staff, today(), true);
        assert!(unit.progress() > Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Test 3: Staffing scales daily progress
    // -----------------------------------------------------------------------
    #[test]
    fn half_staff_half_speed() {
        let mut full = clay_pit();
        let mut half = clay_pit();
        for _ in 0..10 {
            full.step(Workforce::full(10), today(), true);
            half.step(Workforce::new(5, 10), today(), true);
        }
        let diff = (half.progress() * Fixed64::from_num(2) - full.progress()).abs();
        assert!(diff <= Fixed64::from_bits(16), "diff {diff}");
        assert!(half.progress() > Fixed64::ZERO);
    }

    // -----------------------------------------------------------------------
    // Test 4: Gating conditions
    // -----------------------------------------------------------------------
    #[test]
    fn no_workers_means_no_work() {
        let mut unit = clay_pit();
        let outcome = unit.step(Workforce::new(0, 10), today(), true);
        assert_eq!(outcome, ProductionOutcome::default());
        assert_eq!(unit.trouble(Workforce::new(0, 10)), Some(StallReason::NoWorkers));
        assert!(!unit.is_producing());
    }

    #[test]
    fn inactive_unit_does_not_work() {
        let mut unit = clay_pit();
        unit.set_active(false);
        assert_eq!(unit.trouble(Workforce::full(10)), Some(StallReason::Inactive));
        unit.step(Workforce::full(10), today(), true);
        assert!(!unit.is_producing());
    }

    #[test]
    fn missing_input_stalls() {
        let unit = pottery();
        assert_eq!(
            unit.state(Workforce::full(8)),
            ProductionState::Stalled {
                reason: StallReason::MissingInput
            }
        );
    }

    #[test]
    fn input_below_consume_qty_does_not_start() {
        let mut unit = pottery();
        fill_input(&mut unit, 60);
        let outcome = unit.step(Workforce::full(8), today(), true);
        assert!(outcome.consumed.is_none());
        assert!(!unit.is_producing());
        assert_eq!(unit.input_quantity(), 60);
    }

    // -----------------------------------------------------------------------
    // Test 5: Full output holds progress and loses nothing
    // -----------------------------------------------------------------------
    #[test]
    fn full_output_blocks_commit() {
        let mut spec = ProductionSpec::new(None, Good::Clay, f64_to_fixed64(365.0 * 200.0));
        spec.output_capacity = 150;
        let mut unit = ProductionUnit::new(&spec);
        let staff = Workforce::full(10);

        // 200 progress per day: start, overflow to 101, commit.
        unit.step(staff, today(), true);
        unit.step(staff, today(), true);
        assert_eq!(unit.progress(), Fixed64::from_num(PROGRESS_MAX));
        let outcome = unit.step(staff, today(), true);
        assert_eq!(outcome.produced, Some((Good::Clay, 100)));

        // Second batch: only 50 free, so the batch waits.
        unit.step(staff, today(), true);
        let outcome = unit.step(staff, today(), true);
        assert!(outcome.produced.is_none());
        assert_eq!(unit.output_quantity(), 100);
        assert!(unit.progress() >= Fixed64::from_num(PROGRESS_COMPLETE));

        // Empty the slot and the held batch lands.
        let cart = unit.load_cart(400).unwrap();
        assert_eq!(cart.quantity(), 100);
        let outcome = unit.step(staff, today(), true);
        assert_eq!(outcome.produced, Some((Good::Clay, 100)));
    }

    // -----------------------------------------------------------------------
    // Test 6: Unworked collapse
    // -----------------------------------------------------------------------
    #[test]
    fn collapse_after_grace_weeks_with_certain_roll() {
        let mut unit = clay_pit();
        let idle = Workforce::new(0, 10);
        for week in 1..=8 {
            assert!(!unit.weekly_review(idle, &mut AlwaysZero), "week {week}");
        }
        assert!(unit.weekly_review(idle, &mut AlwaysZero));
        assert_eq!(unit.low_worker_weeks(), 9);
    }

    #[test]
    fn high_roll_postpones_collapse() {
        let mut unit = clay_pit();
        let idle = Workforce::new(0, 10);
        for _ in 0..20 {
            assert!(!unit.weekly_review(idle, &mut AlwaysMax));
        }
    }

    #[test]
    fn staffing_recovers_counter() {
        let mut unit = clay_pit();
        for _ in 0..5 {
            unit.weekly_review(Workforce::new(1, 10), &mut AlwaysMax);
        }
        assert_eq!(unit.low_worker_weeks(), 5);
        for _ in 0..7 {
            unit.weekly_review(Workforce::full(10), &mut AlwaysMax);
        }
        assert_eq!(unit.low_worker_weeks(), 0);
    }

    #[test]
    fn zero_max_unworking_weeks_never_collapses() {
        let mut unit = pottery();
        for _ in 0..50 {
            assert!(!unit.weekly_review(Workforce::new(0, 8), &mut AlwaysZero));
        }
        assert_eq!(unit.low_worker_weeks(), 0);
    }

    // -----------------------------------------------------------------------
    // Test 7: Logistics helpers
    // -----------------------------------------------------------------------
    #[test]
    fn supply_request_bounded_by_free_space() {
        let mut unit = pottery();
        let staff = Workforce::full(8);
        assert_eq!(unit.supply_request(staff), Some((Good::Clay, 100)));
        fill_input(&mut unit, 150);
        assert_eq!(unit.supply_request(staff), Some((Good::Clay, 50)));
        assert_eq!(unit.supply_request(Workforce::new(0, 8)), None);
        assert_eq!(clay_pit().supply_request(staff), None);
    }

    #[test]
    fn cart_waits_for_threshold() {
        let mut unit = clay_pit();
        let mut some = GoodStock::filled(Good::Clay, 60, 60);
        unit.store_mut().store(&mut some, 60);
        assert!(unit.load_cart(400).is_none());

        let mut more = GoodStock::filled(Good::Clay, 40, 40);
        unit.store_mut().store(&mut more, 40);
        let cart = unit.load_cart(400).unwrap();
        assert_eq!(cart.quantity(), 100);
        assert_eq!(unit.output_quantity(), 0);
    }

    #[test]
    fn shelf_life_stamps_expiry() {
        let mut spec = ProductionSpec::new(None, Good::Meat, f64_to_fixed64(365.0 * 200.0));
        spec.shelf_life_days = Some(30);
        let mut unit = ProductionUnit::new(&spec);
        let staff = Workforce::full(10);
        for _ in 0..3 {
            unit.step(staff, SimDate::from_days(5), true);
        }
        assert_eq!(unit.output_quantity(), 100);
        assert!(unit.remove_spoiled(SimDate::from_days(34)).is_empty());
        assert_eq!(
            unit.remove_spoiled(SimDate::from_days(35)),
            vec![(Good::Meat, 100)]
        );
    }

    #[test]
    fn unstaffed_factory_accepts_no_deliveries() {
        let unit = pottery();
        assert_eq!(unit.max_store(Good::Clay, Workforce::new(0, 8)), 0);
        assert_eq!(unit.max_store(Good::Clay, Workforce::full(8)), 200);
    }
}
