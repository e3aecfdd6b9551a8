use crate::fixed::{Fixed64, ratio};
use serde::{Deserialize, Serialize};

/// Workers employed at a building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workforce {
    present: u32,
    max: u32,
}

impl Workforce {
    /// `present` is clamped to `max`.
    pub fn new(present: u32, max: u32) -> Self {
        Self {
            present: present.min(max),
            max,
        }
    }

    pub fn full(max: u32) -> Self {
        Self::new(max, max)
    }

    pub fn present(&self) -> u32 {
        self.present
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn set_present(&mut self, present: u32) {
        self.present = present.min(self.max);
    }

    pub fn has_workers(&self) -> bool {
        self.present > 0
    }

    /// Share of the positions that are filled, in `[0, 1]`.
    pub fn labor_fraction(&self) -> Fixed64 {
        ratio(self.present, self.max)
    }

    /// Fewer than a third of the positions are filled.
    pub fn is_understaffed(&self) -> bool {
        self.present < self.max / 3
    }
}
