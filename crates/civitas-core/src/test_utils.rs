//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::calendar::SimDate;
use crate::fixed::Fixed64;
use crate::good::{Good, GoodStock};
use crate::production::{ProductionSpec, ProductionUnit};
use crate::rng::RandomSource;
use crate::storage::StorageRole;
use crate::store::GoodStore;

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

pub fn day(d: u32) -> SimDate {
    SimDate::from_days(d)
}

/// A full stock of `qty` units.
pub fn load(good: Good, qty: u32) -> GoodStock {
    GoodStock::filled(good, qty, qty)
}

/// Put `qty` units of `good` into `store`. Returns the amount stored.
pub fn fill(store: &mut GoodStore, good: Good, qty: u32) -> u32 {
    store.store(&mut load(good, qty), qty)
}

pub fn warehouse_with(good: Good, qty: u32) -> StorageRole {
    let mut warehouse = StorageRole::warehouse();
    fill(warehouse.store_mut(), good, qty);
    warehouse
}

/// A clay-to-pottery workshop with the usual capacities.
pub fn pottery_unit(rate: f64) -> ProductionUnit {
    ProductionUnit::new(&ProductionSpec::new(
        Some(Good::Clay),
        Good::Pottery,
        fixed(rate),
    ))
}

/// A random source that replays a fixed sequence, repeating the last value.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: Vec<u32>,
    next: usize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, next: 0 }
    }

    /// Always rolls zero, so every probabilistic check that can fire does.
    pub fn always_zero() -> Self {
        Self::new(vec![0])
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&mut self, bound: u32) -> u32 {
        let value = self
            .values
            .get(self.next)
            .or(self.values.last())
            .copied()
            .unwrap_or(0);
        self.next += 1;
        value.min(bound.saturating_sub(1))
    }
}
