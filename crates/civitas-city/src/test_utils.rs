//! Shared helpers for city tests and the integration suite.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]`.

use crate::city::City;
use crate::config::SimConfig;
use civitas_core::good::{Good, GoodStock};
use civitas_core::id::BuildingId;
use civitas_spatial::TilePos;

/// A 32x32 map with one tick per day, so walkers cover a tile a day.
pub fn small_config() -> SimConfig {
    SimConfig {
        map_width: 32,
        map_height: 32,
        ticks_per_day: 1,
        ..SimConfig::default()
    }
}

/// Lay road on every tile of the inclusive rectangle.
pub fn road_line(city: &mut City, from: TilePos, to: TilePos) {
    for y in from.y.min(to.y)..=from.y.max(to.y) {
        for x in from.x.min(to.x)..=from.x.max(to.x) {
            city.set_road(TilePos::new(x, y))
                .expect("road tile must be free and on the map");
        }
    }
}

/// Put goods straight into a building's store. Returns the amount stored.
pub fn fill_building(city: &mut City, id: BuildingId, good: Good, qty: u32) -> u32 {
    let store = city
        .building_mut(id)
        .and_then(|b| b.store_mut())
        .expect("building with a store");
    store.store(&mut GoodStock::filled(good, qty, qty), qty)
}

/// Quantity of `good` in a building's store, zero if it has none.
pub fn stored(city: &City, id: BuildingId, good: Good) -> u32 {
    city.building(id)
        .and_then(|b| b.store())
        .map_or(0, |s| s.quantity(good))
}

pub fn run_weeks(city: &mut City, weeks: u32) {
    city.run_days(weeks * 7);
}
