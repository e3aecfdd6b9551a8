//! Civitas City -- the tick-driven city simulation.
//!
//! Ties the economy of `civitas-core` to the map of `civitas-spatial`:
//! buildings are placed on the [`Tilemap`](civitas_spatial::Tilemap), and
//! walkers carry goods between them over roads using the two-phase
//! reservation protocol of [`GoodStore`](civitas_core::store::GoodStore).
//!
//! # Key Types
//!
//! - [`city::City`] -- building and walker arenas plus the tick pipeline.
//! - [`building::Building`] -- placement, staffing and optional economic roles.
//! - [`walker::Walker`] -- cart pushers, cart suppliers and market buyers.
//! - [`config::SimConfig`] -- settings loaded from RON, TOML or JSON.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut city = City::new(Registry::standard(), SimConfig::default());
//! let farm = city.place(BuildingKind::WheatFarm, TilePos::new(0, 0))?;
//! city.set_road(TilePos::new(0, 3))?;
//! city.run_days(30);
//! let bytes = city.serialize()?;
//! ```

pub mod building;
pub mod city;
pub mod config;
pub mod dispatch;
pub mod serialize;
pub mod walker;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use city::{City, PlacementError};
pub use config::SimConfig;
