//! Civitas Core -- goods, stores and production for a city-building economy.
//!
//! This crate holds the simulation state that does not depend on the map:
//! goods and bounded stocks, the reservation-aware [`store::GoodStore`],
//! factory production, warehouse/granary and market roles, the building
//! registry, the event bus, and the deterministic clock, RNG and hashing
//! every other crate builds on.
//!
//! # Reservation protocol
//!
//! Walkers never move goods on a promise. They reserve first, walk, then
//! apply:
//!
//! ```rust,ignore
//! let id = warehouse.reserve_storage(&cart, today)?;   // space earmarked
//! // ... walk to the warehouse ...
//! let stored = warehouse.apply_storage_reservation(&mut cart, id);
//! ```
//!
//! Anything that tears a walker down cancels its reservation with
//! [`store::GoodStore::cancel_reservation`].
//!
//! # Key Types
//!
//! - [`good::GoodStock`] -- a typed quantity with a capacity.
//! - [`store::GoodStore`] -- per-good slots, aggregate cap, reservations.
//! - [`production::ProductionUnit`] -- progress-driven factory state machine.
//! - [`storage::StorageRole`] / [`market::MarketRole`] -- building roles.
//! - [`registry::Registry`] -- building templates, frozen at startup.
//! - [`event::EventBus`] -- buffered, read-only notifications.

pub mod calendar;
pub mod event;
pub mod fixed;
pub mod good;
pub mod hash;
pub mod id;
pub mod market;
pub mod production;
pub mod registry;
pub mod rng;
pub mod storage;
pub mod store;
pub mod workforce;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
