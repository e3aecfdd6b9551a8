//! Binary city snapshots via `bitcode` with a versioned header.
//!
//! The registry is not part of a snapshot; the loader supplies it, the same
//! way [`City::new`] takes it. The event bus holds closures and is
//! recreated empty on load.

use crate::building::Building;
use crate::city::City;
use crate::config::SimConfig;
use crate::walker::Walker;
use civitas_core::calendar::Calendar;
use civitas_core::event::EventBus;
use civitas_core::id::{BuildingId, WalkerId};
use civitas_core::registry::Registry;
use civitas_core::rng::SimRng;
use civitas_spatial::Tilemap;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

/// Magic number identifying a city snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xC17A_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
}

/// Header prepended to every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Tick at which the snapshot was taken.
    pub tick: u64,
}

impl SnapshotHeader {
    pub fn new(tick: u64) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CitySnapshot {
    header: SnapshotHeader,
    config: SimConfig,
    tilemap: Tilemap,
    buildings: SlotMap<BuildingId, Building>,
    walkers: SlotMap<WalkerId, Walker>,
    calendar: Calendar,
    rng: SimRng,
}

impl City {
    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let snapshot = CitySnapshot {
            header: SnapshotHeader::new(self.calendar.tick()),
            config: self.config.clone(),
            tilemap: self.tilemap.clone(),
            buildings: self.buildings.clone(),
            walkers: self.walkers.clone(),
            calendar: self.calendar.clone(),
            rng: self.rng.clone(),
        };
        bitcode::serialize(&snapshot).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Restore a city. Listeners must be re-registered afterwards.
    pub fn deserialize(data: &[u8], registry: Registry) -> Result<Self, DeserializeError> {
        let snapshot: CitySnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;

        tracing::info!(tick = snapshot.header.tick, "city snapshot loaded");
        Ok(City {
            event_bus: EventBus::new(snapshot.config.event_buffer_capacity),
            registry,
            config: snapshot.config,
            tilemap: snapshot.tilemap,
            buildings: snapshot.buildings,
            walkers: snapshot.walkers,
            calendar: snapshot.calendar,
            rng: snapshot.rng,
        })
    }
}
