use super::{Leg, Progress};
use crate::building::Building;
use crate::dispatch::{Ctx, Pickup, cancel_at};
use civitas_core::event::Event;
use civitas_core::good::GoodStock;
use civitas_core::id::{BuildingId, ReservationId, WalkerId};
use civitas_spatial::TilePos;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyState {
    Outbound,
    Returning,
    Done,
}

/// Fetches a factory's input good from storage.
///
/// Holds two reservations: goods at the storage building and room at the
/// factory, so neither side can be promised to someone else mid-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSupplier {
    factory: BuildingId,
    storage: BuildingId,
    stock: GoodStock,
    pickup: Option<ReservationId>,
    dropoff: Option<ReservationId>,
    leg: Leg,
    state: SupplyState,
}

impl CartSupplier {
    pub(crate) fn new(factory: BuildingId, pickup: Pickup, dropoff: ReservationId) -> Self {
        Self {
            factory,
            storage: pickup.destination.building,
            stock: GoodStock::new(pickup.good, pickup.quantity),
            pickup: Some(pickup.destination.reservation),
            dropoff: Some(dropoff),
            leg: Leg::new(pickup.destination.path),
            state: SupplyState::Outbound,
        }
    }

    pub fn factory(&self) -> BuildingId {
        self.factory
    }

    pub fn storage(&self) -> BuildingId {
        self.storage
    }

    pub fn stock(&self) -> &GoodStock {
        &self.stock
    }

    pub fn state(&self) -> SupplyState {
        self.state
    }

    pub fn position(&self) -> Option<TilePos> {
        self.leg.position()
    }

    pub(crate) fn update(&mut self, id: WalkerId, ctx: &mut Ctx) {
        if ctx.live(self.factory).is_none() {
            self.state = SupplyState::Done;
            return;
        }
        match self.state {
            SupplyState::Outbound => {
                if ctx.live(self.storage).is_none() {
                    tracing::debug!(walker = ?id, "supplier lost its storage");
                    self.state = SupplyState::Done;
                    return;
                }
                match self.leg.walk(ctx.tilemap, ctx.config.walker_speed) {
                    Progress::Walking => {}
                    Progress::Arrived => self.load(ctx),
                    Progress::Blocked => self.state = SupplyState::Done,
                }
            }
            SupplyState::Returning => match self.leg.walk(ctx.tilemap, ctx.config.walker_speed) {
                Progress::Walking => {}
                Progress::Arrived => self.unload(id, ctx),
                Progress::Blocked => self.state = SupplyState::Done,
            },
            SupplyState::Done => {}
        }
    }

    fn load(&mut self, ctx: &mut Ctx) {
        if let Some(reservation) = self.pickup.take()
            && let Some(store) = ctx.buildings.get_mut(self.storage).and_then(Building::store_mut)
        {
            store.apply_retrieve_reservation(&mut self.stock, reservation);
        }
        self.leg.turn_back();
        self.state = SupplyState::Returning;
    }

    fn unload(&mut self, id: WalkerId, ctx: &mut Ctx) {
        let stored = match (
            self.dropoff.take(),
            ctx.buildings.get_mut(self.factory).and_then(Building::store_mut),
        ) {
            (Some(reservation), Some(store)) => {
                store.apply_storage_reservation(&mut self.stock, reservation)
            }
            _ => 0,
        };
        if stored > 0 {
            ctx.events.emit(Event::GoodsDelivered {
                walker: id,
                building: self.factory,
                good: self.stock.good(),
                quantity: stored,
                tick: ctx.tick,
            });
        }
        self.state = SupplyState::Done;
    }

    pub(crate) fn release(&mut self, buildings: &mut SlotMap<BuildingId, Building>) {
        cancel_at(buildings, self.storage, self.pickup.take());
        cancel_at(buildings, self.factory, self.dropoff.take());
    }
}
