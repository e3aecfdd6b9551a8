use super::{Leg, Progress};
use crate::building::Building;
use crate::dispatch::{Ctx, Destination, Seed, cancel_at, find_delivery};
use civitas_core::calendar::DateChange;
use civitas_core::event::Event;
use civitas_core::good::GoodStock;
use civitas_core::id::{BuildingId, ReservationId, WalkerId};
use civitas_spatial::TilePos;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartState {
    /// Parked on the producer's access road until a destination accepts.
    AwaitingDestination,
    Outbound,
    Unloading,
    Returning,
    Done,
}

/// Carries a producer's output to the best reachable consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartPusher {
    stock: GoodStock,
    producer: BuildingId,
    consumer: Option<BuildingId>,
    reservation: Option<ReservationId>,
    leg: Option<Leg>,
    parked_at: Option<TilePos>,
    max_distance: u32,
    cant_unload: bool,
    destination_recomputed: bool,
    state: CartState,
}

impl CartPusher {
    /// A cart heading for an already reserved destination.
    pub(crate) fn dispatched(
        producer: BuildingId,
        stock: GoodStock,
        destination: Destination,
        max_distance: u32,
    ) -> Self {
        Self {
            stock,
            producer,
            consumer: Some(destination.building),
            reservation: Some(destination.reservation),
            leg: Some(Leg::new(destination.path)),
            parked_at: None,
            max_distance,
            cant_unload: false,
            destination_recomputed: false,
            state: CartState::Outbound,
        }
    }

    /// A loaded cart with nowhere to go yet.
    pub(crate) fn parked(
        producer: BuildingId,
        stock: GoodStock,
        at: TilePos,
        max_distance: u32,
    ) -> Self {
        Self {
            stock,
            producer,
            consumer: None,
            reservation: None,
            leg: None,
            parked_at: Some(at),
            max_distance,
            cant_unload: false,
            destination_recomputed: false,
            state: CartState::AwaitingDestination,
        }
    }

    pub fn stock(&self) -> &GoodStock {
        &self.stock
    }

    pub fn producer(&self) -> BuildingId {
        self.producer
    }

    pub fn consumer(&self) -> Option<BuildingId> {
        self.consumer
    }

    pub fn reservation(&self) -> Option<ReservationId> {
        self.reservation
    }

    pub fn max_distance(&self) -> u32 {
        self.max_distance
    }

    pub fn cant_unload(&self) -> bool {
        self.cant_unload
    }

    pub fn state(&self) -> CartState {
        self.state
    }

    pub fn leg(&self) -> Option<&Leg> {
        self.leg.as_ref()
    }

    pub fn position(&self) -> Option<TilePos> {
        self.leg.as_ref().map_or(self.parked_at, Leg::position)
    }

    pub(crate) fn update(&mut self, id: WalkerId, ctx: &mut Ctx, change: DateChange) {
        if ctx.live(self.producer).is_none() {
            self.self_destruct("producer gone");
            return;
        }
        match self.state {
            CartState::AwaitingDestination => {
                if change.week {
                    self.retry_destination(id, ctx);
                }
            }
            CartState::Outbound => {
                if !self.consumer_alive(ctx) && !self.recompute_destination(id, ctx) {
                    return;
                }
                let Some(leg) = &mut self.leg else {
                    self.self_destruct("no route");
                    return;
                };
                match leg.walk(ctx.tilemap, ctx.config.walker_speed) {
                    Progress::Walking => {}
                    Progress::Arrived => self.state = CartState::Unloading,
                    Progress::Blocked => self.self_destruct("road blocked"),
                }
            }
            CartState::Unloading => {
                if !self.consumer_alive(ctx) {
                    // Rerouting from the consumer's door leaves us outbound again.
                    self.recompute_destination(id, ctx);
                    return;
                }
                self.unload(id, ctx);
            }
            CartState::Returning => {
                let Some(leg) = &mut self.leg else {
                    self.state = CartState::Done;
                    return;
                };
                if !matches!(leg.walk(ctx.tilemap, ctx.config.walker_speed), Progress::Walking) {
                    self.state = CartState::Done;
                }
            }
            CartState::Done => {}
        }
    }

    fn consumer_alive(&self, ctx: &Ctx) -> bool {
        self.consumer.is_some_and(|c| ctx.live(c).is_some())
    }

    fn retry_destination(&mut self, id: WalkerId, ctx: &mut Ctx) {
        let Some(destination) = find_delivery(
            ctx,
            Seed::Building(self.producer),
            self.producer,
            &self.stock,
            self.max_distance,
        ) else {
            tracing::debug!(producer = ?self.producer, good = %self.stock.good(), "cart still has no destination");
            return;
        };
        self.set_destination(id, ctx, destination);
    }

    /// One attempt at a new destination from the current tile. Returns
    /// whether the cart can keep going.
    fn recompute_destination(&mut self, id: WalkerId, ctx: &mut Ctx) -> bool {
        if let Some(old) = self.consumer.take() {
            ctx.cancel(old, self.reservation.take());
        }
        if self.destination_recomputed {
            self.self_destruct("destination lost twice");
            return false;
        }
        self.destination_recomputed = true;

        let Some(here) = self.position() else {
            self.self_destruct("no position");
            return false;
        };
        match find_delivery(ctx, Seed::Tile(here), self.producer, &self.stock, self.max_distance) {
            Some(destination) => {
                self.set_destination(id, ctx, destination);
                true
            }
            None => {
                self.self_destruct("destination lost");
                false
            }
        }
    }

    fn set_destination(&mut self, id: WalkerId, ctx: &mut Ctx, destination: Destination) {
        tracing::debug!(
            walker = ?id,
            destination = ?destination.building,
            length = destination.path.length(),
            "cart destination set"
        );
        ctx.events.emit(Event::WalkerDispatched {
            walker: id,
            origin: self.producer,
            destination: Some(destination.building),
            tick: ctx.tick,
        });
        self.consumer = Some(destination.building);
        self.reservation = Some(destination.reservation);
        let redirected = self
            .leg
            .as_mut()
            .is_some_and(|leg| leg.redirect(&destination.path));
        if !redirected {
            self.leg = Some(Leg::new(destination.path));
        }
        self.parked_at = None;
        self.state = CartState::Outbound;
    }

    fn unload(&mut self, id: WalkerId, ctx: &mut Ctx) {
        let Some(consumer) = self.consumer else {
            return;
        };
        let good = self.stock.good();
        let stored = match (self.reservation.take(), ctx.buildings.get_mut(consumer)) {
            (Some(reservation), Some(building)) => {
                let room = building.max_store(good);
                match building.store_mut() {
                    Some(store) if store.reservation(reservation).is_some() => {
                        store.apply_storage_reservation(&mut self.stock, reservation)
                    }
                    // Reservation purged while under way: take what still fits.
                    Some(store) => store.store(&mut self.stock, room),
                    None => 0,
                }
            }
            _ => 0,
        };
        if stored > 0 {
            ctx.events.emit(Event::GoodsDelivered {
                walker: id,
                building: consumer,
                good: self.stock.good(),
                quantity: stored,
                tick: ctx.tick,
            });
        }
        if !self.stock.is_empty() {
            self.cant_unload = true;
            tracing::debug!(walker = ?id, left = self.stock.quantity(), "cart could not unload everything");
        }
        if let Some(leg) = &mut self.leg {
            leg.turn_back();
        }
        self.state = CartState::Returning;
    }

    fn self_destruct(&mut self, reason: &str) {
        if self.state != CartState::Done {
            tracing::debug!(producer = ?self.producer, reason, "cart pusher removed");
        }
        self.state = CartState::Done;
    }

    pub(crate) fn release(&mut self, buildings: &mut SlotMap<BuildingId, Building>) {
        if let Some(consumer) = self.consumer {
            cancel_at(buildings, consumer, self.reservation.take());
        }
    }
}
