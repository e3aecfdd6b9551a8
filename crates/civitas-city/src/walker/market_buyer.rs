use super::{Leg, Progress};
use crate::building::Building;
use crate::dispatch::{Ctx, Pickup, cancel_at};
use civitas_core::event::Event;
use civitas_core::good::{Good, GoodStock};
use civitas_core::id::{BuildingId, ReservationId, WalkerId};
use civitas_core::market::buyer_basket;
use civitas_core::store::GoodStore;
use civitas_spatial::TilePos;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuyerState {
    Outbound,
    Returning,
    Done,
}

/// Restocks a market from the granary or warehouse with the most of the
/// good it needs most, filling the rest of the basket while there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBuyer {
    market: BuildingId,
    storage: BuildingId,
    good: Good,
    reservation: Option<ReservationId>,
    basket: GoodStore,
    leg: Leg,
    state: BuyerState,
}

impl MarketBuyer {
    pub(crate) fn new(market: BuildingId, pickup: Pickup) -> Self {
        Self {
            market,
            storage: pickup.destination.building,
            good: pickup.good,
            reservation: Some(pickup.destination.reservation),
            basket: buyer_basket(),
            leg: Leg::new(pickup.destination.path),
            state: BuyerState::Outbound,
        }
    }

    pub fn market(&self) -> BuildingId {
        self.market
    }

    pub fn storage(&self) -> BuildingId {
        self.storage
    }

    /// The good the trip was planned around.
    pub fn good(&self) -> Good {
        self.good
    }

    pub fn basket(&self) -> &GoodStore {
        &self.basket
    }

    pub fn state(&self) -> BuyerState {
        self.state
    }

    pub fn position(&self) -> Option<TilePos> {
        self.leg.position()
    }

    pub(crate) fn update(&mut self, id: WalkerId, ctx: &mut Ctx) {
        if ctx.live(self.market).is_none() {
            self.state = BuyerState::Done;
            return;
        }
        match self.state {
            BuyerState::Outbound => {
                if ctx.live(self.storage).is_none() {
                    self.state = BuyerState::Done;
                    return;
                }
                match self.leg.walk(ctx.tilemap, ctx.config.walker_speed) {
                    Progress::Walking => {}
                    Progress::Arrived => self.buy(ctx),
                    Progress::Blocked => self.state = BuyerState::Done,
                }
            }
            BuyerState::Returning => match self.leg.walk(ctx.tilemap, ctx.config.walker_speed) {
                Progress::Walking => {}
                Progress::Arrived => self.stock_market(id, ctx),
                Progress::Blocked => self.state = BuyerState::Done,
            },
            BuyerState::Done => {}
        }
    }

    fn buy(&mut self, ctx: &mut Ctx) {
        let demands: Vec<(Good, u32)> = match ctx.live(self.market).and_then(Building::market) {
            Some(market) => Good::ALL.into_iter().map(|g| (g, market.demand(g))).collect(),
            None => Vec::new(),
        };

        if let Some(store) = ctx.buildings.get_mut(self.storage).and_then(Building::store_mut) {
            if let Some(reservation) = self.reservation.take() {
                let mut cart = GoodStock::new(self.good, self.basket.max_store(self.good));
                store.apply_retrieve_reservation(&mut cart, reservation);
                let qty = cart.quantity();
                self.basket.store(&mut cart, qty);
            }

            // Whatever else the market lacks and this store can spare.
            for (good, demand) in demands {
                let want = demand
                    .saturating_sub(self.basket.quantity(good))
                    .min(store.max_retrieve(good))
                    .min(self.basket.max_store(good));
                if want == 0 {
                    continue;
                }
                let mut cart = GoodStock::new(good, want);
                let got = store.retrieve(&mut cart, want);
                self.basket.store(&mut cart, got);
            }
        }

        self.leg.turn_back();
        self.state = BuyerState::Returning;
    }

    fn stock_market(&mut self, id: WalkerId, ctx: &mut Ctx) {
        let before: Vec<(Good, u32)> = self
            .basket
            .stocks()
            .filter(|s| !s.is_empty())
            .map(|s| (s.good(), s.quantity()))
            .collect();
        if let Some(market) = ctx.buildings.get_mut(self.market).and_then(Building::market_mut) {
            market.store_all(&mut self.basket);
        }
        for (good, qty) in before {
            let delivered = qty - self.basket.quantity(good);
            if delivered > 0 {
                ctx.events.emit(Event::GoodsDelivered {
                    walker: id,
                    building: self.market,
                    good,
                    quantity: delivered,
                    tick: ctx.tick,
                });
            }
        }
        self.state = BuyerState::Done;
    }

    pub(crate) fn release(&mut self, buildings: &mut SlotMap<BuildingId, Building>) {
        cancel_at(buildings, self.storage, self.reservation.take());
    }
}
