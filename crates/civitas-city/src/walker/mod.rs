//! Delivery walkers.
//!
//! Every walker follows the same protocol: reserve at the far end before
//! leaving, walk, then apply the reservation on arrival. A walker never
//! removes itself; it moves to its terminal state and the city compaction
//! pass tears it down, releasing whatever reservations it still holds.

mod cart_pusher;
mod cart_supplier;
mod market_buyer;

pub use cart_pusher::{CartPusher, CartState};
pub use cart_supplier::{CartSupplier, SupplyState};
pub use market_buyer::{BuyerState, MarketBuyer};

use crate::building::Building;
use crate::dispatch::Ctx;
use civitas_core::calendar::DateChange;
use civitas_core::good::Good;
use civitas_core::id::{BuildingId, WalkerId};
use civitas_spatial::{Pathway, TilePos, Tilemap, WayType, find_path};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Walker {
    CartPusher(CartPusher),
    CartSupplier(CartSupplier),
    MarketBuyer(MarketBuyer),
}

impl Walker {
    /// The building that sent this walker out.
    pub fn origin(&self) -> BuildingId {
        match self {
            Walker::CartPusher(w) => w.producer(),
            Walker::CartSupplier(w) => w.factory(),
            Walker::MarketBuyer(w) => w.market(),
        }
    }

    pub fn position(&self) -> Option<TilePos> {
        match self {
            Walker::CartPusher(w) => w.position(),
            Walker::CartSupplier(w) => w.position(),
            Walker::MarketBuyer(w) => w.position(),
        }
    }

    pub fn is_done(&self) -> bool {
        match self {
            Walker::CartPusher(w) => w.state() == CartState::Done,
            Walker::CartSupplier(w) => w.state() == SupplyState::Done,
            Walker::MarketBuyer(w) => w.state() == BuyerState::Done,
        }
    }

    /// Goods currently carried.
    pub fn carried(&self) -> Vec<(Good, u32)> {
        match self {
            Walker::CartPusher(w) => stock_entry(w.stock().good(), w.stock().quantity()),
            Walker::CartSupplier(w) => stock_entry(w.stock().good(), w.stock().quantity()),
            Walker::MarketBuyer(w) => w
                .basket()
                .stocks()
                .filter(|s| !s.is_empty())
                .map(|s| (s.good(), s.quantity()))
                .collect(),
        }
    }

    pub(crate) fn update(&mut self, id: WalkerId, ctx: &mut Ctx, change: DateChange) {
        match self {
            Walker::CartPusher(w) => w.update(id, ctx, change),
            Walker::CartSupplier(w) => w.update(id, ctx),
            Walker::MarketBuyer(w) => w.update(id, ctx),
        }
    }

    /// Release every reservation the walker still holds.
    pub(crate) fn release(&mut self, buildings: &mut SlotMap<BuildingId, Building>) {
        match self {
            Walker::CartPusher(w) => w.release(buildings),
            Walker::CartSupplier(w) => w.release(buildings),
            Walker::MarketBuyer(w) => w.release(buildings),
        }
    }
}

fn stock_entry(good: Good, quantity: u32) -> Vec<(Good, u32)> {
    if quantity > 0 { vec![(good, quantity)] } else { Vec::new() }
}

// ---------------------------------------------------------------------------
// Leg
// ---------------------------------------------------------------------------

pub(crate) enum Progress {
    Walking,
    Arrived,
    Blocked,
}

/// A walker's path plus its one allowed reroute.
///
/// Walkers stay on roads. When the next road tile disappears the leg is
/// recomputed once toward the same end tile, preferring roads but crossing
/// open ground if it must; after that, open ground counts as passable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    path: Pathway,
    rerouted: bool,
}

impl Leg {
    pub fn new(path: Pathway) -> Self {
        Self {
            path,
            rerouted: false,
        }
    }

    pub fn path(&self) -> &Pathway {
        &self.path
    }

    pub fn position(&self) -> Option<TilePos> {
        self.path.position()
    }

    pub fn is_rerouted(&self) -> bool {
        self.rerouted
    }

    pub fn turn_back(&mut self) {
        self.path.toggle_direction();
    }

    /// Head somewhere else from the current tile. The tiles walked so far
    /// stay on the path, so the trip home still ends where it began.
    pub fn redirect(&mut self, route: &Pathway) -> bool {
        self.path.splice(route)
    }

    fn passable(&self, map: &Tilemap, pos: TilePos) -> bool {
        if self.rerouted {
            map.is_walkable(pos)
        } else {
            map.is_road(pos)
        }
    }

    pub(crate) fn walk(&mut self, map: &Tilemap, speed: u32) -> Progress {
        for _ in 0..speed.max(1) {
            let Some(next) = self.path.next_tile() else {
                return Progress::Arrived;
            };
            if !self.passable(map, next) {
                if self.rerouted {
                    return Progress::Blocked;
                }
                self.rerouted = true;
                let target = if self.path.is_reversed() {
                    self.path.start()
                } else {
                    self.path.stop()
                };
                let (Some(from), Some(to)) = (self.path.position(), target) else {
                    return Progress::Blocked;
                };
                let Some(route) = find_path(map, from, to, WayType::RoadFirst) else {
                    return Progress::Blocked;
                };
                if !self.redirect(&route) {
                    return Progress::Blocked;
                }
                tracing::debug!(?from, ?to, length = route.length(), "walker rerouted");
                continue;
            }
            self.path.advance();
        }
        if self.path.is_finished() {
            Progress::Arrived
        } else {
            Progress::Walking
        }
    }
}
