//! Destination search for walkers.
//!
//! Each search floods the road network from a source with a
//! [`Propagator`], then walks a fixed list of building-kind tiers. Within a
//! tier, candidates are filtered by what they can take or give, ordered by
//! road distance (ties keep discovery order), and the first one whose
//! reservation succeeds wins.

use crate::building::Building;
use crate::config::SimConfig;
use civitas_core::calendar::SimDate;
use civitas_core::event::EventBus;
use civitas_core::fixed::Ticks;
use civitas_core::good::{Good, GoodStock};
use civitas_core::id::{BuildingId, ReservationId};
use civitas_core::registry::{BuildingKind, Registry};
use civitas_core::store::GoodStore;
use civitas_spatial::{DirectRoute, Pathway, Propagator, TilePos, Tilemap};
use slotmap::SlotMap;

/// Borrowed city state handed to building and walker updates.
pub(crate) struct Ctx<'a> {
    pub registry: &'a Registry,
    pub config: &'a SimConfig,
    pub tilemap: &'a Tilemap,
    pub buildings: &'a mut SlotMap<BuildingId, Building>,
    pub events: &'a mut EventBus,
    pub today: SimDate,
    pub tick: Ticks,
}

impl Ctx<'_> {
    /// The building, unless it is gone or marked for removal.
    pub fn live(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id).filter(|b| !b.is_removed())
    }

    pub fn live_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id).filter(|b| !b.is_removed())
    }

    /// Release a reservation held at `building`, if both still exist.
    pub fn cancel(&mut self, building: BuildingId, reservation: Option<ReservationId>) {
        cancel_at(self.buildings, building, reservation);
    }
}

pub(crate) fn cancel_at(
    buildings: &mut SlotMap<BuildingId, Building>,
    building: BuildingId,
    reservation: Option<ReservationId>,
) {
    if let Some(id) = reservation
        && let Some(store) = buildings.get_mut(building).and_then(Building::store_mut)
    {
        store.cancel_reservation(id);
    }
}

/// Where a propagation starts.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Seed {
    /// The access roads of a building.
    Building(BuildingId),
    /// A walker's current tile.
    Tile(TilePos),
}

/// A reserved destination and the road route to it.
#[derive(Debug)]
pub(crate) struct Destination {
    pub building: BuildingId,
    pub reservation: ReservationId,
    pub path: Pathway,
}

/// A reserved pickup of `quantity` units.
#[derive(Debug)]
pub(crate) struct Pickup {
    pub destination: Destination,
    pub good: Good,
    pub quantity: u32,
}

fn propagate(ctx: &Ctx, seed: Seed, exclude: BuildingId, max_distance: u32) -> Vec<DirectRoute> {
    let mut prop = Propagator::new(ctx.tilemap);
    prop.set_all_directions(ctx.config.all_directions);
    match seed {
        Seed::Building(b) => prop.init(b),
        Seed::Tile(pos) => prop.init_tile(pos),
    }
    prop.exclude(Some(exclude));
    prop.propagate(max_distance);
    prop.all_routes().to_vec()
}

fn in_tier(routes: &[DirectRoute], kind: BuildingKind) -> Vec<&DirectRoute> {
    let mut tier: Vec<&DirectRoute> = routes.iter().filter(|r| r.kind == kind).collect();
    tier.sort_by_key(|r| r.length());
    tier
}

/// Building kinds that take deliveries of `good`, most preferred first:
/// the workshop consuming it, then a granary for food, then a warehouse.
pub fn delivery_tiers(registry: &Registry, good: Good) -> Vec<BuildingKind> {
    let mut tiers = Vec::with_capacity(3);
    if let Some(kind) = registry.consumer_of(good) {
        tiers.push(kind);
    }
    tiers.extend(storage_tiers(good));
    tiers
}

/// Storage kinds that may hold `good`, granaries first.
pub fn storage_tiers(good: Good) -> Vec<BuildingKind> {
    if good.is_food() {
        vec![BuildingKind::Granary, BuildingKind::Warehouse]
    } else {
        vec![BuildingKind::Warehouse]
    }
}

/// Find and reserve room for all of `stock`.
pub(crate) fn find_delivery(
    ctx: &mut Ctx,
    seed: Seed,
    exclude: BuildingId,
    stock: &GoodStock,
    max_distance: u32,
) -> Option<Destination> {
    let good = stock.good();
    let qty = stock.quantity();
    let routes = propagate(ctx, seed, exclude, max_distance);

    for kind in delivery_tiers(ctx.registry, good) {
        for route in in_tier(&routes, kind) {
            if ctx.live(route.building).is_none_or(|b| b.max_store(good) < qty) {
                continue;
            }
            let Some(store) = ctx.buildings.get_mut(route.building).and_then(Building::store_mut)
            else {
                continue;
            };
            if let Some(reservation) = store.reserve_storage(stock, ctx.today) {
                return Some(Destination {
                    building: route.building,
                    reservation,
                    path: route.path.clone(),
                });
            }
        }
    }
    None
}

/// Find the nearest storage holding `good` for a factory and reserve up to
/// `wanted` units there.
pub(crate) fn find_supply(
    ctx: &mut Ctx,
    factory: BuildingId,
    good: Good,
    wanted: u32,
) -> Option<Pickup> {
    let routes = propagate(ctx, Seed::Building(factory), factory, ctx.config.supplier_distance);

    for kind in storage_tiers(good) {
        for route in in_tier(&routes, kind) {
            let available = ctx.live(route.building).map_or(0, |b| b.max_retrieve(good));
            let quantity = available.min(wanted);
            if quantity == 0 {
                continue;
            }
            let Some(store) = ctx.buildings.get_mut(route.building).and_then(Building::store_mut)
            else {
                continue;
            };
            if let Some(reservation) = store.reserve_retrieval(good, quantity, ctx.today) {
                return Some(Pickup {
                    destination: Destination {
                        building: route.building,
                        reservation,
                        path: route.path.clone(),
                    },
                    good,
                    quantity,
                });
            }
        }
    }
    None
}

/// Pick the storage a market buyer should visit. Goods are tried in the
/// market's order of need; for each, the candidate with the most stock
/// wins (shorter route on ties).
pub(crate) fn find_purchase(ctx: &mut Ctx, market: BuildingId, basket: &GoodStore) -> Option<Pickup> {
    let needs: Vec<(Good, u32)> = {
        let role = ctx.live(market)?.market()?;
        role.most_needed_goods()
            .into_iter()
            .map(|g| (g, role.demand(g)))
            .collect()
    };
    let routes = propagate(ctx, Seed::Building(market), market, ctx.config.buyer_distance);

    for (good, demand) in needs {
        for kind in storage_tiers(good) {
            let best = in_tier(&routes, kind)
                .into_iter()
                .map(|r| (r, ctx.live(r.building).map_or(0, |b| b.max_retrieve(good))))
                .filter(|&(_, available)| available > 0)
                .fold(None::<(&DirectRoute, u32)>, |best, cand| match best {
                    Some(b) if b.1 >= cand.1 => Some(b),
                    _ => Some(cand),
                });
            let Some((route, available)) = best else {
                continue;
            };
            let quantity = available.min(demand).min(basket.max_store(good));
            if quantity == 0 {
                continue;
            }
            let Some(store) = ctx.buildings.get_mut(route.building).and_then(Building::store_mut)
            else {
                continue;
            };
            if let Some(reservation) = store.reserve_retrieval(good, quantity, ctx.today) {
                return Some(Pickup {
                    destination: Destination {
                        building: route.building,
                        reservation,
                        path: route.path.clone(),
                    },
                    good,
                    quantity,
                });
            }
        }
    }
    None
}
