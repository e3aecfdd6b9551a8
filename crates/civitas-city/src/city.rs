//! The city simulation driver.
//!
//! # Architecture
//!
//! The `City` owns:
//! - A frozen [`Registry`] of building templates
//! - The [`Tilemap`] (terrain, roads, placement index)
//! - Building and walker arenas keyed by stable slot-map ids
//! - The [`Calendar`], the city [`SimRng`] and the [`EventBus`]
//!
//! # Tick pipeline
//!
//! Each `step()` runs:
//! 1. **Calendar** -- advance one tick; derive day/week/month boundaries
//! 2. **Buildings** -- staffing review, spoilage and walker dispatch on
//!    week boundaries, production every tick, reservation housekeeping on
//!    month boundaries
//! 3. **Walkers** -- move, arrive, apply reservations
//! 4. **Post-tick** -- store change flags become events; events are delivered
//! 5. **Bookkeeping** -- finished walkers and removed buildings are torn
//!    down, releasing their reservations

use crate::building::Building;
use crate::config::SimConfig;
use crate::dispatch::{Ctx, Seed, find_delivery, find_purchase, find_supply};
use crate::walker::{CartPusher, CartSupplier, MarketBuyer, Walker};
use civitas_core::calendar::{Calendar, DateChange, SimDate};
use civitas_core::event::{Event, EventBus};
use civitas_core::fixed::Ticks;
use civitas_core::good::{Good, GoodStock};
use civitas_core::hash::StateHash;
use civitas_core::id::{BuildingId, WalkerId};
use civitas_core::market::buyer_basket;
use civitas_core::registry::{BuildingKind, NearbyTerrain, Registry};
use civitas_core::rng::{RandomSource, SimRng};
use civitas_core::storage::GoodOrder;
use civitas_spatial::{SpatialError, Terrain, TilePos, Tilemap};
use slotmap::{Key, SlotMap};

/// Months (0-based, modulo 3) in which factories throw out spoiled goods.
const SPOILAGE_MONTH_PHASE: u32 = 1;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("no template registered for {0:?}")]
    UnknownKind(BuildingKind),
    #[error("{kind:?} must be built next to {terrain:?}")]
    MissingTerrain {
        kind: BuildingKind,
        terrain: NearbyTerrain,
    },
    #[error("no such building")]
    UnknownBuilding,
    #[error(transparent)]
    Spatial(#[from] SpatialError),
}

// ---------------------------------------------------------------------------
// City
// ---------------------------------------------------------------------------

pub struct City {
    pub(crate) registry: Registry,
    pub(crate) config: SimConfig,
    pub(crate) tilemap: Tilemap,
    pub(crate) buildings: SlotMap<BuildingId, Building>,
    pub(crate) walkers: SlotMap<WalkerId, Walker>,
    pub(crate) calendar: Calendar,
    pub(crate) rng: SimRng,
    /// Notifications for UI, audio and statistics. Listeners are passive.
    pub event_bus: EventBus,
}

impl City {
    pub fn new(registry: Registry, config: SimConfig) -> Self {
        Self {
            tilemap: Tilemap::new(config.map_width, config.map_height),
            buildings: SlotMap::with_key(),
            walkers: SlotMap::with_key(),
            calendar: Calendar::new(config.ticks_per_day),
            rng: SimRng::new(config.seed),
            event_bus: EventBus::new(config.event_buffer_capacity),
            registry,
            config,
        }
    }

    // -- Accessors --

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tilemap(&self) -> &Tilemap {
        &self.tilemap
    }

    pub fn tick(&self) -> Ticks {
        self.calendar.tick()
    }

    pub fn date(&self) -> SimDate {
        self.calendar.date()
    }

    /// Calendar year, counting from the configured start year.
    pub fn year(&self) -> i32 {
        self.config.start_year + self.date().year() as i32
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id)
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id)
    }

    pub fn buildings(&self) -> impl Iterator<Item = (BuildingId, &Building)> {
        self.buildings.iter()
    }

    pub fn walker(&self, id: WalkerId) -> Option<&Walker> {
        self.walkers.get(id)
    }

    pub fn walkers(&self) -> impl Iterator<Item = (WalkerId, &Walker)> {
        self.walkers.iter()
    }

    pub fn walker_count(&self) -> usize {
        self.walkers.len()
    }

    // -- Terrain --

    pub fn set_terrain(&mut self, pos: TilePos, terrain: Terrain) -> Result<(), SpatialError> {
        self.tilemap.set_terrain(pos, terrain)
    }

    pub fn set_road(&mut self, pos: TilePos) -> Result<(), SpatialError> {
        self.tilemap.set_terrain(pos, Terrain::Road)
    }

    /// Turn a road tile back into grass. Other tiles are left alone.
    pub fn remove_road(&mut self, pos: TilePos) -> Result<(), SpatialError> {
        if self.tilemap.is_road(pos) {
            self.tilemap.set_terrain(pos, Terrain::Grass)?;
        }
        Ok(())
    }

    // -- Buildings --

    /// Place a fully staffed building with its top-left corner at `origin`.
    pub fn place(&mut self, kind: BuildingKind, origin: TilePos) -> Result<BuildingId, PlacementError> {
        let template = self
            .registry
            .get(kind)
            .ok_or(PlacementError::UnknownKind(kind))?;
        if let Some(terrain) = template.needs_nearby
            && !self.tilemap.has_terrain_near(origin, template.size, terrain)
        {
            return Err(PlacementError::MissingTerrain { kind, terrain });
        }
        self.tilemap.check_placement(origin, template.size)?;

        let supplier = template.supplier;
        let size = template.size;
        let id = self.buildings.insert(Building::from_template(template, origin));
        if let Err(e) = self.tilemap.place(id, kind, origin, size) {
            self.buildings.remove(id);
            return Err(e.into());
        }

        if let Some(supplier) = supplier
            && self.find(supplier).is_empty()
        {
            tracing::warn!(?kind, ?supplier, "workshop placed without a supplier in the city");
        }
        tracing::info!(building = ?id, ?kind, ?origin, "building placed");
        self.event_bus.emit(Event::BuildingPlaced {
            building: id,
            kind,
            tick: self.tick(),
        });
        Ok(id)
    }

    /// Remove a building. Its walkers notice on their next update.
    pub fn demolish(&mut self, id: BuildingId) -> Result<(), PlacementError> {
        let building = self
            .buildings
            .get_mut(id)
            .filter(|b| !b.is_removed())
            .ok_or(PlacementError::UnknownBuilding)?;
        building.mark_removed();
        self.event_bus.emit(Event::BuildingRemoved {
            building: id,
            tick: self.calendar.tick(),
        });
        self.compact();
        Ok(())
    }

    /// Set the labor available to a building. Returns `false` for an
    /// unknown building.
    pub fn set_workers(&mut self, id: BuildingId, present: u32) -> bool {
        match self.buildings.get_mut(id) {
            Some(b) => {
                b.set_workers(present);
                true
            }
            None => false,
        }
    }

    /// Switch a factory on or off. Returns `false` if it is not a factory.
    pub fn set_active(&mut self, id: BuildingId, active: bool) -> bool {
        match self.buildings.get_mut(id).and_then(Building::production_mut) {
            Some(unit) => {
                unit.set_active(active);
                true
            }
            None => false,
        }
    }

    /// Set a storage order. Returns `false` if it is not a storage building.
    pub fn set_order(&mut self, id: BuildingId, good: Good, order: GoodOrder) -> bool {
        match self.buildings.get_mut(id).and_then(Building::storage_mut) {
            Some(storage) => {
                storage.set_order(good, order);
                true
            }
            None => false,
        }
    }

    /// All standing buildings of `kind`.
    pub fn find(&self, kind: BuildingKind) -> Vec<BuildingId> {
        self.buildings
            .iter()
            .filter(|(_, b)| b.kind() == kind && !b.is_removed())
            .map(|(id, _)| id)
            .collect()
    }

    /// Buildings of `kind` touching the inclusive rectangle.
    pub fn find_in_rect(&self, kind: BuildingKind, min: TilePos, max: TilePos) -> Vec<BuildingId> {
        self.tilemap.buildings_in_rect(min, max, Some(kind))
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Run one tick using the city's own RNG.
    pub fn step(&mut self) -> DateChange {
        let mut rng = self.rng.clone();
        let change = self.step_with(&mut rng);
        self.rng = rng;
        change
    }

    /// Run one tick drawing collapse rolls from `random`.
    pub fn step_with(&mut self, random: &mut impl RandomSource) -> DateChange {
        let change = self.calendar.advance();
        self.phase_buildings(change, random);
        self.phase_walkers(change);
        self.phase_post_tick();
        self.phase_bookkeeping();
        change
    }

    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    pub fn run_days(&mut self, days: u32) {
        self.run(days as u64 * self.calendar.ticks_per_day() as u64);
    }

    // -----------------------------------------------------------------------
    // Phase 2: Buildings
    // -----------------------------------------------------------------------

    fn phase_buildings(&mut self, change: DateChange, random: &mut impl RandomSource) {
        let today = self.calendar.date();
        let tick = self.calendar.tick();
        let ids: Vec<BuildingId> = self.buildings.keys().collect();

        for id in ids {
            let mut ctx = Ctx {
                registry: &self.registry,
                config: &self.config,
                tilemap: &self.tilemap,
                buildings: &mut self.buildings,
                events: &mut self.event_bus,
                today,
                tick,
            };
            if let Some(walker) = update_building(&mut ctx, id, change, random) {
                self.spawn(id, walker);
            }
        }

        if change.month {
            let ttl = self.config.reservation_ttl_days;
            for (id, building) in &mut self.buildings {
                if let Some(store) = building.store_mut() {
                    let purged = store.purge_reservations(today, ttl);
                    if purged > 0 {
                        tracing::debug!(building = ?id, purged, "stale reservations purged");
                    }
                }
            }
        }
    }

    fn spawn(&mut self, origin: BuildingId, walker: Walker) {
        let destination = match &walker {
            Walker::CartPusher(w) => w.consumer(),
            Walker::CartSupplier(w) => Some(w.storage()),
            Walker::MarketBuyer(w) => Some(w.storage()),
        };
        let id = self.walkers.insert(walker);
        if let Some(building) = self.buildings.get_mut(origin) {
            building.add_walker(id);
        }
        tracing::debug!(walker = ?id, ?origin, ?destination, "walker dispatched");
        self.event_bus.emit(Event::WalkerDispatched {
            walker: id,
            origin,
            destination,
            tick: self.calendar.tick(),
        });
    }

    // -----------------------------------------------------------------------
    // Phase 3: Walkers
    // -----------------------------------------------------------------------

    fn phase_walkers(&mut self, change: DateChange) {
        let mut ctx = Ctx {
            registry: &self.registry,
            config: &self.config,
            tilemap: &self.tilemap,
            buildings: &mut self.buildings,
            events: &mut self.event_bus,
            today: self.calendar.date(),
            tick: self.calendar.tick(),
        };
        for (id, walker) in &mut self.walkers {
            if !walker.is_done() {
                walker.update(id, &mut ctx, change);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Phase 4: Post-tick
    // -----------------------------------------------------------------------

    fn phase_post_tick(&mut self) {
        let tick = self.calendar.tick();
        for (id, building) in &mut self.buildings {
            if let Some(store) = building.store_mut()
                && store.take_changed()
            {
                self.event_bus.emit(Event::StoreChanged { building: id, tick });
            }
        }
        self.event_bus.deliver();
    }

    // -----------------------------------------------------------------------
    // Phase 5: Bookkeeping
    // -----------------------------------------------------------------------

    fn phase_bookkeeping(&mut self) {
        self.compact();
    }

    /// Tear down finished walkers and removed buildings.
    fn compact(&mut self) {
        let tick = self.calendar.tick();

        let finished: Vec<WalkerId> = self
            .walkers
            .iter()
            .filter(|(_, w)| w.is_done())
            .map(|(id, _)| id)
            .collect();
        for id in finished {
            let Some(mut walker) = self.walkers.remove(id) else {
                continue;
            };
            walker.release(&mut self.buildings);
            for (good, quantity) in walker.carried() {
                tracing::debug!(walker = ?id, %good, quantity, "goods lost with walker");
                self.event_bus.emit(Event::GoodsLost {
                    walker: id,
                    good,
                    quantity,
                    tick,
                });
            }
            if let Some(origin) = self.buildings.get_mut(walker.origin()) {
                origin.forget_walker(id);
            }
            self.event_bus.emit(Event::WalkerRemoved { walker: id, tick });
        }

        let removed: Vec<BuildingId> = self
            .buildings
            .iter()
            .filter(|(_, b)| b.is_removed())
            .map(|(id, _)| id)
            .collect();
        for id in removed {
            self.buildings.remove(id);
            if self.tilemap.remove(id).is_ok() {
                tracing::info!(building = ?id, "building removed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // State hash
    // -----------------------------------------------------------------------

    /// A deterministic hash of the simulation state.
    pub fn state_hash(&self) -> u64 {
        let mut hasher = StateHash::new();
        hasher.write_u64(self.calendar.tick());
        hasher.write_u64(self.rng.state());

        for (id, building) in &self.buildings {
            hasher.write_u64(id.data().as_ffi());
            hasher.write_u32(building.workforce().present());
            if let Some(store) = building.store() {
                for stock in store.stocks() {
                    hasher.write_u32(stock.quantity());
                    hasher.write_u32(stock.capacity());
                }
                hasher.write_u32(store.reservation_count() as u32);
            }
            if let Some(unit) = building.production() {
                hasher.write_fixed64(unit.progress());
                hasher.write_bool(unit.is_producing());
                hasher.write_u32(unit.low_worker_weeks());
            }
        }

        for (id, walker) in &self.walkers {
            hasher.write_u64(id.data().as_ffi());
            if let Some(pos) = walker.position() {
                hasher.write_i32(pos.x);
                hasher.write_i32(pos.y);
            }
            for (good, quantity) in walker.carried() {
                hasher.write_u32(good.index() as u32);
                hasher.write_u32(quantity);
            }
        }
        hasher.finish()
    }
}

// ---------------------------------------------------------------------------
// Building updates
// ---------------------------------------------------------------------------

fn update_building(
    ctx: &mut Ctx,
    id: BuildingId,
    change: DateChange,
    random: &mut impl RandomSource,
) -> Option<Walker> {
    let building = ctx.live(id)?;
    if building.production().is_some() {
        update_factory(ctx, id, change, random)
    } else if building.storage().is_some() {
        change.week.then(|| devastate(ctx, id)).flatten()
    } else if building.market().is_some() {
        change.week.then(|| send_buyer(ctx, id)).flatten()
    } else {
        None
    }
}

fn update_factory(
    ctx: &mut Ctx,
    id: BuildingId,
    change: DateChange,
    random: &mut impl RandomSource,
) -> Option<Walker> {
    let mut spawned = None;

    if change.week {
        let today = ctx.today;
        let tick = ctx.tick;
        let building = ctx.buildings.get_mut(id)?;
        let workforce = building.workforce();
        let idle = building.walkers().is_empty();
        let unit = building.production_mut()?;

        if unit.weekly_review(workforce, random) {
            building.mark_removed();
            tracing::warn!(building = ?id, "building collapsed after going unworked");
            ctx.events.emit(Event::BuildingCollapsed { building: id, tick });
            return None;
        }

        if today.month() % 3 == SPOILAGE_MONTH_PHASE {
            for (good, quantity) in unit.remove_spoiled(today) {
                ctx.events.emit(Event::GoodsSpoiled {
                    building: id,
                    good,
                    quantity,
                    tick,
                });
            }
        }

        if workforce.has_workers() && idle {
            spawned = request_supply(ctx, id).or_else(|| deliver_output(ctx, id));
        }
    }

    let building = ctx.buildings.get_mut(id)?;
    let workforce = building.workforce();
    let unit = building.production_mut()?;
    let outcome = unit.step(workforce, ctx.today, change.day);
    let trouble = unit.trouble(workforce);
    let stalled = building.update_trouble(trouble);

    if let Some((good, quantity)) = outcome.consumed {
        ctx.events.emit(Event::GoodsConsumed {
            building: id,
            good,
            quantity,
            tick: ctx.tick,
        });
    }
    if let Some((good, quantity)) = outcome.produced {
        ctx.events.emit(Event::GoodsProduced {
            building: id,
            good,
            quantity,
            tick: ctx.tick,
        });
    }
    if let Some(reason) = stalled {
        ctx.events.emit(Event::ProductionStalled {
            building: id,
            reason,
            tick: ctx.tick,
        });
    }
    spawned
}

/// Send a supplier for the factory's input if it has room for more.
fn request_supply(ctx: &mut Ctx, id: BuildingId) -> Option<Walker> {
    let (good, wanted) = {
        let building = ctx.live(id)?;
        building.production()?.supply_request(building.workforce())?
    };
    let pickup = find_supply(ctx, id, good, wanted)?;

    let today = ctx.today;
    let promise = GoodStock::filled(good, pickup.quantity, pickup.quantity);
    let dropoff = ctx
        .buildings
        .get_mut(id)
        .and_then(Building::store_mut)
        .and_then(|store| store.reserve_storage(&promise, today));
    match dropoff {
        Some(dropoff) => Some(Walker::CartSupplier(CartSupplier::new(id, pickup, dropoff))),
        None => {
            ctx.cancel(pickup.destination.building, Some(pickup.destination.reservation));
            None
        }
    }
}

/// Load the factory's output onto a cart once enough has piled up.
fn deliver_output(ctx: &mut Ctx, id: BuildingId) -> Option<Walker> {
    // No access road: keep the goods. No destination: load up and park the
    // cart on the road, retrying weekly (see `CartState::AwaitingDestination`).
    let parked_at = ctx.tilemap.access_roads(id).first().copied()?;
    let capacity = ctx.config.cart_capacity;
    let stock = ctx.buildings.get_mut(id)?.production_mut()?.load_cart(capacity)?;
    let max_distance = ctx.config.deliver_distance;

    let cart = match find_delivery(ctx, Seed::Building(id), id, &stock, max_distance) {
        Some(destination) => CartPusher::dispatched(id, stock, destination, max_distance),
        None => {
            tracing::debug!(producer = ?id, good = %stock.good(), "no destination for goods");
            ctx.events.emit(Event::NoDestination {
                origin: id,
                good: stock.good(),
                quantity: stock.quantity(),
                tick: ctx.tick,
            });
            CartPusher::parked(id, stock, parked_at, max_distance)
        }
    };
    Some(Walker::CartPusher(cart))
}

/// Ship out goods a warehouse or granary was ordered to empty.
fn devastate(ctx: &mut Ctx, id: BuildingId) -> Option<Walker> {
    let (good, available) = {
        let building = ctx.live(id)?;
        if !building.walkers().is_empty() {
            return None;
        }
        building.storage()?.devastation_goods().into_iter().next()?
    };
    let amount = available.min(ctx.config.cart_capacity);
    let max_distance = ctx.config.deliver_distance;
    let promise = GoodStock::filled(good, amount, amount);
    let destination = find_delivery(ctx, Seed::Building(id), id, &promise, max_distance)?;

    let mut cart = GoodStock::new(good, amount);
    if let Some(store) = ctx.buildings.get_mut(id).and_then(Building::store_mut) {
        store.retrieve(&mut cart, amount);
    }
    Some(Walker::CartPusher(CartPusher::dispatched(
        id,
        cart,
        destination,
        max_distance,
    )))
}

/// Send a buyer to restock the market.
fn send_buyer(ctx: &mut Ctx, id: BuildingId) -> Option<Walker> {
    let building = ctx.live(id)?;
    if !building.workforce().has_workers() || !building.walkers().is_empty() {
        return None;
    }
    let basket = buyer_basket();
    let pickup = find_purchase(ctx, id, &basket)?;
    Some(Walker::MarketBuyer(MarketBuyer::new(id, pickup)))
}
