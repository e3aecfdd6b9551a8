//! Warehouses and granaries.
//!
//! A [`StorageRole`] wraps a [`GoodStore`] with the acceptance rules of a
//! storage building: which goods it may hold at all, the player's per-good
//! orders, and the staffing threshold below which it only hands goods out.

use crate::good::Good;
use crate::store::GoodStore;
use crate::workforce::Workforce;
use serde::{Deserialize, Serialize};

pub const WAREHOUSE_CAPACITY: u32 = 3200;
pub const GRANARY_CAPACITY: u32 = 2400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    Warehouse,
    Granary,
}

/// Player order for one good at one storage building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoodOrder {
    #[default]
    Accept,
    /// Refuse new deliveries, keep what is stored.
    Reject,
    /// Refuse new deliveries and send stored goods elsewhere.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageRole {
    kind: StorageKind,
    store: GoodStore,
    orders: Vec<GoodOrder>,
}

impl StorageRole {
    pub fn new(kind: StorageKind) -> Self {
        let store = match kind {
            StorageKind::Warehouse => GoodStore::new(WAREHOUSE_CAPACITY),
            StorageKind::Granary => {
                let food: Vec<(Good, u32)> = Good::ALL
                    .into_iter()
                    .filter(|g| g.is_food())
                    .map(|g| (g, GRANARY_CAPACITY))
                    .collect();
                GoodStore::with_goods(GRANARY_CAPACITY, &food)
            }
        };
        Self {
            kind,
            store,
            orders: vec![GoodOrder::Accept; Good::COUNT],
        }
    }

    pub fn warehouse() -> Self {
        Self::new(StorageKind::Warehouse)
    }

    pub fn granary() -> Self {
        Self::new(StorageKind::Granary)
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn store(&self) -> &GoodStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GoodStore {
        &mut self.store
    }

    /// Whether this kind of building can ever hold `good`.
    pub fn handles(&self, good: Good) -> bool {
        match self.kind {
            StorageKind::Warehouse => true,
            StorageKind::Granary => good.is_food(),
        }
    }

    pub fn order(&self, good: Good) -> GoodOrder {
        self.orders[good.index()]
    }

    pub fn set_order(&mut self, good: Good, order: GoodOrder) {
        self.orders[good.index()] = order;
    }

    /// Too few workers to receive goods; stored goods can still leave.
    pub fn only_dispatch(&self, workforce: Workforce) -> bool {
        workforce.is_understaffed() || !workforce.has_workers()
    }

    /// Space for incoming `good`, honoring orders and staffing.
    pub fn max_store(&self, good: Good, workforce: Workforce) -> u32 {
        if !self.handles(good)
            || self.order(good) != GoodOrder::Accept
            || self.only_dispatch(workforce)
        {
            return 0;
        }
        self.store.max_store(good)
    }

    pub fn max_retrieve(&self, good: Good) -> u32 {
        self.store.max_retrieve(good)
    }

    /// Stored goods the player asked to move out, with retrievable amounts.
    pub fn devastation_goods(&self) -> Vec<(Good, u32)> {
        Good::ALL
            .into_iter()
            .filter(|&g| self.order(g) == GoodOrder::Empty)
            .map(|g| (g, self.store.max_retrieve(g)))
            .filter(|&(_, qty)| qty > 0)
            .collect()
    }
}
