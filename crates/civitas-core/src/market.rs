use crate::good::{Good, GoodStock};
use crate::store::GoodStore;
use serde::{Deserialize, Serialize};

pub const MARKET_CAPACITY: u32 = 5000;

/// A good is requested from storage only when this much room is free.
pub const DEMAND_THRESHOLD: u32 = 200;

const MARKET_GOODS: [(Good, u32); 9] = [
    (Good::Wheat, 800),
    (Good::Fish, 600),
    (Good::Fruit, 600),
    (Good::Meat, 600),
    (Good::Vegetable, 600),
    (Good::Pottery, 250),
    (Good::Furniture, 250),
    (Good::Oil, 250),
    (Good::Wine, 250),
];

const BASKET_CAPACITY: u32 = 800;

const BASKET_GOODS: [(Good, u32); 9] = [
    (Good::Wheat, 800),
    (Good::Fish, 800),
    (Good::Fruit, 800),
    (Good::Meat, 800),
    (Good::Vegetable, 800),
    (Good::Pottery, 300),
    (Good::Furniture, 300),
    (Good::Oil, 300),
    (Good::Wine, 300),
];

/// A market's stall stock and what it wants from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRole {
    store: GoodStore,
}

impl Default for MarketRole {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketRole {
    pub fn new() -> Self {
        Self {
            store: GoodStore::with_goods(MARKET_CAPACITY, &MARKET_GOODS),
        }
    }

    pub fn store(&self) -> &GoodStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GoodStore {
        &mut self.store
    }

    /// Free room for `good`, rounded down to whole hundreds.
    pub fn demand(&self, good: Good) -> u32 {
        let free = self
            .store
            .capacity(good)
            .saturating_sub(self.store.quantity(good));
        (free / 100) * 100
    }

    /// Goods with more than [`DEMAND_THRESHOLD`] free room, emptiest first.
    pub fn most_needed_goods(&self) -> Vec<Good> {
        let mut needed: Vec<(u64, Good)> = Good::ALL
            .into_iter()
            .filter(|&g| {
                self.store.capacity(g).saturating_sub(self.store.quantity(g)) > DEMAND_THRESHOLD
            })
            .map(|g| {
                // Fill ratio scaled to an integer so the ordering is exact.
                let ratio = (self.store.quantity(g) as u64 * 1_000_000)
                    / self.store.capacity(g).max(1) as u64;
                (ratio, g)
            })
            .collect();
        needed.sort_by_key(|&(ratio, good)| (ratio, good));
        needed.into_iter().map(|(_, g)| g).collect()
    }

    /// Move everything in `basket` into the stalls. Whatever does not fit
    /// stays in the basket; returns that amount.
    pub fn store_all(&mut self, basket: &mut GoodStore) -> u32 {
        let mut left = 0;
        for good in Good::ALL {
            let qty = basket.quantity(good);
            if qty == 0 {
                continue;
            }
            let mut carried = GoodStock::new(good, qty);
            basket.retrieve(&mut carried, qty);
            self.store.store(&mut carried, qty);
            let rest = carried.quantity();
            basket.store(&mut carried, rest);
            left += rest;
        }
        left
    }
}

/// The goods store a market buyer carries around.
pub fn buyer_basket() -> GoodStore {
    GoodStore::with_goods(BASKET_CAPACITY, &BASKET_GOODS)
}
