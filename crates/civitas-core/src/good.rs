use crate::calendar::SimDate;
use serde::{Deserialize, Serialize};

/// A tradeable commodity.
///
/// The declaration order is the iteration order used by stores and the
/// state hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Good {
    Wheat,
    Fish,
    Meat,
    Fruit,
    Vegetable,
    Olive,
    Oil,
    Grape,
    Wine,
    Timber,
    Furniture,
    Clay,
    Pottery,
    Iron,
    Weapon,
    Marble,
}

impl Good {
    pub const COUNT: usize = 16;

    pub const ALL: [Good; Good::COUNT] = [
        Good::Wheat,
        Good::Fish,
        Good::Meat,
        Good::Fruit,
        Good::Vegetable,
        Good::Olive,
        Good::Oil,
        Good::Grape,
        Good::Wine,
        Good::Timber,
        Good::Furniture,
        Good::Clay,
        Good::Pottery,
        Good::Iron,
        Good::Weapon,
        Good::Marble,
    ];

    /// Dense index for per-good arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Goods a granary accepts and market buyers treat as food.
    pub fn is_food(self) -> bool {
        matches!(
            self,
            Good::Wheat | Good::Fish | Good::Meat | Good::Fruit | Good::Vegetable
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Good::Wheat => "wheat",
            Good::Fish => "fish",
            Good::Meat => "meat",
            Good::Fruit => "fruit",
            Good::Vegetable => "vegetable",
            Good::Olive => "olive",
            Good::Oil => "oil",
            Good::Grape => "grape",
            Good::Wine => "wine",
            Good::Timber => "timber",
            Good::Furniture => "furniture",
            Good::Clay => "clay",
            Good::Pottery => "pottery",
            Good::Iron => "iron",
            Good::Weapon => "weapon",
            Good::Marble => "marble",
        }
    }
}

impl std::fmt::Display for Good {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// GoodStock
// ---------------------------------------------------------------------------

/// A bounded quantity of one good.
///
/// A stock is owned by exactly one holder (a factory slot, a store, a cart)
/// and goods move between holders by value through [`GoodStock::transfer`].
/// `quantity <= capacity` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodStock {
    good: Good,
    quantity: u32,
    capacity: u32,
    #[serde(default)]
    expires: Option<SimDate>,
}

impl GoodStock {
    /// An empty stock of `good` able to hold `capacity` units.
    pub fn new(good: Good, capacity: u32) -> Self {
        Self {
            good,
            quantity: 0,
            capacity,
            expires: None,
        }
    }

    /// A stock filled with `quantity` units (clamped to `capacity`).
    pub fn filled(good: Good, quantity: u32, capacity: u32) -> Self {
        Self {
            good,
            quantity: quantity.min(capacity),
            capacity,
            expires: None,
        }
    }

    pub fn with_expiry(mut self, date: SimDate) -> Self {
        self.expires = Some(date);
        self
    }

    pub fn good(&self) -> Good {
        self.good
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn free(&self) -> u32 {
        self.capacity - self.quantity
    }

    pub fn is_empty(&self) -> bool {
        self.quantity == 0
    }

    pub fn expires(&self) -> Option<SimDate> {
        self.expires
    }

    /// Change the capacity. Quantity above the new capacity is discarded
    /// and returned.
    pub fn set_capacity(&mut self, capacity: u32) -> u32 {
        self.capacity = capacity;
        let excess = self.quantity.saturating_sub(capacity);
        self.quantity -= excess;
        excess
    }

    /// Re-type an empty stock. No effect while it holds goods.
    pub fn retype(&mut self, good: Good) {
        if self.quantity == 0 {
            self.good = good;
            self.expires = None;
        }
    }

    /// Move up to `amount` units from `source` into `self`.
    ///
    /// Goods only move between stocks of the same type; an empty `self` is
    /// re-typed to `source`'s good first. The merged stock keeps the
    /// earlier expiry date. Returns the amount moved.
    pub fn transfer(&mut self, source: &mut GoodStock, amount: u32) -> u32 {
        if source.quantity == 0 {
            return 0;
        }
        self.retype(source.good);
        if self.good != source.good {
            return 0;
        }

        let moved = amount.min(source.quantity).min(self.free());
        if moved == 0 {
            return 0;
        }

        self.expires = match (self.expires, source.expires) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.quantity += moved;
        source.quantity -= moved;
        if source.quantity == 0 {
            source.expires = None;
        }
        moved
    }

    /// Discard everything if the stock has expired by `date`. Returns the
    /// quantity discarded.
    pub fn discard_if_expired(&mut self, date: SimDate) -> u32 {
        match self.expires {
            Some(expiry) if expiry <= date && self.quantity > 0 => {
                let lost = self.quantity;
                self.quantity = 0;
                self.expires = None;
                lost
            }
            _ => 0,
        }
    }
}
