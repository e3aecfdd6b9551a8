//! Capacity-bounded goods container with two-phase reservations.
//!
//! A [`GoodStore`] holds one [`GoodStock`] slot per good plus an aggregate
//! capacity shared by all of them. Walkers that intend to deliver or fetch
//! goods first *reserve* space or quantity, walk to the building, and then
//! *apply* the reservation on arrival. Reserved space and quantity are
//! invisible to every other caller until the reservation is applied or
//! cancelled, so two carts can never both claim the last free slot.
//!
//! Nothing here fails loudly: store and retrieve move as much as fits and
//! report how much that was, and a stale reservation id is a no-op.

use crate::calendar::SimDate;
use crate::good::{Good, GoodStock};
use crate::id::ReservationId;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

/// Whether a reservation earmarks free space or existing goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationKind {
    Storage,
    Retrieval,
}

/// An earmark against a store's future capacity or quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub kind: ReservationKind,
    pub good: Good,
    pub quantity: u32,
    pub created: SimDate,
}

// ---------------------------------------------------------------------------
// GoodStore
// ---------------------------------------------------------------------------

/// A store of every good with per-good and aggregate capacity limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodStore {
    stocks: Vec<GoodStock>,
    capacity: u32,
    reservations: SlotMap<ReservationId, Reservation>,
    #[serde(skip)]
    changed: bool,
}

impl PartialEq for GoodStore {
    fn eq(&self, other: &Self) -> bool {
        self.capacity == other.capacity
            && self.stocks == other.stocks
            && self.reservations.len() == other.reservations.len()
            && self
                .reservations
                .iter()
                .all(|(id, r)| other.reservations.get(id) == Some(r))
    }
}

impl GoodStore {
    /// A store whose aggregate capacity is `capacity`, with every good
    /// allowed to fill all of it.
    pub fn new(capacity: u32) -> Self {
        Self {
            stocks: Good::ALL
                .iter()
                .map(|&good| GoodStock::new(good, capacity))
                .collect(),
            capacity,
            reservations: SlotMap::with_key(),
            changed: false,
        }
    }

    /// A store that only accepts the listed goods, each with its own cap.
    pub fn with_goods(capacity: u32, goods: &[(Good, u32)]) -> Self {
        let mut store = Self::new(capacity);
        for stock in &mut store.stocks {
            stock.set_capacity(0);
        }
        for &(good, cap) in goods {
            store.stocks[good.index()].set_capacity(cap);
        }
        store
    }

    // -- Capacity queries --

    /// Aggregate capacity shared by all goods.
    pub fn total_capacity(&self) -> u32 {
        self.capacity
    }

    /// Sum of all stored quantities.
    pub fn total_quantity(&self) -> u32 {
        self.stocks.iter().map(GoodStock::quantity).sum()
    }

    /// Capacity of the slot for `good`.
    pub fn capacity(&self, good: Good) -> u32 {
        self.stocks[good.index()].capacity()
    }

    pub fn quantity(&self, good: Good) -> u32 {
        self.stocks[good.index()].quantity()
    }

    /// Free space in the slot for `good`, ignoring reservations.
    pub fn free_capacity(&self, good: Good) -> u32 {
        let slot = self.stocks[good.index()].free();
        let total = self.capacity.saturating_sub(self.total_quantity());
        slot.min(total)
    }

    /// Space available for new deliveries of `good`: free space minus
    /// outstanding storage reservations, bounded by both the slot and the
    /// aggregate limit.
    pub fn max_store(&self, good: Good) -> u32 {
        let slot = self.stocks[good.index()]
            .free()
            .saturating_sub(self.reserved(ReservationKind::Storage, Some(good)));
        let total = self
            .capacity
            .saturating_sub(self.total_quantity())
            .saturating_sub(self.reserved(ReservationKind::Storage, None));
        slot.min(total)
    }

    /// Quantity of `good` that is not already promised to a retrieval.
    pub fn max_retrieve(&self, good: Good) -> u32 {
        self.quantity(good)
            .saturating_sub(self.reserved(ReservationKind::Retrieval, Some(good)))
    }

    /// Sum of outstanding reservations of `kind`, for one good or all.
    pub fn reserved(&self, kind: ReservationKind, good: Option<Good>) -> u32 {
        self.reservations
            .values()
            .filter(|r| r.kind == kind && good.is_none_or(|g| g == r.good))
            .map(|r| r.quantity)
            .sum()
    }

    /// Iterate over the non-empty stocks in good order.
    pub fn stocks(&self) -> impl Iterator<Item = &GoodStock> {
        self.stocks.iter().filter(|s| !s.is_empty())
    }

    // -- Capacity changes --

    /// Change the cap of one good's slot. Goods above the new cap are
    /// discarded and returned.
    pub fn set_capacity(&mut self, good: Good, capacity: u32) -> u32 {
        let lost = self.stocks[good.index()].set_capacity(capacity);
        self.changed |= lost > 0;
        lost
    }

    // -- Direct store / retrieve --

    /// Move up to `amount` units from `stock` into the store, limited by
    /// [`max_store`](Self::max_store). Returns the amount stored.
    pub fn store(&mut self, stock: &mut GoodStock, amount: u32) -> u32 {
        let good = stock.good();
        let amount = amount.min(self.max_store(good));
        self.store_unchecked(stock, amount)
    }

    /// Move up to `amount` units of `stock`'s good out of the store into
    /// `stock`, limited by [`max_retrieve`](Self::max_retrieve) and the
    /// stock's free space. Returns the amount retrieved.
    pub fn retrieve(&mut self, stock: &mut GoodStock, amount: u32) -> u32 {
        let good = stock.good();
        let amount = amount.min(self.max_retrieve(good));
        self.retrieve_unchecked(stock, amount)
    }

    fn store_unchecked(&mut self, stock: &mut GoodStock, amount: u32) -> u32 {
        let moved = self.stocks[stock.good().index()].transfer(stock, amount);
        self.changed |= moved > 0;
        moved
    }

    fn retrieve_unchecked(&mut self, stock: &mut GoodStock, amount: u32) -> u32 {
        let slot = &mut self.stocks[stock.good().index()];
        let moved = stock.transfer(slot, amount);
        self.changed |= moved > 0;
        moved
    }

    // -- Reservations --

    /// Earmark space for the whole of `stock`. Fails when the stock is
    /// empty or the space is not available.
    pub fn reserve_storage(&mut self, stock: &GoodStock, date: SimDate) -> Option<ReservationId> {
        let quantity = stock.quantity();
        if quantity == 0 || self.max_store(stock.good()) < quantity {
            return None;
        }
        Some(self.reservations.insert(Reservation {
            kind: ReservationKind::Storage,
            good: stock.good(),
            quantity,
            created: date,
        }))
    }

    /// Earmark `quantity` units of `good` for a later pickup.
    pub fn reserve_retrieval(
        &mut self,
        good: Good,
        quantity: u32,
        date: SimDate,
    ) -> Option<ReservationId> {
        if quantity == 0 || self.max_retrieve(good) < quantity {
            return None;
        }
        Some(self.reservations.insert(Reservation {
            kind: ReservationKind::Retrieval,
            good,
            quantity,
            created: date,
        }))
    }

    /// Commit a storage reservation: move up to the reserved quantity from
    /// `stock` into the store and release the earmark.
    ///
    /// Returns 0 without touching anything when `id` is unknown, already
    /// used, a retrieval, or reserved for a different good.
    pub fn apply_storage_reservation(&mut self, stock: &mut GoodStock, id: ReservationId) -> u32 {
        let Some(reserved) = self.take_reservation(id, ReservationKind::Storage, stock.good())
        else {
            return 0;
        };
        let amount = reserved.quantity.min(self.max_store(reserved.good));
        self.store_unchecked(stock, amount)
    }

    /// Commit a retrieval reservation: move up to the reserved quantity
    /// into `stock` and release the earmark. Same no-op rules as
    /// [`apply_storage_reservation`](Self::apply_storage_reservation).
    pub fn apply_retrieve_reservation(&mut self, stock: &mut GoodStock, id: ReservationId) -> u32 {
        let Some(reserved) = self.take_reservation(id, ReservationKind::Retrieval, stock.good())
        else {
            return 0;
        };
        let amount = reserved.quantity.min(self.max_retrieve(reserved.good));
        self.retrieve_unchecked(stock, amount)
    }

    fn take_reservation(
        &mut self,
        id: ReservationId,
        kind: ReservationKind,
        good: Good,
    ) -> Option<Reservation> {
        match self.reservations.get(id) {
            Some(r) if r.kind == kind && r.good == good => self.reservations.remove(id),
            _ => None,
        }
    }

    /// Release a reservation without moving goods. Returns whether the id
    /// was still outstanding.
    pub fn cancel_reservation(&mut self, id: ReservationId) -> bool {
        self.reservations.remove(id).is_some()
    }

    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// Drop reservations created more than `max_age_days` before `now`.
    /// Returns how many were dropped.
    pub fn purge_reservations(&mut self, now: SimDate, max_age_days: u32) -> usize {
        let before = self.reservations.len();
        self.reservations
            .retain(|_, r| now.days_since(r.created) <= max_age_days);
        before - self.reservations.len()
    }

    // -- Housekeeping --

    /// Discard stocks whose expiry date has passed. Returns what was lost.
    pub fn remove_expired(&mut self, now: SimDate) -> Vec<(Good, u32)> {
        let mut lost = Vec::new();
        for stock in &mut self.stocks {
            let qty = stock.discard_if_expired(now);
            if qty > 0 {
                lost.push((stock.good(), qty));
            }
        }
        self.changed |= !lost.is_empty();
        lost
    }

    /// Whether the store changed since the last call, clearing the flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}
