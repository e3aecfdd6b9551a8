//! Property-based tests for the goods store and its reservation protocol.
//!
//! Generates random sequences of store, retrieve, reserve, apply and
//! cancel operations and checks the capacity and conservation invariants
//! after every step.

use civitas_core::calendar::SimDate;
use civitas_core::good::{Good, GoodStock};
use civitas_core::id::ReservationId;
use civitas_core::store::{GoodStore, ReservationKind};
use proptest::prelude::*;

// ===========================================================================
// Generators
// ===========================================================================

const GOODS: [Good; 3] = [Good::Wheat, Good::Clay, Good::Pottery];

#[derive(Debug, Clone)]
enum Op {
    Store(usize, u32),
    Retrieve(usize, u32),
    ReserveStorage(usize, u32),
    ReserveRetrieval(usize, u32),
    Apply(usize),
    Cancel(usize),
}

fn arb_ops(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(
        prop_oneof![
            (0..3usize, 0..500u32).prop_map(|(g, q)| Op::Store(g, q)),
            (0..3usize, 0..500u32).prop_map(|(g, q)| Op::Retrieve(g, q)),
            (0..3usize, 0..500u32).prop_map(|(g, q)| Op::ReserveStorage(g, q)),
            (0..3usize, 0..500u32).prop_map(|(g, q)| Op::ReserveRetrieval(g, q)),
            (0..20usize).prop_map(Op::Apply),
            (0..20usize).prop_map(Op::Cancel),
        ],
        1..=max_ops,
    )
}

fn arb_store() -> impl Strategy<Value = GoodStore> {
    (100..2000u32, 50..1000u32).prop_map(|(total, slot)| {
        GoodStore::with_goods(total, &GOODS.map(|g| (g, slot)))
    })
}

// ===========================================================================
// Invariants
// ===========================================================================

fn check_invariants(store: &GoodStore) -> Result<(), TestCaseError> {
    prop_assert!(store.total_quantity() <= store.total_capacity());
    let reserved_in = store.reserved(ReservationKind::Storage, None);
    prop_assert!(store.total_quantity() + reserved_in <= store.total_capacity());
    for good in GOODS {
        prop_assert!(store.quantity(good) <= store.capacity(good));
        prop_assert!(
            store.quantity(good) + store.reserved(ReservationKind::Storage, Some(good))
                <= store.capacity(good)
        );
        prop_assert!(store.reserved(ReservationKind::Retrieval, Some(good)) <= store.quantity(good));
    }
    Ok(())
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Capacity and reservation bounds hold after any operation sequence,
    /// and goods are conserved between the store and the outside world.
    #[test]
    fn invariants_hold(mut store in arb_store(), ops in arb_ops(60)) {
        let today = SimDate::from_days(0);
        let mut carts: Vec<(ReservationId, GoodStock)> = Vec::new();
        let mut outside_in: u64 = 0;
        let mut outside_out: u64 = 0;

        for op in ops {
            match op {
                Op::Store(g, q) => {
                    let mut load = GoodStock::filled(GOODS[g], q, q);
                    outside_in += store.store(&mut load, q) as u64;
                }
                Op::Retrieve(g, q) => {
                    let mut cart = GoodStock::new(GOODS[g], q);
                    outside_out += store.retrieve(&mut cart, q) as u64;
                }
                Op::ReserveStorage(g, q) => {
                    let cart = GoodStock::filled(GOODS[g], q, q);
                    if let Some(id) = store.reserve_storage(&cart, today) {
                        carts.push((id, cart));
                    }
                }
                Op::ReserveRetrieval(g, q) => {
                    if let Some(id) = store.reserve_retrieval(GOODS[g], q, today) {
                        carts.push((id, GoodStock::new(GOODS[g], q)));
                    }
                }
                Op::Apply(i) => {
                    if carts.is_empty() {
                        continue;
                    }
                    let (id, mut cart) = carts.remove(i % carts.len());
                    let kind = store.reservation(id).map(|r| r.kind);
                    match kind {
                        Some(ReservationKind::Storage) => {
                            let before = cart.quantity();
                            let moved = store.apply_storage_reservation(&mut cart, id);
                            // A reserved delivery always fits in full.
                            prop_assert_eq!(moved, before);
                            outside_in += moved as u64;
                        }
                        Some(ReservationKind::Retrieval) => {
                            let wanted = cart.capacity();
                            let moved = store.apply_retrieve_reservation(&mut cart, id);
                            prop_assert_eq!(moved, wanted);
                            outside_out += moved as u64;
                        }
                        None => {}
                    }
                }
                Op::Cancel(i) => {
                    if carts.is_empty() {
                        continue;
                    }
                    let (id, _) = carts.remove(i % carts.len());
                    prop_assert!(store.cancel_reservation(id));
                }
            }
            check_invariants(&store)?;
            prop_assert_eq!(store.total_quantity() as u64, outside_in - outside_out);
        }
    }

    /// Two reservations that together exceed the free space never both
    /// succeed.
    #[test]
    fn reservations_never_overbook(free in 1..1000u32, a in 1..1000u32, b in 1..1000u32) {
        let mut store = GoodStore::new(free);
        let today = SimDate::from_days(0);
        let ra = store.reserve_storage(&GoodStock::filled(Good::Wheat, a, a), today);
        let rb = store.reserve_storage(&GoodStock::filled(Good::Wheat, b, b), today);
        if a + b > free {
            prop_assert!(ra.is_none() || rb.is_none());
        }
        prop_assert_eq!(ra.is_some(), a <= free);
    }
}
