//! Property-based tests for the cart.
//!
//! Whatever sequence of edits is applied, the cart persisted on the device
//! must equal the cart held in memory after every single operation.

use proptest::prelude::*;
use std::sync::Arc;

use studio_storefront::models::{default_catalog, CartItem};
use studio_storefront::services::CartStore;
use studio_storefront::storage::{load_json, MemoryStore, CART_KEY};

#[derive(Clone, Debug)]
enum CartOp {
    Add(usize),
    AddVariation(usize, usize),
    Remove(usize),
    SetQuantity(usize, u32),
    Clear,
}

fn op_strategy() -> impl Strategy<Value = CartOp> {
    prop_oneof![
        4 => (0usize..6).prop_map(CartOp::Add),
        2 => (0usize..6, 0usize..4).prop_map(|(s, v)| CartOp::AddVariation(s, v)),
        2 => (0usize..6).prop_map(CartOp::Remove),
        2 => (0usize..6, 0u32..5).prop_map(|(s, q)| CartOp::SetQuantity(s, q)),
        1 => Just(CartOp::Clear),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn persisted_cart_matches_memory(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let catalog = default_catalog();
        let store = Arc::new(MemoryStore::new());
        let mut cart = CartStore::load(store.clone()).unwrap();

        for op in ops {
            match op {
                CartOp::Add(i) => cart.add(&catalog[i]).unwrap(),
                CartOp::AddVariation(i, v) => {
                    let label = catalog[i].variations.get(v).cloned().unwrap_or_default();
                    cart.add_variation(&catalog[i], &label).unwrap()
                }
                CartOp::Remove(i) => cart.remove(&catalog[i].id).unwrap(),
                CartOp::SetQuantity(i, q) => cart.set_quantity(&catalog[i].id, q).unwrap(),
                CartOp::Clear => cart.clear().unwrap(),
            }

            let persisted: Vec<CartItem> = load_json(store.as_ref(), CART_KEY)
                .unwrap()
                .unwrap_or_default();
            prop_assert_eq!(&persisted, &cart.items().to_vec());
        }
    }

    #[test]
    fn one_line_per_service(adds in prop::collection::vec(0usize..6, 1..30)) {
        let catalog = default_catalog();
        let mut cart = CartStore::load(Arc::new(MemoryStore::new())).unwrap();
        for &i in &adds {
            cart.add(&catalog[i]).unwrap();
        }

        let mut ids: Vec<&str> = cart.items().iter().map(|i| i.service_id.as_str()).collect();
        let lines = ids.len();
        ids.sort_unstable();
        ids.dedup();
        prop_assert_eq!(ids.len(), lines);
        prop_assert_eq!(cart.item_count() as usize, adds.len());
        prop_assert!(cart.items().iter().all(|i| i.quantity > 0));
    }
}
