//! Property tests for ingredient grouping.

use std::collections::BTreeSet;

use proptest::prelude::*;
use routine_advisor::engine::grouping::{group_by_ingredients, IngredientGroup, GENERAL_GROUP_LABEL};
use routine_advisor::engine::types::AlternativeProduct;

const INGREDIENTS: &[&str] = &[
    "Niacinamide",
    "Salicylic Acid",
    "Ceramides",
    "Hyaluronic Acid",
    "Retinol",
    "Zinc PCA",
    "aloe vera",
];

fn product(id: usize, ingredients: Vec<&str>) -> AlternativeProduct {
    AlternativeProduct {
        product_id: format!("P{id}"),
        variant_id: id.to_string(),
        product_name: format!("Product {id}"),
        product_url: String::new(),
        product_image_url: String::new(),
        price: "₹1".into(),
        original_price: "₹1".into(),
        key_ingredients: ingredients.into_iter().map(String::from).collect(),
    }
}

/// Up to 8 products with unique ids and 0..=3 ingredients each.
fn products() -> impl Strategy<Value = Vec<AlternativeProduct>> {
    prop::collection::vec(
        prop::collection::vec(prop::sample::select(INGREDIENTS), 0..=3),
        0..8,
    )
    .prop_map(|lists| {
        lists
            .into_iter()
            .enumerate()
            .map(|(i, ingredients)| product(i, ingredients))
            .collect()
    })
}

/// Membership as a set of id-sets, independent of any ordering.
fn partition(groups: &[IngredientGroup<AlternativeProduct>]) -> BTreeSet<(String, BTreeSet<String>)> {
    groups
        .iter()
        .map(|g| {
            (
                g.label.clone(),
                g.members.iter().map(|p| p.product_id.clone()).collect(),
            )
        })
        .collect()
}

proptest! {
    #[test]
    fn membership_ignores_input_order(
        (items, shuffled) in products().prop_flat_map(|items| {
            let shuffled = Just(items.clone()).prop_shuffle();
            (Just(items), shuffled)
        }),
        primary in 0usize..8,
    ) {
        let primary_id = format!("P{primary}");
        let a = group_by_ingredients(&items, &primary_id);
        let b = group_by_ingredients(&shuffled, &primary_id);
        prop_assert_eq!(partition(&a), partition(&b));
    }

    #[test]
    fn grouping_is_idempotent(items in products(), primary in 0usize..8) {
        let primary_id = format!("P{primary}");
        let first = group_by_ingredients(&items, &primary_id);
        let flattened: Vec<AlternativeProduct> =
            first.iter().flat_map(|g| g.members.iter().cloned()).collect();
        let second = group_by_ingredients(&flattened, &primary_id);
        prop_assert_eq!(partition(&first), partition(&second));
        prop_assert_eq!(group_by_ingredients(&items, &primary_id), first);
    }

    #[test]
    fn every_product_lands_in_exactly_one_group(items in products(), primary in 0usize..8) {
        let primary_id = format!("P{primary}");
        let groups = group_by_ingredients(&items, &primary_id);

        let mut ids: Vec<&str> = groups
            .iter()
            .flat_map(|g| g.members.iter().map(|p| p.product_id.as_str()))
            .collect();
        ids.sort_unstable();
        let mut expected: Vec<&str> = items.iter().map(|p| p.product_id.as_str()).collect();
        expected.sort_unstable();
        prop_assert_eq!(ids, expected);

        for group in &groups {
            prop_assert!(!group.members.is_empty());
            if group.label != GENERAL_GROUP_LABEL {
                prop_assert!(group.members.iter().all(|p| !p.key_ingredients.is_empty()));
            }
        }
        if let Some(pos) = groups
            .iter()
            .position(|g| g.members.iter().any(|p| p.product_id == primary_id))
        {
            prop_assert_eq!(pos, 0);
            prop_assert_eq!(&groups[0].members[0].product_id, &primary_id);
        }
    }

    #[test]
    fn groups_share_no_ingredients(items in products()) {
        let groups = group_by_ingredients(&items, "none");
        let sets: Vec<BTreeSet<&str>> = groups
            .iter()
            .map(|g| {
                g.members
                    .iter()
                    .flat_map(|p| p.key_ingredients.iter().map(String::as_str))
                    .collect()
            })
            .collect();
        for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                prop_assert!(sets[i].is_disjoint(&sets[j]));
            }
        }
    }
}
