use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::QuoteInput;

/// Physical profile of an item type, supplied by the external item-type
/// lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemProfile {
    pub name: String,
    pub category: String,
    pub volume_m3: Decimal,
    pub weight_kg: Decimal,
}

/// Lookup abstraction over the item-type reference data. The engine only
/// reads from it; maintenance of the catalogue lives elsewhere.
pub trait ItemCatalog: Send + Sync {
    fn profile(&self, item_type_id: &str) -> Option<ItemProfile>;
}

/// Aggregate volume across the quoted items. Unknown item types contribute
/// nothing; the confidence scorer is where missing coverage is penalized.
pub fn total_volume(catalog: &dyn ItemCatalog, input: &QuoteInput) -> Decimal {
    input
        .items
        .iter()
        .filter_map(|item| {
            catalog
                .profile(&item.item_type_id)
                .map(|profile| profile.volume_m3 * Decimal::from(item.quantity))
        })
        .sum()
}

/// Aggregate weight across the quoted items.
pub fn total_weight(catalog: &dyn ItemCatalog, input: &QuoteInput) -> Decimal {
    input
        .items
        .iter()
        .filter_map(|item| {
            catalog
                .profile(&item.item_type_id)
                .map(|profile| profile.weight_kg * Decimal::from(item.quantity))
        })
        .sum()
}

/// Share of quoted items the catalogue recognizes, in `[0, 1]`.
pub fn coverage(catalog: &dyn ItemCatalog, input: &QuoteInput) -> f64 {
    if input.items.is_empty() {
        return 0.0;
    }
    let known = input
        .items
        .iter()
        .filter(|item| catalog.profile(&item.item_type_id).is_some())
        .count();
    known as f64 / input.items.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::domain::{AccessDifficulty, QuoteItem};
    use std::collections::HashMap;

    struct FixedCatalog(HashMap<String, ItemProfile>);

    impl ItemCatalog for FixedCatalog {
        fn profile(&self, item_type_id: &str) -> Option<ItemProfile> {
            self.0.get(item_type_id).cloned()
        }
    }

    fn catalog() -> FixedCatalog {
        let mut profiles = HashMap::new();
        profiles.insert(
            "sofa".to_string(),
            ItemProfile {
                name: "Two-seater sofa".to_string(),
                category: "furniture".to_string(),
                volume_m3: Decimal::new(15, 1),
                weight_kg: Decimal::new(45, 0),
            },
        );
        FixedCatalog(profiles)
    }

    fn input(items: Vec<QuoteItem>) -> QuoteInput {
        QuoteInput {
            postcode: "SW1A 1AA".to_string(),
            items,
            access_difficulty: AccessDifficulty::Normal,
            collection_date: None,
            special_handling: false,
        }
    }

    #[test]
    fn aggregates_scale_with_quantity() {
        let catalog = catalog();
        let input = input(vec![QuoteItem {
            item_type_id: "sofa".to_string(),
            quantity: 2,
        }]);

        assert_eq!(total_volume(&catalog, &input), Decimal::new(30, 1));
        assert_eq!(total_weight(&catalog, &input), Decimal::new(90, 0));
    }

    #[test]
    fn unknown_items_drop_out_of_aggregates_but_hurt_coverage() {
        let catalog = catalog();
        let input = input(vec![
            QuoteItem {
                item_type_id: "sofa".to_string(),
                quantity: 1,
            },
            QuoteItem {
                item_type_id: "mystery".to_string(),
                quantity: 1,
            },
        ]);

        assert_eq!(total_volume(&catalog, &input), Decimal::new(15, 1));
        assert!((coverage(&catalog, &input) - 0.5).abs() < f64::EPSILON);
    }
}
