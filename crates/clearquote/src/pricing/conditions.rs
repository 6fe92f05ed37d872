use chrono::{Datelike, Timelike};
use tracing::warn;

use super::catalog::{total_volume, total_weight, ItemCatalog};
use super::domain::{MatchMode, PricingRule, QuoteInput, RuleCondition};

/// Decide whether a rule's condition matches the quote input. Pure except
/// for the catalogue lookups behind volume/weight aggregates.
pub fn matches(rule: &PricingRule, input: &QuoteInput, catalog: &dyn ItemCatalog) -> bool {
    match &rule.condition {
        RuleCondition::Postcode { prefixes } => {
            let postcode = normalize_postcode(&input.postcode);
            prefixes.iter().any(|prefix| {
                let prefix = normalize_postcode(prefix);
                !prefix.is_empty() && postcode.starts_with(&prefix)
            })
        }
        RuleCondition::ItemType { item_type_ids } => input
            .items
            .iter()
            .any(|item| item_type_ids.contains(&item.item_type_id)),
        RuleCondition::Volume { min, max } => {
            let volume = total_volume(catalog, input);
            volume >= *min && volume <= *max
        }
        RuleCondition::Weight { min, max } => {
            let weight = total_weight(catalog, input);
            weight >= *min && weight <= *max
        }
        RuleCondition::AccessDifficulty { level, mode } => match mode {
            MatchMode::Exact => input.access_difficulty == *level,
            MatchMode::Minimum => input.access_difficulty >= *level,
        },
        RuleCondition::TimeOfDay {
            start_hour,
            end_hour,
        } => match input.collection_date {
            Some(when) => {
                let hour = when.hour() as u8;
                if start_hour <= end_hour {
                    hour >= *start_hour && hour < *end_hour
                } else {
                    // Window wraps midnight, e.g. 22:00-06:00.
                    hour >= *start_hour || hour < *end_hour
                }
            }
            None => false,
        },
        RuleCondition::DayOfWeek { days } => match input.collection_date {
            Some(when) => days.contains(&when.weekday()),
            None => false,
        },
        RuleCondition::SpecialHandling { required } => input.special_handling == *required,
        RuleCondition::Unsupported { kind } => {
            warn!(
                rule_id = %rule.id.0,
                condition_kind = %kind,
                "unrecognized condition kind never matches"
            );
            false
        }
    }
}

/// Uppercase and strip all whitespace so "sw1a 1aa" matches a "SW1A" prefix.
fn normalize_postcode(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::catalog::ItemProfile;
    use crate::pricing::domain::{
        AccessDifficulty, CalculationMethod, CostCenter, QuoteItem, RuleId, RuleType,
    };
    use chrono::{NaiveDate, Weekday};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    struct MapCatalog(HashMap<String, ItemProfile>);

    impl ItemCatalog for MapCatalog {
        fn profile(&self, item_type_id: &str) -> Option<ItemProfile> {
            self.0.get(item_type_id).cloned()
        }
    }

    fn catalog() -> MapCatalog {
        let mut profiles = HashMap::new();
        profiles.insert(
            "fridge".to_string(),
            ItemProfile {
                name: "Fridge freezer".to_string(),
                category: "appliance".to_string(),
                volume_m3: Decimal::new(8, 1),
                weight_kg: Decimal::new(60, 0),
            },
        );
        MapCatalog(profiles)
    }

    fn rule_with(condition: RuleCondition) -> PricingRule {
        PricingRule {
            id: RuleId("r-cond".to_string()),
            name: "condition under test".to_string(),
            rule_type: RuleType::Surcharge,
            condition,
            calculation: CalculationMethod::Fixed {
                base_amount: Decimal::new(5, 0),
            },
            min_amount: None,
            max_amount: None,
            priority: 1,
            applies_to: CostCenter::Transport,
            tax_rate_override: None,
            is_active: true,
        }
    }

    fn input() -> QuoteInput {
        QuoteInput {
            postcode: "sw1a 1aa".to_string(),
            items: vec![QuoteItem {
                item_type_id: "fridge".to_string(),
                quantity: 2,
            }],
            access_difficulty: AccessDifficulty::Difficult,
            collection_date: NaiveDate::from_ymd_opt(2025, 11, 1)
                .expect("valid date")
                .and_hms_opt(23, 30, 0),
            special_handling: false,
        }
    }

    #[test]
    fn postcode_prefix_ignores_case_and_whitespace() {
        let rule = rule_with(RuleCondition::Postcode {
            prefixes: vec!["SW1A".to_string(), "EC1".to_string()],
        });
        assert!(matches(&rule, &input(), &catalog()));

        let rule = rule_with(RuleCondition::Postcode {
            prefixes: vec!["N1".to_string()],
        });
        assert!(!matches(&rule, &input(), &catalog()));
    }

    #[test]
    fn item_type_matches_on_any_line() {
        let rule = rule_with(RuleCondition::ItemType {
            item_type_ids: vec!["mattress".to_string(), "fridge".to_string()],
        });
        assert!(matches(&rule, &input(), &catalog()));
    }

    #[test]
    fn volume_window_uses_catalog_aggregate() {
        // 2 fridges at 0.8 m3 each = 1.6 m3.
        let rule = rule_with(RuleCondition::Volume {
            min: Decimal::new(1, 0),
            max: Decimal::new(2, 0),
        });
        assert!(matches(&rule, &input(), &catalog()));

        let rule = rule_with(RuleCondition::Volume {
            min: Decimal::new(2, 0),
            max: Decimal::new(5, 0),
        });
        assert!(!matches(&rule, &input(), &catalog()));
    }

    #[test]
    fn access_difficulty_minimum_mode_accepts_harder_jobs() {
        let rule = rule_with(RuleCondition::AccessDifficulty {
            level: AccessDifficulty::Difficult,
            mode: MatchMode::Minimum,
        });
        let mut harder = input();
        harder.access_difficulty = AccessDifficulty::VeryDifficult;
        assert!(matches(&rule, &harder, &catalog()));

        let rule = rule_with(RuleCondition::AccessDifficulty {
            level: AccessDifficulty::Difficult,
            mode: MatchMode::Exact,
        });
        assert!(!matches(&rule, &harder, &catalog()));
    }

    #[test]
    fn time_of_day_window_wraps_midnight() {
        let rule = rule_with(RuleCondition::TimeOfDay {
            start_hour: 22,
            end_hour: 6,
        });
        assert!(matches(&rule, &input(), &catalog()));

        let mut daytime = input();
        daytime.collection_date = NaiveDate::from_ymd_opt(2025, 11, 1)
            .expect("valid date")
            .and_hms_opt(14, 0, 0);
        assert!(!matches(&rule, &daytime, &catalog()));
    }

    #[test]
    fn date_conditions_never_match_without_a_collection_date() {
        let rule = rule_with(RuleCondition::DayOfWeek {
            days: vec![Weekday::Sat, Weekday::Sun],
        });
        // 2025-11-01 is a Saturday.
        assert!(matches(&rule, &input(), &catalog()));

        let mut undated = input();
        undated.collection_date = None;
        assert!(!matches(&rule, &undated, &catalog()));
    }

    #[test]
    fn unsupported_condition_never_matches() {
        let rule = rule_with(RuleCondition::Unsupported {
            kind: "tide_level".to_string(),
        });
        assert!(!matches(&rule, &input(), &catalog()));
    }
}
