use chrono::{NaiveDate, NaiveDateTime, Weekday};
use clearquote::pricing::catalog;
use clearquote::pricing::{
    AbTest, AbTestRegistry, AccessDifficulty, Arm, ArmTotals, Assignment, AssignmentStore,
    AssignmentStoreError, CalculationMethod, ConfidenceSource, ConfidenceSubScores, CostCenter,
    ItemCatalog, ItemProfile, MatchMode, PricingRule, QuoteInput, RuleCondition, RuleId,
    RuleStore, RuleStoreError, RuleType, StrategyVariant, Tier, TierMetric,
};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Rule source backed by process memory. Stands in for the admin
/// dashboard's rule table until that integration lands.
#[derive(Default, Clone)]
pub(crate) struct InMemoryRuleStore {
    rules: Arc<Mutex<Vec<PricingRule>>>,
}

impl InMemoryRuleStore {
    pub(crate) fn seeded() -> Self {
        Self {
            rules: Arc::new(Mutex::new(seed_rules())),
        }
    }
}

impl RuleStore for InMemoryRuleStore {
    fn fetch_all(&self) -> Result<Vec<PricingRule>, RuleStoreError> {
        let guard = self.rules.lock().expect("rule store mutex poisoned");
        Ok(guard.clone())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAssignmentStore {
    records: Arc<Mutex<HashMap<(String, String), Assignment>>>,
}

impl AssignmentStore for InMemoryAssignmentStore {
    fn get(
        &self,
        test_id: &str,
        customer_key: &str,
    ) -> Result<Option<Assignment>, AssignmentStoreError> {
        let guard = self.records.lock().expect("assignment mutex poisoned");
        Ok(guard
            .get(&(test_id.to_string(), customer_key.to_string()))
            .cloned())
    }

    fn put_if_absent(&self, assignment: Assignment) -> Result<Assignment, AssignmentStoreError> {
        let mut guard = self.records.lock().expect("assignment mutex poisoned");
        let key = (assignment.test_id.clone(), assignment.customer_key.clone());
        Ok(guard.entry(key).or_insert(assignment).clone())
    }

    fn record_conversion(
        &self,
        test_id: &str,
        customer_key: &str,
    ) -> Result<(), AssignmentStoreError> {
        let mut guard = self.records.lock().expect("assignment mutex poisoned");
        match guard.get_mut(&(test_id.to_string(), customer_key.to_string())) {
            Some(assignment) => {
                assignment.converted = true;
                Ok(())
            }
            None => Err(AssignmentStoreError::AssignmentNotFound {
                test_id: test_id.to_string(),
                customer_key: customer_key.to_string(),
            }),
        }
    }

    fn totals(&self, test_id: &str) -> Result<ArmTotals, AssignmentStoreError> {
        let guard = self.records.lock().expect("assignment mutex poisoned");
        let mut totals = ArmTotals::default();
        for assignment in guard.values().filter(|a| a.test_id == test_id) {
            match assignment.arm {
                Arm::A => {
                    totals.assigned_a += 1;
                    if assignment.converted {
                        totals.converted_a += 1;
                    }
                }
                Arm::B => {
                    totals.assigned_b += 1;
                    if assignment.converted {
                        totals.converted_b += 1;
                    }
                }
            }
        }
        Ok(totals)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryAbTestRegistry {
    tests: Arc<Mutex<HashMap<String, AbTest>>>,
}

impl InMemoryAbTestRegistry {
    pub(crate) fn seeded() -> Self {
        let mut tests = HashMap::new();
        for test in seed_ab_tests() {
            tests.insert(test.id.clone(), test);
        }
        Self {
            tests: Arc::new(Mutex::new(tests)),
        }
    }
}

impl AbTestRegistry for InMemoryAbTestRegistry {
    fn test(&self, test_id: &str) -> Result<Option<AbTest>, AssignmentStoreError> {
        let guard = self.tests.lock().expect("registry mutex poisoned");
        Ok(guard.get(test_id).cloned())
    }
}

/// Fixed item-type reference data for the demo deployment.
pub(crate) struct StaticItemCatalog {
    profiles: HashMap<String, ItemProfile>,
}

impl StaticItemCatalog {
    pub(crate) fn seeded() -> Self {
        let entries = [
            ("sofa", "Two-seater sofa", "furniture", "1.5", "45"),
            ("wardrobe", "Double wardrobe", "furniture", "1.2", "60"),
            ("mattress", "Double mattress", "furniture", "0.6", "25"),
            ("fridge", "Fridge freezer", "appliance", "0.8", "60"),
            ("washing-machine", "Washing machine", "appliance", "0.4", "70"),
            ("garden-waste-bag", "Garden waste bag", "garden", "0.25", "15"),
        ];

        let mut profiles = HashMap::new();
        for (id, name, category, volume, weight) in entries {
            profiles.insert(
                id.to_string(),
                ItemProfile {
                    name: name.to_string(),
                    category: category.to_string(),
                    volume_m3: parse_decimal(volume),
                    weight_kg: parse_decimal(weight),
                },
            );
        }
        Self { profiles }
    }
}

impl ItemCatalog for StaticItemCatalog {
    fn profile(&self, item_type_id: &str) -> Option<ItemProfile> {
        self.profiles.get(item_type_id).cloned()
    }
}

/// Confidence heuristic used until a real estimation model is wired in:
/// catalogue coverage drives item recognition, job size and access
/// conditions degrade the remaining dimensions.
pub(crate) struct HeuristicConfidenceSource {
    catalog: Arc<dyn ItemCatalog>,
}

impl HeuristicConfidenceSource {
    pub(crate) fn new(catalog: Arc<dyn ItemCatalog>) -> Self {
        Self { catalog }
    }
}

impl ConfidenceSource for HeuristicConfidenceSource {
    fn sub_scores(&self, input: &QuoteInput) -> ConfidenceSubScores {
        let item_recognition = catalog::coverage(self.catalog.as_ref(), input);

        // Large jobs are harder to estimate from a listing alone.
        let quantity = f64::from(input.total_quantity());
        let quantity_estimation = (1.0 - quantity / 40.0).clamp(0.3, 0.95);

        let access_assessment = match input.access_difficulty {
            AccessDifficulty::Easy => 0.95,
            AccessDifficulty::Normal => 0.9,
            AccessDifficulty::Difficult => 0.7,
            AccessDifficulty::VeryDifficult => 0.5,
        };

        let pricing_model_fit = if input.special_handling { 0.65 } else { 0.85 };

        ConfidenceSubScores {
            item_recognition: Some(item_recognition),
            quantity_estimation: Some(quantity_estimation),
            access_assessment: Some(access_assessment),
            pricing_model_fit: Some(pricing_model_fit),
        }
    }
}

fn parse_decimal(raw: &str) -> Decimal {
    raw.parse().unwrap_or(Decimal::ZERO)
}

fn rule(
    id: &str,
    name: &str,
    rule_type: RuleType,
    condition: RuleCondition,
    calculation: CalculationMethod,
    priority: i32,
    applies_to: CostCenter,
) -> PricingRule {
    PricingRule {
        id: RuleId(id.to_string()),
        name: name.to_string(),
        rule_type,
        condition,
        calculation,
        min_amount: None,
        max_amount: None,
        priority,
        applies_to,
        tax_rate_override: None,
        is_active: true,
    }
}

/// Demo rule set for a London clearance operation.
pub(crate) fn seed_rules() -> Vec<PricingRule> {
    vec![
        rule(
            "base-collection",
            "Standard collection call-out",
            RuleType::BaseRate,
            RuleCondition::SpecialHandling { required: false },
            CalculationMethod::Fixed {
                base_amount: parse_decimal("60"),
            },
            10,
            CostCenter::Total,
        ),
        rule(
            "disposal-by-volume",
            "Disposal charge by load volume",
            RuleType::BaseRate,
            RuleCondition::SpecialHandling { required: false },
            CalculationMethod::Tiered {
                metric: TierMetric::Volume,
                tiers: vec![
                    Tier {
                        from: Decimal::ZERO,
                        to: Some(parse_decimal("5")),
                        amount: parse_decimal("25"),
                    },
                    Tier {
                        from: parse_decimal("5"),
                        to: Some(parse_decimal("10")),
                        amount: parse_decimal("45"),
                    },
                    Tier {
                        from: parse_decimal("10"),
                        to: None,
                        amount: parse_decimal("80"),
                    },
                ],
            },
            20,
            CostCenter::Disposal,
        ),
        rule(
            "labour-per-item",
            "Loading labour per item",
            RuleType::BaseRate,
            RuleCondition::SpecialHandling { required: false },
            CalculationMethod::PerUnit {
                unit_amount: parse_decimal("9.50"),
            },
            30,
            CostCenter::Labor,
        ),
        rule(
            "central-london",
            "Central London congestion surcharge",
            RuleType::Surcharge,
            RuleCondition::Postcode {
                prefixes: vec![
                    "EC".to_string(),
                    "WC".to_string(),
                    "W1".to_string(),
                    "SW1".to_string(),
                ],
            },
            CalculationMethod::Fixed {
                base_amount: parse_decimal("18"),
            },
            10,
            CostCenter::Transport,
        ),
        rule(
            "difficult-access",
            "Restricted access surcharge",
            RuleType::Surcharge,
            RuleCondition::AccessDifficulty {
                level: AccessDifficulty::Difficult,
                mode: MatchMode::Minimum,
            },
            CalculationMethod::Fixed {
                base_amount: parse_decimal("20"),
            },
            20,
            CostCenter::Labor,
        ),
        rule(
            "weekend-collection",
            "Weekend collection uplift",
            RuleType::Surcharge,
            RuleCondition::DayOfWeek {
                days: vec![Weekday::Sat, Weekday::Sun],
            },
            CalculationMethod::Percentage {
                rate: parse_decimal("10"),
            },
            30,
            CostCenter::Total,
        ),
        rule(
            "bulk-load-discount",
            "Bulk load discount",
            RuleType::Discount,
            RuleCondition::Volume {
                min: parse_decimal("8"),
                max: parse_decimal("100"),
            },
            CalculationMethod::Percentage {
                rate: parse_decimal("5"),
            },
            10,
            CostCenter::Total,
        ),
        rule(
            "bulk-load-discount-deep",
            "Bulk load discount (deeper trial)",
            RuleType::Discount,
            RuleCondition::Volume {
                min: parse_decimal("8"),
                max: parse_decimal("100"),
            },
            CalculationMethod::Percentage {
                rate: parse_decimal("8"),
            },
            10,
            CostCenter::Total,
        ),
    ]
}

/// The two bulk-discount rules above compete under this test; everything
/// else is shared by both arms.
pub(crate) fn seed_ab_tests() -> Vec<AbTest> {
    vec![AbTest {
        id: "exp-bulk-discount".to_string(),
        name: "Deeper bulk discount trial".to_string(),
        strategy_a: StrategyVariant {
            label: "control-5pct".to_string(),
            rule_ids: vec![RuleId("bulk-load-discount".to_string())],
        },
        strategy_b: StrategyVariant {
            label: "challenger-8pct".to_string(),
            rule_ids: vec![RuleId("bulk-load-discount-deep".to_string())],
        },
        allocation_percentage_b: 50,
    }]
}

pub(crate) fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    let trimmed = raw.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M") {
        return Ok(datetime);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(|date| date.and_hms_opt(9, 0, 0).expect("09:00 is a valid time"))
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD[THH:MM] ({err})"))
}

pub(crate) fn parse_access(raw: &str) -> Result<AccessDifficulty, String> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "easy" => Ok(AccessDifficulty::Easy),
        "normal" => Ok(AccessDifficulty::Normal),
        "difficult" => Ok(AccessDifficulty::Difficult),
        "very_difficult" => Ok(AccessDifficulty::VeryDifficult),
        other => Err(format!(
            "unknown access difficulty '{other}' (expected easy, normal, difficult or very-difficult)"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clearquote::pricing::validate_rule;

    #[test]
    fn seeded_rules_pass_validation() {
        for rule in seed_rules() {
            let errors = validate_rule(&rule);
            assert!(errors.is_empty(), "rule {:?} invalid: {errors:?}", rule.id);
        }
    }

    #[test]
    fn seeded_tests_reference_seeded_rules() {
        let rule_ids: Vec<RuleId> = seed_rules().into_iter().map(|rule| rule.id).collect();
        for test in seed_ab_tests() {
            for id in test
                .strategy_a
                .rule_ids
                .iter()
                .chain(test.strategy_b.rule_ids.iter())
            {
                assert!(rule_ids.contains(id), "test names unknown rule {id:?}");
            }
        }
    }

    #[test]
    fn datetime_parsing_accepts_date_only() {
        let parsed = parse_datetime("2026-03-07").expect("date parses");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-03-07 09:00");
        assert!(parse_datetime("07/03/2026").is_err());
    }

    #[test]
    fn access_parsing_accepts_hyphenated_form() {
        assert_eq!(
            parse_access("very-difficult").expect("parses"),
            AccessDifficulty::VeryDifficult
        );
        assert!(parse_access("impossible").is_err());
    }
}
