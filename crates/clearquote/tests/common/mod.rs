#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use clearquote::pricing::domain::AccessDifficulty;
use clearquote::pricing::{
    AbTest, AbTestRegistry, Arm, ArmTotals, Assignment, AssignmentStore, AssignmentStoreError,
    CalculationMethod, ConfidenceSource, ConfidenceSubScores, CostCenter, EngineSettings,
    ItemCatalog, ItemProfile, PricingRule, QuoteInput, QuoteItem, QuoteService, RuleCondition,
    RuleId, RuleStore, RuleStoreError, RuleType,
};

pub(crate) struct InMemoryRuleStore {
    rules: Vec<PricingRule>,
    pub(crate) unavailable: bool,
}

impl InMemoryRuleStore {
    pub(crate) fn new(rules: Vec<PricingRule>) -> Self {
        Self {
            rules,
            unavailable: false,
        }
    }
}

impl RuleStore for InMemoryRuleStore {
    fn fetch_all(&self) -> Result<Vec<PricingRule>, RuleStoreError> {
        if self.unavailable {
            return Err(RuleStoreError::Unavailable(
                "backing source unreachable".to_string(),
            ));
        }
        Ok(self.rules.clone())
    }
}

#[derive(Default)]
pub(crate) struct StaticCatalog {
    profiles: HashMap<String, ItemProfile>,
}

impl StaticCatalog {
    pub(crate) fn with_sofa_and_fridge() -> Self {
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
        profiles.insert(
            "fridge".to_string(),
            ItemProfile {
                name: "Fridge freezer".to_string(),
                category: "appliance".to_string(),
                volume_m3: Decimal::new(8, 1),
                weight_kg: Decimal::new(60, 0),
            },
        );
        Self { profiles }
    }
}

impl ItemCatalog for StaticCatalog {
    fn profile(&self, item_type_id: &str) -> Option<ItemProfile> {
        self.profiles.get(item_type_id).cloned()
    }
}

pub(crate) struct FixedConfidence(pub(crate) ConfidenceSubScores);

impl ConfidenceSource for FixedConfidence {
    fn sub_scores(&self, _input: &QuoteInput) -> ConfidenceSubScores {
        self.0
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAssignments {
    records: Mutex<HashMap<(String, String), Assignment>>,
}

impl AssignmentStore for InMemoryAssignments {
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

#[derive(Default)]
pub(crate) struct StaticRegistry {
    tests: HashMap<String, AbTest>,
}

impl StaticRegistry {
    pub(crate) fn with(test: AbTest) -> Self {
        let mut tests = HashMap::new();
        tests.insert(test.id.clone(), test);
        Self { tests }
    }
}

impl AbTestRegistry for StaticRegistry {
    fn test(&self, test_id: &str) -> Result<Option<AbTest>, AssignmentStoreError> {
        Ok(self.tests.get(test_id).cloned())
    }
}

pub(crate) type Service = QuoteService<InMemoryRuleStore, InMemoryAssignments, StaticRegistry>;

pub(crate) fn service(rules: Vec<PricingRule>) -> Arc<Service> {
    service_with_registry(rules, StaticRegistry::default())
}

pub(crate) fn service_with_registry(
    rules: Vec<PricingRule>,
    registry: StaticRegistry,
) -> Arc<Service> {
    Arc::new(QuoteService::new(
        Arc::new(InMemoryRuleStore::new(rules)),
        Arc::new(InMemoryAssignments::default()),
        Arc::new(registry),
        Arc::new(StaticCatalog::with_sofa_and_fridge()),
        Arc::new(FixedConfidence(ConfidenceSubScores::default())),
        EngineSettings::default(),
    ))
}

pub(crate) fn fixed_rule(
    id: &str,
    rule_type: RuleType,
    priority: i32,
    amount: Decimal,
    applies_to: CostCenter,
    condition: RuleCondition,
) -> PricingRule {
    PricingRule {
        id: RuleId(id.to_string()),
        name: format!("rule {id}"),
        rule_type,
        condition,
        calculation: CalculationMethod::Fixed {
            base_amount: amount,
        },
        min_amount: None,
        max_amount: None,
        priority,
        applies_to,
        tax_rate_override: None,
        is_active: true,
    }
}

pub(crate) fn percentage_rule(
    id: &str,
    rule_type: RuleType,
    priority: i32,
    rate: Decimal,
    applies_to: CostCenter,
) -> PricingRule {
    PricingRule {
        id: RuleId(id.to_string()),
        name: format!("rule {id}"),
        rule_type,
        condition: RuleCondition::SpecialHandling { required: false },
        calculation: CalculationMethod::Percentage { rate },
        min_amount: None,
        max_amount: None,
        priority,
        applies_to,
        tax_rate_override: None,
        is_active: true,
    }
}

pub(crate) fn always() -> RuleCondition {
    RuleCondition::SpecialHandling { required: false }
}

pub(crate) fn input() -> QuoteInput {
    QuoteInput {
        postcode: "SW1A 1AA".to_string(),
        items: vec![QuoteItem {
            item_type_id: "sofa".to_string(),
            quantity: 1,
        }],
        access_difficulty: AccessDifficulty::Difficult,
        collection_date: None,
        special_handling: false,
    }
}
