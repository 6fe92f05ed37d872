use tracing::warn;

use super::abtest::{AbTest, Arm};
use super::domain::{PricingRule, RuleId};
use super::validate::validate_rule;

/// Storage abstraction over the rule repository so the engine can be
/// exercised against an in-memory fake.
pub trait RuleStore: Send + Sync {
    /// Every rule the repository currently holds, active or not, in
    /// insertion order.
    fn fetch_all(&self) -> Result<Vec<PricingRule>, RuleStoreError>;
}

/// Failure to reach the backing rule source. Fatal for the calculation;
/// there is no partial-rule-set fallback.
#[derive(Debug, thiserror::Error)]
pub enum RuleStoreError {
    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

/// Immutable, validated, priority-ordered view of the active rules used for
/// one calculation. Snapshots are cheap to clone and safe to share across
/// concurrent calculations.
#[derive(Debug, Clone)]
pub struct RuleSnapshot {
    rules: Vec<PricingRule>,
}

impl RuleSnapshot {
    /// Pull a fresh snapshot: inactive rules are excluded, malformed rules
    /// are rejected here (not at calculation time) with a warning, and the
    /// remainder is stable-sorted ascending by priority so insertion order
    /// breaks ties.
    pub fn load(store: &dyn RuleStore) -> Result<Self, RuleStoreError> {
        let mut rules: Vec<PricingRule> = store
            .fetch_all()?
            .into_iter()
            .filter(|rule| rule.is_active)
            .filter(|rule| {
                let errors = validate_rule(rule);
                if errors.is_empty() {
                    true
                } else {
                    warn!(
                        rule_id = %rule.id.0,
                        rule_name = %rule.name,
                        defects = errors.len(),
                        "rejecting malformed pricing rule at snapshot load"
                    );
                    false
                }
            })
            .collect();

        rules.sort_by_key(|rule| rule.priority);
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[PricingRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Restrict the snapshot to one arm of an A/B test. Rules claimed
    /// exclusively by the opposite strategy are removed; rules named by both
    /// or by neither apply to every arm.
    pub fn for_variant(&self, test: &AbTest, arm: Arm) -> Self {
        let excluded: &[RuleId] = match arm {
            Arm::A => &test.strategy_b.rule_ids,
            Arm::B => &test.strategy_a.rule_ids,
        };
        let kept: &[RuleId] = match arm {
            Arm::A => &test.strategy_a.rule_ids,
            Arm::B => &test.strategy_b.rule_ids,
        };

        let rules = self
            .rules
            .iter()
            .filter(|rule| !excluded.contains(&rule.id) || kept.contains(&rule.id))
            .cloned()
            .collect();

        Self { rules }
    }
}
