use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::abtest::{
    AbAllocator, AbTest, AbTestRegistry, Arm, AssignmentStore, AssignmentStoreError,
    SignificanceReport, TestConfigError,
};
use super::catalog::ItemCatalog;
use super::composer::{compose, ComposerSettings};
use super::confidence::{self, ConfidenceScore, ConfidenceSource, ConfidenceWeights};
use super::conflict::{self, RuleConflict, DEFAULT_RATE_CEILING};
use super::domain::{AppliedRuleRecord, PriceBreakdown, PricingRule, QuoteInput};
use super::store::{RuleSnapshot, RuleStore, RuleStoreError};
use super::validate::{validate_rule, RuleConfigError};

/// Engine-wide settings for the quote service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub composer: ComposerSettings,
    /// Combined-percentage ceiling for the conflict detector.
    pub conflict_rate_ceiling: Decimal,
    pub confidence_weights: ConfidenceWeights,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            composer: ComposerSettings::default(),
            conflict_rate_ceiling: DEFAULT_RATE_CEILING,
            confidence_weights: ConfidenceWeights::default(),
        }
    }
}

/// Per-request calculation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteOptions {
    #[serde(default)]
    pub use_ai: bool,
    #[serde(default)]
    pub ab_test_id: Option<String>,
    #[serde(default)]
    pub customer_key: Option<String>,
}

/// Which A/B arm priced this quote, when a test was active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmAssignmentView {
    pub test_id: String,
    pub arm: Arm,
}

/// Result of a successful calculation: the breakdown, any surfaced
/// conflicts, and the confidence verdict in AI-assisted mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteOutcome {
    pub breakdown: PriceBreakdown,
    pub conflicts: Vec<RuleConflict>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<ConfidenceScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ab_assignment: Option<ArmAssignmentView>,
}

/// Input defects rejected before any rule evaluation runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("postcode must not be blank")]
    MissingPostcode,
    #[error("item list must not be empty")]
    EmptyItems,
    #[error("item '{item_type_id}' has zero quantity")]
    ZeroQuantity { item_type_id: String },
    #[error("A/B-tested calculations require a customer key")]
    MissingCustomerKey,
}

/// Error raised by the quote service. A failed calculation returns no
/// breakdown at all, never a partially computed one.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    RuleStore(#[from] RuleStoreError),
    #[error(transparent)]
    Assignments(#[from] AssignmentStoreError),
    #[error("unknown A/B test '{0}'")]
    UnknownTest(String),
    #[error(transparent)]
    TestConfig(#[from] TestConfigError),
}

/// Service composing the rule store, condition evaluator, calculation
/// strategies, composer, conflict detector, confidence scorer, and A/B
/// allocator behind one facade.
pub struct QuoteService<R, S, T> {
    rules: Arc<R>,
    allocator: AbAllocator<S>,
    registry: Arc<T>,
    catalog: Arc<dyn ItemCatalog>,
    confidence: Arc<dyn ConfidenceSource>,
    settings: EngineSettings,
}

impl<R, S, T> QuoteService<R, S, T>
where
    R: RuleStore + 'static,
    S: AssignmentStore + 'static,
    T: AbTestRegistry + 'static,
{
    pub fn new(
        rules: Arc<R>,
        assignments: Arc<S>,
        registry: Arc<T>,
        catalog: Arc<dyn ItemCatalog>,
        confidence: Arc<dyn ConfidenceSource>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            rules,
            allocator: AbAllocator::new(assignments),
            registry,
            catalog,
            confidence,
            settings,
        }
    }

    /// Price one job. Pure and stateless apart from the snapshot fetch and
    /// the sticky A/B assignment write on first encounter of a customer.
    pub fn calculate(
        &self,
        input: &QuoteInput,
        options: &QuoteOptions,
    ) -> Result<QuoteOutcome, QuoteError> {
        validate_input(input, options)?;

        let snapshot = RuleSnapshot::load(self.rules.as_ref())?;

        let (snapshot, ab_assignment) = match &options.ab_test_id {
            Some(test_id) => {
                let test = self.resolve_test(test_id)?;
                // validate_input guarantees the key is present here.
                let customer_key = options
                    .customer_key
                    .as_deref()
                    .ok_or(InputError::MissingCustomerKey)?;
                let arm = self.allocator.assign(&test, customer_key)?;
                (
                    snapshot.for_variant(&test, arm),
                    Some(ArmAssignmentView {
                        test_id: test.id.clone(),
                        arm,
                    }),
                )
            }
            None => (snapshot, None),
        };

        let (breakdown, mut conflicts) =
            compose(&snapshot, input, self.catalog.as_ref(), &self.settings.composer);
        conflicts.extend(conflict::detect(
            &breakdown.applied_rules,
            self.settings.conflict_rate_ceiling,
        ));

        let confidence = options.use_ai.then(|| {
            confidence::score(
                self.confidence.sub_scores(input),
                &self.settings.confidence_weights,
            )
        });

        info!(
            postcode = %input.postcode,
            rules_applied = breakdown.applied_rules.len(),
            conflicts = conflicts.len(),
            total = %breakdown.total_amount,
            "quote calculated"
        );

        Ok(QuoteOutcome {
            breakdown,
            conflicts,
            confidence,
            ab_assignment,
        })
    }

    /// Load-time rule check, exposed for the admin workflow to call before
    /// persisting a rule.
    pub fn validate_rule(&self, rule: &PricingRule) -> Vec<RuleConfigError> {
        validate_rule(rule)
    }

    /// Re-run conflict detection over a finished breakdown's audit trail.
    pub fn detect_conflicts(&self, applied: &[AppliedRuleRecord]) -> Vec<RuleConflict> {
        conflict::detect(applied, self.settings.conflict_rate_ceiling)
    }

    /// Sticky arm assignment outside of a calculation.
    pub fn assign_variant(&self, test_id: &str, customer_key: &str) -> Result<Arm, QuoteError> {
        let test = self.resolve_test(test_id)?;
        Ok(self.allocator.assign(&test, customer_key)?)
    }

    pub fn record_conversion(&self, test_id: &str, customer_key: &str) -> Result<(), QuoteError> {
        self.resolve_test(test_id)?;
        Ok(self.allocator.record_conversion(test_id, customer_key)?)
    }

    pub fn significance(&self, test_id: &str) -> Result<SignificanceReport, QuoteError> {
        self.resolve_test(test_id)?;
        Ok(self.allocator.significance(test_id)?)
    }

    /// Look a test up and reject degenerate configuration before any
    /// assignment can be derived from it.
    fn resolve_test(&self, test_id: &str) -> Result<AbTest, QuoteError> {
        let test = self
            .registry
            .test(test_id)?
            .ok_or_else(|| QuoteError::UnknownTest(test_id.to_string()))?;
        test.validate()?;
        Ok(test)
    }
}

fn validate_input(input: &QuoteInput, options: &QuoteOptions) -> Result<(), InputError> {
    if input.postcode.trim().is_empty() {
        return Err(InputError::MissingPostcode);
    }
    if input.items.is_empty() {
        return Err(InputError::EmptyItems);
    }
    if let Some(item) = input.items.iter().find(|item| item.quantity == 0) {
        return Err(InputError::ZeroQuantity {
            item_type_id: item.item_type_id.clone(),
        });
    }
    if options.ab_test_id.is_some()
        && options
            .customer_key
            .as_ref()
            .map_or(true, |key| key.trim().is_empty())
    {
        return Err(InputError::MissingCustomerKey);
    }
    Ok(())
}
