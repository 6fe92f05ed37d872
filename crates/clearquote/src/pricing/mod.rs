//! Pricing and quoting rule engine.
//!
//! Turns a set of booking attributes (postcode, item list, access
//! difficulty, scheduling) into a priced, auditable quote, optionally under
//! double-blind A/B allocation and with a confidence/human-review gate.
//! Calculations are pure transforms over an immutable rule snapshot; the
//! only blocking operation is the snapshot fetch and the only shared
//! mutable state is the sticky A/B assignment store.

pub mod abtest;
pub mod catalog;
pub mod composer;
pub mod conditions;
pub mod confidence;
pub mod conflict;
pub mod domain;
pub mod money;
pub mod router;
pub mod service;
pub mod store;
pub mod strategy;
pub mod validate;

pub use abtest::{
    AbAllocator, AbTest, AbTestRegistry, Arm, ArmTotals, Assignment, AssignmentStore,
    AssignmentStoreError, RecommendedAction, SignificanceReport, StrategyVariant,
    TestConfigError,
};
pub use catalog::{ItemCatalog, ItemProfile};
pub use composer::ComposerSettings;
pub use confidence::{
    ConfidenceBand, ConfidenceScore, ConfidenceSource, ConfidenceSubScores, ConfidenceWeights,
};
pub use conflict::{ConflictKind, RuleConflict};
pub use domain::{
    AccessDifficulty, AppliedRuleRecord, CalculationMethod, CostCenter, MatchMode,
    PriceBreakdown, PricingRule, QuoteInput, QuoteItem, RuleCondition, RuleId, RuleType, Tier,
    TierMetric,
};
pub use router::pricing_router;
pub use service::{
    ArmAssignmentView, EngineSettings, InputError, QuoteError, QuoteOptions, QuoteOutcome,
    QuoteService,
};
pub use store::{RuleSnapshot, RuleStore, RuleStoreError};
pub use validate::{validate_rule, RuleConfigError};
