use chrono::{NaiveDateTime, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for pricing rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// Rule families applied by the composer, in this fixed pass order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    BaseRate,
    Modifier,
    Surcharge,
    Discount,
}

impl RuleType {
    pub const PASS_ORDER: [RuleType; 4] = [
        RuleType::BaseRate,
        RuleType::Modifier,
        RuleType::Surcharge,
        RuleType::Discount,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            RuleType::BaseRate => "base_rate",
            RuleType::Modifier => "modifier",
            RuleType::Surcharge => "surcharge",
            RuleType::Discount => "discount",
        }
    }
}

/// Bucket a rule's amount accrues to. `Total` maps onto the base cost line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostCenter {
    Total,
    Labor,
    Disposal,
    Transport,
}

impl CostCenter {
    pub const fn label(self) -> &'static str {
        match self {
            CostCenter::Total => "total",
            CostCenter::Labor => "labor",
            CostCenter::Disposal => "disposal",
            CostCenter::Transport => "transport",
        }
    }
}

/// Access conditions at the collection address, ordered easiest first so
/// "at least as difficult as" comparisons can use the derived ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDifficulty {
    Easy,
    Normal,
    Difficult,
    VeryDifficult,
}

/// How an access-difficulty condition compares against the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    Exact,
    Minimum,
}

/// Condition payloads, one variant per condition kind so the evaluator can
/// be exhaustive and new kinds are a compile-time-visible change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "condition_type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Postcode-area prefixes, matched case-insensitively after whitespace
    /// normalization.
    Postcode { prefixes: Vec<String> },
    /// Matches when any quoted item's type id is in the set.
    ItemType { item_type_ids: Vec<String> },
    /// Aggregate volume (m3) across all items within `[min, max]`.
    Volume { min: Decimal, max: Decimal },
    /// Aggregate weight (kg) across all items within `[min, max]`.
    Weight { min: Decimal, max: Decimal },
    AccessDifficulty {
        level: AccessDifficulty,
        mode: MatchMode,
    },
    /// Half-open hour window `[start_hour, end_hour)`; wraps midnight when
    /// `start_hour > end_hour`.
    TimeOfDay { start_hour: u8, end_hour: u8 },
    DayOfWeek { days: Vec<Weekday> },
    SpecialHandling { required: bool },
    /// Condition kinds this engine does not recognize. Never matches; logged
    /// as a configuration warning rather than failing the calculation.
    Unsupported { kind: String },
}

impl RuleCondition {
    pub fn kind_label(&self) -> &str {
        match self {
            RuleCondition::Postcode { .. } => "postcode",
            RuleCondition::ItemType { .. } => "item_type",
            RuleCondition::Volume { .. } => "volume",
            RuleCondition::Weight { .. } => "weight",
            RuleCondition::AccessDifficulty { .. } => "access_difficulty",
            RuleCondition::TimeOfDay { .. } => "time_of_day",
            RuleCondition::DayOfWeek { .. } => "day_of_week",
            RuleCondition::SpecialHandling { .. } => "special_handling",
            RuleCondition::Unsupported { kind } => kind.as_str(),
        }
    }
}

/// Metric a tier table brackets over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierMetric {
    Quantity,
    Volume,
    Weight,
}

/// One `[from, to)` bracket of a tiered price table. `to = None` leaves the
/// final bracket open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub from: Decimal,
    pub to: Option<Decimal>,
    pub amount: Decimal,
}

/// How a matching rule's amount is computed. The payload travels with the
/// tag so a method can never be paired with the wrong parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum CalculationMethod {
    Fixed { base_amount: Decimal },
    /// Percent of the targeted cost center's value as accumulated at the
    /// time this rule is applied.
    Percentage { rate: Decimal },
    PerUnit { unit_amount: Decimal },
    Tiered { metric: TierMetric, tiers: Vec<Tier> },
}

impl CalculationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            CalculationMethod::Fixed { .. } => "fixed",
            CalculationMethod::Percentage { .. } => "percentage",
            CalculationMethod::PerUnit { .. } => "per_unit",
            CalculationMethod::Tiered { .. } => "tiered",
        }
    }
}

/// A pricing rule as loaded from the rule repository. Immutable once a
/// snapshot has been taken for a calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: RuleId,
    pub name: String,
    pub rule_type: RuleType,
    pub condition: RuleCondition,
    pub calculation: CalculationMethod,
    #[serde(default)]
    pub min_amount: Option<Decimal>,
    #[serde(default)]
    pub max_amount: Option<Decimal>,
    /// Lower priorities run first within a pass.
    pub priority: i32,
    pub applies_to: CostCenter,
    /// Replaces the engine-wide tax rate when present.
    #[serde(default)]
    pub tax_rate_override: Option<Decimal>,
    pub is_active: bool,
}

/// One line of the job to be cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteItem {
    pub item_type_id: String,
    pub quantity: u32,
}

/// Parameters for a single price calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteInput {
    pub postcode: String,
    pub items: Vec<QuoteItem>,
    pub access_difficulty: AccessDifficulty,
    #[serde(default)]
    pub collection_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub special_handling: bool,
}

impl QuoteInput {
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Audit entry appended for every rule the composer applied. Signed:
/// discounts record negative amounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedRuleRecord {
    pub rule_id: RuleId,
    pub rule_name: String,
    pub rule_type: RuleType,
    pub cost_center: CostCenter,
    pub amount_applied: Decimal,
    /// Carried for percentage rules so conflicts can be detected from a
    /// finished breakdown alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_rate: Option<Decimal>,
}

/// Fully priced, auditable quote. Every monetary field is rounded to two
/// decimal places, half-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub base_cost: Decimal,
    pub labor_cost: Decimal,
    pub disposal_cost: Decimal,
    pub transport_cost: Decimal,
    pub surcharges_total: Decimal,
    pub discounts_total: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    /// Rough labour estimate surfaced to dispatchers alongside the price.
    pub estimated_duration_hours: Decimal,
    pub applied_rules: Vec<AppliedRuleRecord>,
}

impl PriceBreakdown {
    /// Pre-tax subtotal across all cost centers.
    pub fn subtotal(&self) -> Decimal {
        self.base_cost + self.labor_cost + self.disposal_cost + self.transport_cost
            + self.surcharges_total
            - self.discounts_total
    }
}
