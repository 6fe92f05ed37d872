use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::catalog::ItemCatalog;
use super::conditions::matches;
use super::conflict::{ConflictKind, RuleConflict};
use super::domain::{
    AccessDifficulty, AppliedRuleRecord, CalculationMethod, PriceBreakdown, PricingRule,
    QuoteInput, RuleType,
};
use super::money::{round_money, AMOUNT_CEILING};
use super::store::RuleSnapshot;
use super::strategy::{amount, CostCenters};

/// Engine-wide knobs for one composition run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposerSettings {
    /// Fractional tax rate applied to the pre-tax subtotal, e.g. 0.20.
    pub tax_rate: Decimal,
    /// Amounts or subtotals past this ceiling skip the rule as an overflow.
    pub amount_ceiling: Decimal,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(20, 2),
            amount_ceiling: AMOUNT_CEILING,
        }
    }
}

/// Apply the ordered snapshot to a quote input.
///
/// Rules run in four fixed passes (base_rate, modifier, surcharge, discount)
/// and in ascending priority within each pass, so base pricing is never
/// affected by later surcharges or discounts and percentage modifiers
/// compound predictably. Overflowing rules are skipped and recorded as
/// conflicts rather than silently dropped.
pub fn compose(
    snapshot: &RuleSnapshot,
    input: &QuoteInput,
    catalog: &dyn ItemCatalog,
    settings: &ComposerSettings,
) -> (PriceBreakdown, Vec<RuleConflict>) {
    let mut centers = CostCenters::default();
    let mut surcharges_total = Decimal::ZERO;
    let mut discounts_total = Decimal::ZERO;
    let mut applied: Vec<AppliedRuleRecord> = Vec::new();
    let mut conflicts: Vec<RuleConflict> = Vec::new();
    let mut tax_override: Option<Decimal> = None;

    for pass in RuleType::PASS_ORDER {
        // The snapshot is already priority-sorted, so filtering by type
        // preserves ascending priority inside the pass.
        for rule in snapshot.rules().iter().filter(|rule| rule.rule_type == pass) {
            if !matches(rule, input, catalog) {
                continue;
            }

            let computed = amount(rule, input, &centers, catalog);

            if overflows(computed, &centers, surcharges_total, discounts_total, settings) {
                warn!(
                    rule_id = %rule.id.0,
                    attempted = %computed,
                    "skipping rule: amount breaches the sanity ceiling"
                );
                conflicts.push(RuleConflict::pending(
                    ConflictKind::AmountOutOfBounds {
                        attempted: computed,
                    },
                    rule.applies_to,
                    vec![rule.id.clone()],
                ));
                continue;
            }

            let recorded = match pass {
                RuleType::BaseRate | RuleType::Modifier => {
                    centers.accrue(rule.applies_to, computed);
                    computed
                }
                RuleType::Surcharge => {
                    surcharges_total += computed;
                    computed
                }
                RuleType::Discount => {
                    // A quote's pre-tax subtotal can never go negative.
                    let headroom = centers.sum() + surcharges_total - discounts_total;
                    let granted = computed.min(headroom);
                    discounts_total += granted;
                    -granted
                }
            };

            if let Some(rate) = rule.tax_rate_override {
                tax_override = Some(rate);
            }

            debug!(rule_id = %rule.id.0, pass = pass.label(), amount = %recorded, "rule applied");

            applied.push(AppliedRuleRecord {
                rule_id: rule.id.clone(),
                rule_name: rule.name.clone(),
                rule_type: rule.rule_type,
                cost_center: rule.applies_to,
                amount_applied: recorded,
                percentage_rate: percentage_rate(rule),
            });
        }
    }

    let subtotal = centers.sum() + surcharges_total - discounts_total;
    let tax_rate = tax_override.unwrap_or(settings.tax_rate);
    let tax_amount = round_money(subtotal * tax_rate);
    let total_amount = round_money(subtotal + tax_amount);

    let breakdown = PriceBreakdown {
        base_cost: round_money(centers.base),
        labor_cost: round_money(centers.labor),
        disposal_cost: round_money(centers.disposal),
        transport_cost: round_money(centers.transport),
        surcharges_total: round_money(surcharges_total),
        discounts_total: round_money(discounts_total),
        tax_amount,
        total_amount,
        estimated_duration_hours: estimate_duration(input),
        applied_rules: applied,
    };

    (breakdown, conflicts)
}

fn overflows(
    computed: Decimal,
    centers: &CostCenters,
    surcharges_total: Decimal,
    discounts_total: Decimal,
    settings: &ComposerSettings,
) -> bool {
    if computed > settings.amount_ceiling {
        return true;
    }
    let prospective = centers.sum() + surcharges_total - discounts_total + computed;
    prospective > settings.amount_ceiling
}

fn percentage_rate(rule: &PricingRule) -> Option<Decimal> {
    match &rule.calculation {
        CalculationMethod::Percentage { rate } => Some(*rate),
        _ => None,
    }
}

/// Crew-time estimate shown to dispatchers next to the price: half an hour
/// of setup plus a quarter hour per item unit, scaled by access difficulty.
fn estimate_duration(input: &QuoteInput) -> Decimal {
    let per_item = Decimal::new(25, 2) * Decimal::from(input.total_quantity());
    let base = Decimal::new(5, 1) + per_item;
    let factor = match input.access_difficulty {
        AccessDifficulty::Easy => Decimal::new(9, 1),
        AccessDifficulty::Normal => Decimal::new(10, 1),
        AccessDifficulty::Difficult => Decimal::new(125, 2),
        AccessDifficulty::VeryDifficult => Decimal::new(15, 1),
    };
    (base * factor).round_dp(2)
}
