use rust_decimal::Decimal;
use tracing::warn;

use super::catalog::{total_volume, total_weight, ItemCatalog};
use super::domain::{CalculationMethod, CostCenter, PricingRule, QuoteInput, TierMetric};
use super::money::{clamp_bounds, round_money};

/// Running totals for the four cost centers during composition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostCenters {
    pub base: Decimal,
    pub labor: Decimal,
    pub disposal: Decimal,
    pub transport: Decimal,
}

impl CostCenters {
    /// Current value a percentage rule reads. `Total` sees the sum of all
    /// four centers; the others see their own accumulation only.
    pub fn current_value(&self, center: CostCenter) -> Decimal {
        match center {
            CostCenter::Total => self.base + self.labor + self.disposal + self.transport,
            CostCenter::Labor => self.labor,
            CostCenter::Disposal => self.disposal,
            CostCenter::Transport => self.transport,
        }
    }

    /// Accrue an amount to a center. `Total` lands on the base cost line.
    pub fn accrue(&mut self, center: CostCenter, amount: Decimal) {
        match center {
            CostCenter::Total => self.base += amount,
            CostCenter::Labor => self.labor += amount,
            CostCenter::Disposal => self.disposal += amount,
            CostCenter::Transport => self.transport += amount,
        }
    }

    pub fn sum(&self) -> Decimal {
        self.base + self.labor + self.disposal + self.transport
    }
}

/// Compute the monetary amount for a matching rule: method payload applied,
/// clamped into the rule's `[min, max]` bounds, rounded half-up to 2 dp.
pub fn amount(
    rule: &PricingRule,
    input: &QuoteInput,
    centers: &CostCenters,
    catalog: &dyn ItemCatalog,
) -> Decimal {
    let raw = match &rule.calculation {
        CalculationMethod::Fixed { base_amount } => *base_amount,
        CalculationMethod::Percentage { rate } => {
            centers.current_value(rule.applies_to) * *rate / Decimal::ONE_HUNDRED
        }
        CalculationMethod::PerUnit { unit_amount } => {
            *unit_amount * Decimal::from(input.total_quantity())
        }
        CalculationMethod::Tiered { metric, tiers } => {
            let value = metric_value(*metric, input, catalog);
            let tier = tiers
                .iter()
                .find(|tier| value >= tier.from && tier.to.map_or(true, |to| value < to));
            match tier {
                Some(tier) => tier.amount,
                None => {
                    warn!(
                        rule_id = %rule.id.0,
                        metric_value = %value,
                        "no tier bracket covers the metric value; rule contributes nothing"
                    );
                    Decimal::ZERO
                }
            }
        }
    };

    round_money(clamp_bounds(raw, rule.min_amount, rule.max_amount))
}

fn metric_value(metric: TierMetric, input: &QuoteInput, catalog: &dyn ItemCatalog) -> Decimal {
    match metric {
        TierMetric::Quantity => Decimal::from(input.total_quantity()),
        TierMetric::Volume => total_volume(catalog, input),
        TierMetric::Weight => total_weight(catalog, input),
    }
}
