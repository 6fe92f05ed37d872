use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{CalculationMethod, PricingRule, RuleCondition};

/// Configuration defects found in a single rule. Malformed rules are
/// rejected when the snapshot is loaded, never coerced at calculation time.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum RuleConfigError {
    #[error("min_amount {min} exceeds max_amount {max}")]
    MinExceedsMax { min: Decimal, max: Decimal },
    #[error("percentage rate {rate} outside (0, 100]")]
    PercentageRateOutOfRange { rate: Decimal },
    #[error("fixed or per-unit amount {amount} is negative")]
    NegativeAmount { amount: Decimal },
    #[error("tier table is empty")]
    EmptyTierTable,
    #[error("tier {index} starts at {found} but previous tier ends at {expected}")]
    NonContiguousTiers {
        index: usize,
        expected: Decimal,
        found: Decimal,
    },
    #[error("tier {index} range [{from}, {to}) is empty or inverted")]
    InvalidTierRange {
        index: usize,
        from: Decimal,
        to: Decimal,
    },
    #[error("only the final tier may be open-ended (tier {index})")]
    OpenTierBeforeEnd { index: usize },
    #[error("tax rate override {rate} outside [0, 1]")]
    TaxOverrideOutOfRange { rate: Decimal },
    #[error("time-of-day hours ({start_hour}, {end_hour}) outside 0-23")]
    HourOutOfRange { start_hour: u8, end_hour: u8 },
    #[error("condition payload for '{kind}' has no matchable values")]
    EmptyCondition { kind: String },
    #[error("condition kind '{kind}' is not recognized")]
    UnknownConditionKind { kind: String },
}

/// Load-time check for one rule. Returns every defect found so an operator
/// can fix the record in a single pass.
pub fn validate_rule(rule: &PricingRule) -> Vec<RuleConfigError> {
    let mut errors = Vec::new();

    if let (Some(min), Some(max)) = (rule.min_amount, rule.max_amount) {
        if min > max {
            errors.push(RuleConfigError::MinExceedsMax { min, max });
        }
    }

    match &rule.calculation {
        CalculationMethod::Fixed { base_amount } => {
            if base_amount.is_sign_negative() {
                errors.push(RuleConfigError::NegativeAmount {
                    amount: *base_amount,
                });
            }
        }
        CalculationMethod::PerUnit { unit_amount } => {
            if unit_amount.is_sign_negative() {
                errors.push(RuleConfigError::NegativeAmount {
                    amount: *unit_amount,
                });
            }
        }
        CalculationMethod::Percentage { rate } => {
            if *rate <= Decimal::ZERO || *rate > Decimal::ONE_HUNDRED {
                errors.push(RuleConfigError::PercentageRateOutOfRange { rate: *rate });
            }
        }
        CalculationMethod::Tiered { tiers, .. } => {
            validate_tiers(tiers, &mut errors);
        }
    }

    if let Some(rate) = rule.tax_rate_override {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            errors.push(RuleConfigError::TaxOverrideOutOfRange { rate });
        }
    }

    validate_condition(&rule.condition, &mut errors);

    errors
}

fn validate_tiers(tiers: &[super::domain::Tier], errors: &mut Vec<RuleConfigError>) {
    if tiers.is_empty() {
        errors.push(RuleConfigError::EmptyTierTable);
        return;
    }

    let mut expected_from: Option<Decimal> = None;
    for (index, tier) in tiers.iter().enumerate() {
        if let Some(expected) = expected_from {
            if tier.from != expected {
                errors.push(RuleConfigError::NonContiguousTiers {
                    index,
                    expected,
                    found: tier.from,
                });
            }
        }

        match tier.to {
            Some(to) if to <= tier.from => {
                errors.push(RuleConfigError::InvalidTierRange {
                    index,
                    from: tier.from,
                    to,
                });
                expected_from = Some(tier.from);
            }
            Some(to) => {
                expected_from = Some(to);
            }
            None => {
                if index != tiers.len() - 1 {
                    errors.push(RuleConfigError::OpenTierBeforeEnd { index });
                }
                expected_from = Some(tier.from);
            }
        }
    }
}

fn validate_condition(condition: &RuleCondition, errors: &mut Vec<RuleConfigError>) {
    match condition {
        RuleCondition::Postcode { prefixes } => {
            if prefixes.iter().all(|prefix| prefix.trim().is_empty()) {
                errors.push(RuleConfigError::EmptyCondition {
                    kind: "postcode".to_string(),
                });
            }
        }
        RuleCondition::ItemType { item_type_ids } => {
            if item_type_ids.is_empty() {
                errors.push(RuleConfigError::EmptyCondition {
                    kind: "item_type".to_string(),
                });
            }
        }
        RuleCondition::DayOfWeek { days } => {
            if days.is_empty() {
                errors.push(RuleConfigError::EmptyCondition {
                    kind: "day_of_week".to_string(),
                });
            }
        }
        RuleCondition::TimeOfDay {
            start_hour,
            end_hour,
        } => {
            // 25 would silently read as a wrapping window at evaluation time.
            if *start_hour > 23 || *end_hour > 23 {
                errors.push(RuleConfigError::HourOutOfRange {
                    start_hour: *start_hour,
                    end_hour: *end_hour,
                });
            }
        }
        RuleCondition::Unsupported { kind } => {
            errors.push(RuleConfigError::UnknownConditionKind { kind: kind.clone() });
        }
        RuleCondition::Volume { .. }
        | RuleCondition::Weight { .. }
        | RuleCondition::AccessDifficulty { .. }
        | RuleCondition::SpecialHandling { .. } => {}
    }
}
