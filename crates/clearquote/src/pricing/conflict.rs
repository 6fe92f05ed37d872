use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{AppliedRuleRecord, CostCenter, RuleId};

/// Default ceiling on the combined percentage rate two or more rules may
/// stack onto the same cost center.
pub const DEFAULT_RATE_CEILING: Decimal = Decimal::ONE_HUNDRED;

/// A detected overlap between rules that could double-apply incompatible
/// effects. Conflicts never block a calculation; they travel alongside the
/// breakdown for ops to resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConflict {
    pub kind: ConflictKind,
    pub cost_center: CostCenter,
    pub rule_ids: Vec<RuleId>,
    /// Left for human/ops input; the engine only ever sets "pending".
    pub resolution_strategy: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Combined percentage rate from same-type rules on one cost center
    /// exceeds the configured ceiling.
    PercentageStacking { combined_rate: Decimal },
    /// A computed amount was skipped because it would have pushed the total
    /// negative or past the sanity ceiling.
    AmountOutOfBounds { attempted: Decimal },
}

impl ConflictKind {
    /// One-line description for logs and operator-facing output.
    pub fn summary(&self) -> String {
        match self {
            ConflictKind::PercentageStacking { combined_rate } => {
                format!("stacked percentage rules combine to {combined_rate}%")
            }
            ConflictKind::AmountOutOfBounds { attempted } => {
                format!("rule amount {attempted} fell outside the allowed range and was skipped")
            }
        }
    }
}

impl RuleConflict {
    pub fn pending(kind: ConflictKind, cost_center: CostCenter, rule_ids: Vec<RuleId>) -> Self {
        Self {
            kind,
            cost_center,
            rule_ids,
            resolution_strategy: "pending".to_string(),
        }
    }
}

/// Scan the applied-rule audit trail for percentage rules of the same type
/// stacked on the same cost center past the ceiling. One conflict is raised
/// per offending `(cost_center, rule_type)` group.
pub fn detect(applied: &[AppliedRuleRecord], rate_ceiling: Decimal) -> Vec<RuleConflict> {
    let mut groups: BTreeMap<(&'static str, &'static str), (CostCenter, Vec<&AppliedRuleRecord>)> =
        BTreeMap::new();

    for record in applied {
        if record.percentage_rate.is_some() {
            groups
                .entry((record.cost_center.label(), record.rule_type.label()))
                .or_insert_with(|| (record.cost_center, Vec::new()))
                .1
                .push(record);
        }
    }

    let mut conflicts = Vec::new();
    for (center, records) in groups.into_values() {
        if records.len() < 2 {
            continue;
        }
        let combined: Decimal = records
            .iter()
            .filter_map(|record| record.percentage_rate)
            .sum();
        if combined > rate_ceiling {
            conflicts.push(RuleConflict::pending(
                ConflictKind::PercentageStacking {
                    combined_rate: combined,
                },
                center,
                records.iter().map(|record| record.rule_id.clone()).collect(),
            ));
        }
    }

    conflicts
}
