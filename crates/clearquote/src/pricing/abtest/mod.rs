//! Double-blind A/B allocation over competing pricing rule strategies.
//!
//! Assignment is deterministic (a stable hash of test id and customer key)
//! but sticky: once an assignment is stored it is never recomputed, so
//! changing the allocation split later cannot move existing customers
//! between arms.

mod stats;

pub use stats::{two_proportion_z_test, ZTestResult};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::domain::RuleId;

/// One arm of a running test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Arm {
    A,
    B,
}

impl Arm {
    pub const fn label(self) -> &'static str {
        match self {
            Arm::A => "A",
            Arm::B => "B",
        }
    }
}

/// A rule-set variant competing in a test. Rules listed here are exclusive
/// to this arm; rules named by neither arm are shared by both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyVariant {
    pub label: String,
    pub rule_ids: Vec<RuleId>,
}

/// Definition of a pricing A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTest {
    pub id: String,
    pub name: String,
    pub strategy_a: StrategyVariant,
    pub strategy_b: StrategyVariant,
    /// Share of new customers routed to arm B, in `[1, 99]`.
    pub allocation_percentage_b: u8,
}

impl AbTest {
    /// Configuration check run when a test definition is resolved. A split
    /// of 0 or 100 would pin every customer to one arm, so it is rejected
    /// like any other malformed configuration instead of being coerced.
    pub fn validate(&self) -> Result<(), TestConfigError> {
        if !(1..=99).contains(&self.allocation_percentage_b) {
            return Err(TestConfigError::AllocationOutOfRange {
                test_id: self.id.clone(),
                allocation: self.allocation_percentage_b,
            });
        }
        Ok(())
    }
}

/// Configuration defects in a test definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TestConfigError {
    #[error("test '{test_id}': allocation_percentage_b {allocation} outside [1, 99]")]
    AllocationOutOfRange { test_id: String, allocation: u8 },
}

/// A stored, sticky assignment of one customer to one arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub test_id: String,
    pub customer_key: String,
    pub arm: Arm,
    pub converted: bool,
}

/// Per-arm assignment and conversion tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmTotals {
    pub assigned_a: u64,
    pub converted_a: u64,
    pub assigned_b: u64,
    pub converted_b: u64,
}

/// Lookup of test definitions, maintained by an external admin workflow.
pub trait AbTestRegistry: Send + Sync {
    fn test(&self, test_id: &str) -> Result<Option<AbTest>, AssignmentStoreError>;
}

/// Persistence contract for assignments. `put_if_absent` must serialize
/// first-assignment writes per `(test_id, customer_key)` and return the
/// winner, so two racing first requests cannot land in different arms.
pub trait AssignmentStore: Send + Sync {
    fn get(
        &self,
        test_id: &str,
        customer_key: &str,
    ) -> Result<Option<Assignment>, AssignmentStoreError>;
    fn put_if_absent(&self, assignment: Assignment) -> Result<Assignment, AssignmentStoreError>;
    fn record_conversion(
        &self,
        test_id: &str,
        customer_key: &str,
    ) -> Result<(), AssignmentStoreError>;
    fn totals(&self, test_id: &str) -> Result<ArmTotals, AssignmentStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AssignmentStoreError {
    #[error("no assignment recorded for customer '{customer_key}' in test '{test_id}'")]
    AssignmentNotFound {
        test_id: String,
        customer_key: String,
    },
    #[error("assignment store unavailable: {0}")]
    Unavailable(String),
}

/// What the significance computation recommends doing with the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    AdoptA,
    AdoptB,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignificanceReport {
    pub totals: ArmTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    pub recommended_action: RecommendedAction,
}

const SIGNIFICANCE_LEVEL: f64 = 0.05;
/// Arms thinner than this never produce a recommendation, whatever the
/// p-value says.
const MIN_ARM_SIZE: u64 = 30;

/// Deterministic, sticky allocator over an assignment store.
pub struct AbAllocator<S> {
    store: Arc<S>,
}

impl<S> AbAllocator<S>
where
    S: AssignmentStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Assign a customer to an arm. A stored assignment always wins over a
    /// recomputed hash, even if the allocation split has changed since.
    pub fn assign(&self, test: &AbTest, customer_key: &str) -> Result<Arm, AssignmentStoreError> {
        if let Some(existing) = self.store.get(&test.id, customer_key)? {
            return Ok(existing.arm);
        }

        let arm = if bucket(&test.id, customer_key) < u64::from(test.allocation_percentage_b) {
            Arm::B
        } else {
            Arm::A
        };

        let stored = self.store.put_if_absent(Assignment {
            test_id: test.id.clone(),
            customer_key: customer_key.to_string(),
            arm,
            converted: false,
        })?;
        Ok(stored.arm)
    }

    /// Mark a prior assignment as converted.
    pub fn record_conversion(
        &self,
        test_id: &str,
        customer_key: &str,
    ) -> Result<(), AssignmentStoreError> {
        self.store.record_conversion(test_id, customer_key)
    }

    /// Two-proportion z-test over the test's tallies with a recommendation.
    pub fn significance(&self, test_id: &str) -> Result<SignificanceReport, AssignmentStoreError> {
        let totals = self.store.totals(test_id)?;

        let result = two_proportion_z_test(&totals);
        let enough_data =
            totals.assigned_a >= MIN_ARM_SIZE && totals.assigned_b >= MIN_ARM_SIZE;

        let recommended_action = match result {
            Some(result) if enough_data && result.p_value < SIGNIFICANCE_LEVEL => {
                if result.z_score > 0.0 {
                    RecommendedAction::AdoptB
                } else {
                    RecommendedAction::AdoptA
                }
            }
            _ => RecommendedAction::Inconclusive,
        };

        Ok(SignificanceReport {
            totals,
            z_score: result.map(|r| r.z_score),
            p_value: result.map(|r| r.p_value),
            recommended_action,
        })
    }
}

/// Stable bucket in `[0, 100)` from the SHA-256 of test id and customer key.
fn bucket(test_id: &str, customer_key: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(test_id.as_bytes());
    hasher.update([0x1f]);
    hasher.update(customer_key.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % 100
}
