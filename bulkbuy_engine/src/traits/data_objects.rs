use serde::{Deserialize, Serialize};

use crate::db_types::{FulfilmentOrder, GroupId};

/// Outcome of converting one group's pending commitments into fulfilment orders.
///
/// Conversion is per-commitment and independently retryable: a failed capture does
/// not roll back the others, so partial success is a first-class result, not an
/// error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    pub group_id: GroupId,
    pub orders: Vec<FulfilmentOrder>,
    /// Commitment ids whose capture failed and were left for remediation.
    pub failed: Vec<i64>,
}

impl ConversionResult {
    pub fn new(group_id: GroupId) -> Self {
        Self { group_id, orders: Vec::new(), failed: Vec::new() }
    }

    pub fn created_count(&self) -> usize {
        self.orders.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Outcome of one sweeper pass over expired open groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepResult {
    /// Groups that met their minimum and were converted.
    pub completed: Vec<ConversionResult>,
    /// Groups finalized as failed, with their voided commitment counts.
    pub failed: Vec<(GroupId, usize)>,
}

impl SweepResult {
    pub fn total_count(&self) -> usize {
        self.completed.len() + self.failed.len()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
