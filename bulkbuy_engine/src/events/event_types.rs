use serde::{Deserialize, Serialize};

use crate::db_types::{GroupId, GroupStatus};

/// The closed set of events a group can emit. One payload shape per variant, so the
/// broadcast layer and its consumers stay exhaustive and type-checked.
///
/// The serialized form is `{"type": "...", "data": {...}}`, which is also the wire
/// format of the WebSocket broadcast protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GroupEvent {
    ProgressUpdate(ProgressPayload),
    NewCommitment(CommitmentPayload),
    CommitmentCancelled(CommitmentPayload),
    ThresholdReached(ThresholdPayload),
    StatusChange(StatusChangePayload),
}

impl GroupEvent {
    pub fn group_id(&self) -> GroupId {
        match self {
            GroupEvent::ProgressUpdate(p) => p.group_id,
            GroupEvent::NewCommitment(p) => p.group_id,
            GroupEvent::CommitmentCancelled(p) => p.group_id,
            GroupEvent::ThresholdReached(p) => p.group_id,
            GroupEvent::StatusChange(p) => p.group_id,
        }
    }

    /// The wire name of the variant, used as the `event_type` column of the audit log.
    pub fn event_type(&self) -> &'static str {
        match self {
            GroupEvent::ProgressUpdate(_) => "progress_update",
            GroupEvent::NewCommitment(_) => "new_commitment",
            GroupEvent::CommitmentCancelled(_) => "commitment_cancelled",
            GroupEvent::ThresholdReached(_) => "threshold_reached",
            GroupEvent::StatusChange(_) => "status_change",
        }
    }
}

/// An idempotent snapshot of group progress. Consumers must treat this as a
/// replacement, never as a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    pub group_id: GroupId,
    pub current_quantity: i64,
    pub target_quantity: i64,
    pub min_quantity: i64,
    pub percent: i64,
    pub status: GroupStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitmentPayload {
    pub group_id: GroupId,
    pub commitment_id: i64,
    pub buyer_id: String,
    pub quantity: i64,
    pub current_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPayload {
    pub group_id: GroupId,
    pub threshold_percent: i64,
    pub current_quantity: i64,
    pub target_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangePayload {
    pub group_id: GroupId,
    pub old_status: GroupStatus,
    pub new_status: GroupStatus,
}

/// Emitted once when a group reaches a terminal state, for operational hooks
/// (notifications, reporting) that do not care about per-commitment noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFinalizedEvent {
    pub group_id: GroupId,
    pub status: GroupStatus,
    pub current_quantity: i64,
    pub orders_created: usize,
    pub orders_failed: usize,
}
