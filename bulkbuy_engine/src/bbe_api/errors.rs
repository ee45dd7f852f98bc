use thiserror::Error;

use crate::{
    db_types::{GroupId, GroupStatus},
    traits::{CoordinationDbError, GroupApiError},
};

/// Every rejection a public flow operation can produce. Each variant carries a
/// stable machine-readable code ([`Self::code`]) so callers can branch on semantics
/// without parsing messages.
#[derive(Debug, Clone, Error)]
pub enum GroupFlowError {
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("The group is no longer open (status: {0})")]
    GroupClosed(GroupStatus),
    #[error("The group's deadline has passed")]
    GroupExpired,
    #[error("You already have a pending commitment on this group")]
    DuplicateCommitment,
    #[error("Requested quantity exceeds the remaining stock ({available} available)")]
    ExceedsStock { available: i64 },
    #[error("Delivery address is {distance_km:.1} km from the group center; the delivery radius is {radius_km:.1} km")]
    OutsideRadius { distance_km: f64, radius_km: f64 },
    #[error("The payment hold was declined: {0}")]
    PaymentDeclined(String),
    #[error("The payment processor is unavailable: {0}")]
    ProcessorUnavailable(String),
    #[error("The requested group {0} does not exist")]
    GroupNotFound(GroupId),
    #[error("The requested commitment does not exist")]
    CommitmentNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(String),
    #[error("This commitment belongs to another buyer")]
    NotCommitmentOwner,
    #[error("The commitment is not pending and cannot be cancelled")]
    CommitmentNotPending,
    #[error("Invalid group configuration: {0}")]
    InvalidGroupConfig(String),
    #[error("Backend error: {0}")]
    Backend(#[from] CoordinationDbError),
}

impl GroupFlowError {
    /// Stable error code for API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            GroupFlowError::InvalidQuantity => "INVALID_QUANTITY",
            GroupFlowError::GroupClosed(_) => "GROUP_CLOSED",
            GroupFlowError::GroupExpired => "GROUP_EXPIRED",
            GroupFlowError::DuplicateCommitment => "DUPLICATE_COMMITMENT",
            GroupFlowError::ExceedsStock { .. } => "EXCEEDS_STOCK",
            GroupFlowError::OutsideRadius { .. } => "OUTSIDE_RADIUS",
            GroupFlowError::PaymentDeclined(_) => "PAYMENT_DECLINED",
            GroupFlowError::ProcessorUnavailable(_) => "PROCESSOR_UNAVAILABLE",
            GroupFlowError::GroupNotFound(_) => "GROUP_NOT_FOUND",
            GroupFlowError::CommitmentNotFound(_) => "COMMITMENT_NOT_FOUND",
            GroupFlowError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            GroupFlowError::NotCommitmentOwner => "NOT_COMMITMENT_OWNER",
            GroupFlowError::CommitmentNotPending => "COMMITMENT_NOT_PENDING",
            GroupFlowError::InvalidGroupConfig(_) => "INVALID_GROUP_CONFIG",
            GroupFlowError::Backend(_) => "BACKEND_ERROR",
        }
    }
}

impl From<GroupApiError> for GroupFlowError {
    fn from(e: GroupApiError) -> Self {
        match e {
            GroupApiError::GroupNotFound(id) => GroupFlowError::GroupNotFound(id),
            GroupApiError::CommitmentNotFound(id) => GroupFlowError::CommitmentNotFound(id),
            GroupApiError::DatabaseError(msg) => {
                GroupFlowError::Backend(CoordinationDbError::DatabaseError(msg))
            },
        }
    }
}
