use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Commitment, FulfilmentOrder, Group, GroupId, GroupStatus, NewCommitment, NewGroup, NewProduct, Product},
    events::GroupEvent,
    traits::{GroupApiError, GroupManagement},
};

/// The highest level of behaviour a storage backend must expose to support the
/// coordination engine.
///
/// Every method is a single atomic unit: the flow API serializes all writers to one
/// group with a per-group lock, and each method here wraps its own transaction so a
/// crash between calls never leaves a half-applied mutation. Audit events are
/// appended via [`Self::append_events`] while the caller still holds the group's
/// lock, which keeps the log in commit order.
#[allow(async_fn_in_trait)]
pub trait CoordinationDatabase: Clone + GroupManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a product in the catalog read model. Idempotent upsert keyed on id.
    async fn upsert_product(&self, product: NewProduct) -> Result<Product, CoordinationDbError>;

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, CoordinationDbError>;

    /// Creates a new group in `Open` status with a zero counter.
    async fn insert_group(&self, group: NewGroup) -> Result<Group, CoordinationDbError>;

    /// Appends a pending commitment and increments the group counter by its quantity,
    /// atomically. When `activate` is set, the group status flips to `Active` in the
    /// same transaction (the immediate-threshold path of the state machine).
    ///
    /// Returns the inserted commitment and the updated group row.
    async fn record_commitment(
        &self,
        commitment: NewCommitment,
        activate: bool,
    ) -> Result<(Commitment, Group), CoordinationDbError>;

    /// Marks a pending commitment as cancelled, records the hold as released, and
    /// decrements the group counter, atomically. Only valid while the group is open;
    /// voiding commitments of a failed group goes through
    /// [`Self::void_pending_commitments`] instead, which leaves the counter frozen.
    async fn cancel_commitment(&self, commitment_id: i64) -> Result<(Commitment, Group), CoordinationDbError>;

    /// Marks a commitment as confirmed with its hold captured, and creates the
    /// fulfilment order for it, atomically. Idempotent: confirming an already
    /// confirmed commitment returns the existing order.
    async fn confirm_commitment(&self, commitment_id: i64) -> Result<(Commitment, FulfilmentOrder), CoordinationDbError>;

    /// Cancels every pending commitment of a group without touching the (frozen)
    /// counter. Used on the failure path of expiry. Returns the affected commitments.
    async fn void_pending_commitments(&self, group_id: GroupId) -> Result<Vec<Commitment>, CoordinationDbError>;

    /// Transitions the group to `status`. The flow API is the only writer and
    /// enforces the state machine; the backend applies the change verbatim.
    async fn update_group_status(&self, group_id: GroupId, status: GroupStatus) -> Result<Group, CoordinationDbError>;

    /// Records that a commitment's hold was released upstream, without any ledger
    /// transition. No-op if the commitment has no hold or it was already released.
    async fn mark_hold_released(&self, commitment_id: i64) -> Result<Commitment, CoordinationDbError>;

    /// Appends events to the group's immutable audit log, in order.
    async fn append_events(&self, events: &[GroupEvent]) -> Result<(), CoordinationDbError>;

    /// The buyer's pending commitment for the group, if any.
    async fn pending_commitment_for(
        &self,
        group_id: GroupId,
        buyer_id: &str,
    ) -> Result<Option<Commitment>, CoordinationDbError>;

    /// All pending commitments for the group, oldest first.
    async fn fetch_pending_commitments(&self, group_id: GroupId) -> Result<Vec<Commitment>, CoordinationDbError>;

    /// All `Open` groups whose deadline has passed as of `now`.
    async fn expired_open_groups(&self, now: DateTime<Utc>) -> Result<Vec<Group>, CoordinationDbError>;

    /// Looks a commitment up by its processor hold reference.
    async fn commitment_by_hold_ref(&self, hold_ref: &str) -> Result<Option<Commitment>, CoordinationDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), CoordinationDbError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum CoordinationDbError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested group {0} does not exist")]
    GroupNotFound(GroupId),
    #[error("The requested commitment (internal id {0}) does not exist")]
    CommitmentNotFound(i64),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(String),
    #[error("A commitment for this buyer is already pending on group {0}")]
    DuplicatePendingCommitment(GroupId),
    #[error("{0}")]
    QueryError(#[from] GroupApiError),
}

impl From<sqlx::Error> for CoordinationDbError {
    fn from(e: sqlx::Error) -> Self {
        CoordinationDbError::DatabaseError(e.to_string())
    }
}
