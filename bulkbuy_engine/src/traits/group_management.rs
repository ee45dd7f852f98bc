use thiserror::Error;

use crate::{
    bbe_api::GroupQueryFilter,
    db_types::{Commitment, EventRecord, FulfilmentOrder, Group, GroupId},
};

/// Read-side queries over groups, commitments, orders and the event log. Everything
/// here is side-effect free and safe to call without the per-group lock.
#[allow(async_fn_in_trait)]
pub trait GroupManagement {
    async fn fetch_group(&self, group_id: GroupId) -> Result<Option<Group>, GroupApiError>;

    /// Fetches groups matching the given filter, ordered by creation time.
    async fn search_groups(&self, query: GroupQueryFilter) -> Result<Vec<Group>, GroupApiError>;

    async fn fetch_commitment(&self, commitment_id: i64) -> Result<Option<Commitment>, GroupApiError>;

    /// All commitments a buyer ever made, newest first.
    async fn fetch_commitments_for_buyer(&self, buyer_id: &str) -> Result<Vec<Commitment>, GroupApiError>;

    async fn fetch_commitments_for_group(&self, group_id: GroupId) -> Result<Vec<Commitment>, GroupApiError>;

    async fn fetch_orders_for_group(&self, group_id: GroupId) -> Result<Vec<FulfilmentOrder>, GroupApiError>;

    /// The append-only event log for a group, oldest first. Used to rehydrate a
    /// client's view on reconnect.
    async fn fetch_events_for_group(&self, group_id: GroupId) -> Result<Vec<EventRecord>, GroupApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum GroupApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested group {0} does not exist")]
    GroupNotFound(GroupId),
    #[error("The requested commitment (internal id {0}) does not exist")]
    CommitmentNotFound(i64),
}

impl From<sqlx::Error> for GroupApiError {
    fn from(e: sqlx::Error) -> Self {
        GroupApiError::DatabaseError(e.to_string())
    }
}
