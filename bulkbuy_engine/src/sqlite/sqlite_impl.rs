//! `SqliteDatabase` is a concrete implementation of the coordination engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Each mutating method wraps one transaction; atomicity within a method plus the flow API's per-group
//! lock across methods is what keeps the counter, ledger and event log consistent.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{commitments, db_url, events, groups, new_pool, orders, products};
use crate::{
    bbe_api::GroupQueryFilter,
    db_types::{
        Commitment,
        CommitmentStatus,
        EventRecord,
        FulfilmentOrder,
        Group,
        GroupId,
        GroupStatus,
        NewCommitment,
        NewGroup,
        NewProduct,
        Product,
    },
    events::GroupEvent,
    traits::{CoordinationDatabase, CoordinationDbError, GroupApiError, GroupManagement},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl CoordinationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn upsert_product(&self, product: NewProduct) -> Result<Product, CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let product = products::upsert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: &str) -> Result<Option<Product>, CoordinationDbError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn insert_group(&self, group: NewGroup) -> Result<Group, CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let group = groups::insert_group(group, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Group {} has been saved in the DB", group.id);
        Ok(group)
    }

    async fn record_commitment(
        &self,
        commitment: NewCommitment,
        activate: bool,
    ) -> Result<(Commitment, Group), CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let group_id = commitment.group_id;
        let quantity = commitment.quantity;
        let commitment = commitments::insert_commitment(commitment, &mut tx).await?;
        let mut group = groups::adjust_quantity(group_id, quantity, &mut tx)
            .await?
            .ok_or(CoordinationDbError::GroupNotFound(group_id))?;
        if activate {
            group = groups::update_status(group_id, GroupStatus::Active, &mut tx)
                .await?
                .ok_or(CoordinationDbError::GroupNotFound(group_id))?;
        }
        tx.commit().await?;
        Ok((commitment, group))
    }

    async fn cancel_commitment(&self, commitment_id: i64) -> Result<(Commitment, Group), CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let existing = commitments::fetch_commitment(commitment_id, &mut tx)
            .await?
            .ok_or(CoordinationDbError::CommitmentNotFound(commitment_id))?;
        let cancelled = commitments::mark_cancelled(commitment_id, &mut tx).await?;
        let group = groups::adjust_quantity(existing.group_id, -existing.quantity, &mut tx)
            .await?
            .ok_or(CoordinationDbError::GroupNotFound(existing.group_id))?;
        tx.commit().await?;
        Ok((cancelled, group))
    }

    async fn confirm_commitment(
        &self,
        commitment_id: i64,
    ) -> Result<(Commitment, FulfilmentOrder), CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let existing = commitments::fetch_commitment(commitment_id, &mut tx)
            .await?
            .ok_or(CoordinationDbError::CommitmentNotFound(commitment_id))?;
        let confirmed = if existing.status == CommitmentStatus::Confirmed {
            existing
        } else {
            commitments::mark_confirmed(commitment_id, &mut tx).await?
        };
        let (order, _created) = orders::idempotent_insert(&confirmed, &mut tx).await?;
        tx.commit().await?;
        Ok((confirmed, order))
    }

    async fn void_pending_commitments(&self, group_id: GroupId) -> Result<Vec<Commitment>, CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let voided = commitments::void_pending(group_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Voided {} pending commitment(s) on group {group_id}", voided.len());
        Ok(voided)
    }

    async fn update_group_status(&self, group_id: GroupId, status: GroupStatus) -> Result<Group, CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let group = groups::update_status(group_id, status, &mut tx)
            .await?
            .ok_or(CoordinationDbError::GroupNotFound(group_id))?;
        tx.commit().await?;
        Ok(group)
    }

    async fn mark_hold_released(&self, commitment_id: i64) -> Result<Commitment, CoordinationDbError> {
        let mut tx = self.pool.begin().await?;
        let commitment = commitments::mark_hold_released(commitment_id, &mut tx).await?;
        tx.commit().await?;
        Ok(commitment)
    }

    async fn append_events(&self, group_events: &[GroupEvent]) -> Result<(), CoordinationDbError> {
        if group_events.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        events::insert_events(group_events, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn pending_commitment_for(
        &self,
        group_id: GroupId,
        buyer_id: &str,
    ) -> Result<Option<Commitment>, CoordinationDbError> {
        let mut conn = self.pool.acquire().await?;
        let commitment = commitments::pending_for(group_id, buyer_id, &mut conn).await?;
        Ok(commitment)
    }

    async fn fetch_pending_commitments(&self, group_id: GroupId) -> Result<Vec<Commitment>, CoordinationDbError> {
        let mut conn = self.pool.acquire().await?;
        let pending = commitments::fetch_pending(group_id, &mut conn).await?;
        Ok(pending)
    }

    async fn expired_open_groups(&self, now: DateTime<Utc>) -> Result<Vec<Group>, CoordinationDbError> {
        let mut conn = self.pool.acquire().await?;
        let expired = groups::expired_open_groups(now, &mut conn).await?;
        Ok(expired)
    }

    async fn commitment_by_hold_ref(&self, hold_ref: &str) -> Result<Option<Commitment>, CoordinationDbError> {
        let mut conn = self.pool.acquire().await?;
        let commitment = commitments::fetch_by_hold_ref(hold_ref, &mut conn).await?;
        Ok(commitment)
    }

    async fn close(&mut self) -> Result<(), CoordinationDbError> {
        self.pool.close().await;
        Ok(())
    }
}

impl GroupManagement for SqliteDatabase {
    async fn fetch_group(&self, group_id: GroupId) -> Result<Option<Group>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let group = groups::fetch_group(group_id, &mut conn).await?;
        Ok(group)
    }

    async fn search_groups(&self, query: GroupQueryFilter) -> Result<Vec<Group>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let groups = groups::search_groups(query, &mut conn).await?;
        Ok(groups)
    }

    async fn fetch_commitment(&self, commitment_id: i64) -> Result<Option<Commitment>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let commitment = commitments::fetch_commitment(commitment_id, &mut conn).await?;
        Ok(commitment)
    }

    async fn fetch_commitments_for_buyer(&self, buyer_id: &str) -> Result<Vec<Commitment>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let commitments = commitments::fetch_for_buyer(buyer_id, &mut conn).await?;
        Ok(commitments)
    }

    async fn fetch_commitments_for_group(&self, group_id: GroupId) -> Result<Vec<Commitment>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let commitments = commitments::fetch_for_group(group_id, &mut conn).await?;
        Ok(commitments)
    }

    async fn fetch_orders_for_group(&self, group_id: GroupId) -> Result<Vec<FulfilmentOrder>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_for_group(group_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_events_for_group(&self, group_id: GroupId) -> Result<Vec<EventRecord>, GroupApiError> {
        let mut conn = self.pool.acquire().await?;
        let events = events::fetch_for_group(group_id, &mut conn).await?;
        Ok(events)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
