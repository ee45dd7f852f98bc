use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Commitment, GroupId, NewCommitment},
    traits::CoordinationDbError,
};

/// Inserts a pending commitment. The partial unique index on `(group_id, buyer_id)
/// WHERE status = 'Pending'` is the last line of defence for the one-pending-
/// commitment rule; a violation maps to [`CoordinationDbError::DuplicatePendingCommitment`].
pub async fn insert_commitment(
    commitment: NewCommitment,
    conn: &mut SqliteConnection,
) -> Result<Commitment, CoordinationDbError> {
    let group_id = commitment.group_id;
    let result: Result<Commitment, sqlx::Error> = sqlx::query_as(
        r#"
            INSERT INTO commitments (
                group_id,
                buyer_id,
                quantity,
                unit_price,
                total_price,
                postcode,
                lat,
                lon,
                hold_ref,
                hold_status
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(commitment.group_id)
    .bind(commitment.buyer_id)
    .bind(commitment.quantity)
    .bind(commitment.unit_price)
    .bind(commitment.total_price)
    .bind(commitment.postcode)
    .bind(commitment.location.lat)
    .bind(commitment.location.lon)
    .bind(commitment.hold_ref.as_deref())
    .bind(if commitment.hold_ref.is_some() { "Held" } else { "None" })
    .fetch_one(conn)
    .await;
    match result {
        Ok(commitment) => {
            debug!("🗃️ Commitment {} recorded against group {group_id}", commitment.id);
            Ok(commitment)
        },
        Err(sqlx::Error::Database(de)) if de.is_unique_violation() => {
            Err(CoordinationDbError::DuplicatePendingCommitment(group_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_commitment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Commitment>, sqlx::Error> {
    let commitment =
        sqlx::query_as("SELECT * FROM commitments WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(commitment)
}

/// The buyer's pending commitment on the group, if there is one. The partial unique
/// index guarantees at most one row.
pub async fn pending_for(
    group_id: GroupId,
    buyer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Commitment>, sqlx::Error> {
    let commitment = sqlx::query_as(
        "SELECT * FROM commitments WHERE group_id = $1 AND buyer_id = $2 AND status = 'Pending'",
    )
    .bind(group_id)
    .bind(buyer_id)
    .fetch_optional(conn)
    .await?;
    Ok(commitment)
}

pub async fn fetch_for_group(group_id: GroupId, conn: &mut SqliteConnection) -> Result<Vec<Commitment>, sqlx::Error> {
    let commitments = sqlx::query_as("SELECT * FROM commitments WHERE group_id = $1 ORDER BY id ASC")
        .bind(group_id)
        .fetch_all(conn)
        .await?;
    Ok(commitments)
}

pub async fn fetch_pending(group_id: GroupId, conn: &mut SqliteConnection) -> Result<Vec<Commitment>, sqlx::Error> {
    let commitments =
        sqlx::query_as("SELECT * FROM commitments WHERE group_id = $1 AND status = 'Pending' ORDER BY id ASC")
            .bind(group_id)
            .fetch_all(conn)
            .await?;
    Ok(commitments)
}

pub async fn fetch_for_buyer(buyer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Commitment>, sqlx::Error> {
    let commitments = sqlx::query_as("SELECT * FROM commitments WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(buyer_id)
        .fetch_all(conn)
        .await?;
    Ok(commitments)
}

pub async fn fetch_by_hold_ref(hold_ref: &str, conn: &mut SqliteConnection) -> Result<Option<Commitment>, sqlx::Error> {
    let commitment =
        sqlx::query_as("SELECT * FROM commitments WHERE hold_ref = $1").bind(hold_ref).fetch_optional(conn).await?;
    Ok(commitment)
}

/// Marks the commitment cancelled and its hold (if any was placed) released.
pub(crate) async fn mark_cancelled(id: i64, conn: &mut SqliteConnection) -> Result<Commitment, CoordinationDbError> {
    let result: Option<Commitment> = sqlx::query_as(
        "UPDATE commitments SET status = 'Cancelled', hold_status = CASE hold_status WHEN 'Held' THEN 'Released' \
         ELSE hold_status END, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(CoordinationDbError::CommitmentNotFound(id))
}

/// Marks the commitment confirmed and its hold captured.
pub(crate) async fn mark_confirmed(id: i64, conn: &mut SqliteConnection) -> Result<Commitment, CoordinationDbError> {
    let result: Option<Commitment> = sqlx::query_as(
        "UPDATE commitments SET status = 'Confirmed', hold_status = CASE hold_status WHEN 'Held' THEN 'Captured' \
         ELSE hold_status END, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(CoordinationDbError::CommitmentNotFound(id))
}

/// Cancels every pending commitment of the group in one statement, releasing their
/// holds. Used on the failure path; the group counter is not touched.
pub(crate) async fn void_pending(group_id: GroupId, conn: &mut SqliteConnection) -> Result<Vec<Commitment>, sqlx::Error> {
    let voided = sqlx::query_as(
        "UPDATE commitments SET status = 'Cancelled', hold_status = CASE hold_status WHEN 'Held' THEN 'Released' \
         ELSE hold_status END, updated_at = CURRENT_TIMESTAMP WHERE group_id = $1 AND status = 'Pending' RETURNING *",
    )
    .bind(group_id)
    .fetch_all(conn)
    .await?;
    Ok(voided)
}

pub(crate) async fn mark_hold_released(id: i64, conn: &mut SqliteConnection) -> Result<Commitment, CoordinationDbError> {
    let result: Option<Commitment> = sqlx::query_as(
        "UPDATE commitments SET hold_status = 'Released', updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(conn)
    .await?;
    result.ok_or(CoordinationDbError::CommitmentNotFound(id))
}
