use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Commitment, FulfilmentOrder, GroupId},
    traits::CoordinationDbError,
};

/// Creates the fulfilment order for a confirmed commitment, returning the existing
/// order if one was already created (`commitment_id` is unique).
pub async fn idempotent_insert(
    commitment: &Commitment,
    conn: &mut SqliteConnection,
) -> Result<(FulfilmentOrder, bool), CoordinationDbError> {
    let inserted = match fetch_by_commitment(commitment.id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(commitment, conn).await?;
            debug!("🗃️ Fulfilment order {} created for commitment {}", order.id, commitment.id);
            (order, true)
        },
    };
    Ok(inserted)
}

async fn insert_order(commitment: &Commitment, conn: &mut SqliteConnection) -> Result<FulfilmentOrder, sqlx::Error> {
    let order = sqlx::query_as(
        r#"
            INSERT INTO fulfilment_orders (
                group_id,
                commitment_id,
                buyer_id,
                quantity,
                unit_price,
                total_price
            ) VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(commitment.group_id)
    .bind(commitment.id)
    .bind(commitment.buyer_id.as_str())
    .bind(commitment.quantity)
    .bind(commitment.unit_price)
    .bind(commitment.total_price)
    .fetch_one(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_by_commitment(
    commitment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<FulfilmentOrder>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM fulfilment_orders WHERE commitment_id = $1")
        .bind(commitment_id)
        .fetch_optional(conn)
        .await?;
    Ok(order)
}

pub async fn fetch_for_group(
    group_id: GroupId,
    conn: &mut SqliteConnection,
) -> Result<Vec<FulfilmentOrder>, sqlx::Error> {
    let orders = sqlx::query_as("SELECT * FROM fulfilment_orders WHERE group_id = $1 ORDER BY id ASC")
        .bind(group_id)
        .fetch_all(conn)
        .await?;
    Ok(orders)
}
