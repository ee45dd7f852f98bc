use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    bbe_api::GroupQueryFilter,
    db_types::{Group, GroupId, GroupStatus, NewGroup},
};

pub async fn insert_group(group: NewGroup, conn: &mut SqliteConnection) -> Result<Group, sqlx::Error> {
    let group = sqlx::query_as(
        r#"
            INSERT INTO buying_groups (
                product_id,
                area,
                center_lat,
                center_lon,
                radius_km,
                target_quantity,
                min_quantity,
                discount_percent,
                expires_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(group.product_id)
    .bind(group.area)
    .bind(group.center.lat)
    .bind(group.center.lon)
    .bind(group.radius_km)
    .bind(group.target_quantity)
    .bind(group.min_quantity)
    .bind(group.discount_percent)
    .bind(group.expires_at)
    .fetch_one(conn)
    .await?;
    Ok(group)
}

pub async fn fetch_group(group_id: GroupId, conn: &mut SqliteConnection) -> Result<Option<Group>, sqlx::Error> {
    let group =
        sqlx::query_as("SELECT * FROM buying_groups WHERE id = $1").bind(group_id).fetch_optional(conn).await?;
    Ok(group)
}

/// Fetches groups according to criteria specified in the `GroupQueryFilter`.
///
/// Resulting groups are ordered by `created_at` in ascending order
pub async fn search_groups(query: GroupQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Group>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM buying_groups
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(product_id) = query.product_id {
        where_clause.push("product_id = ");
        where_clause.push_bind_unseparated(product_id);
    }
    if let Some(area) = query.area {
        where_clause.push("area LIKE ");
        where_clause.push_bind_unseparated(format!("%{area}%"));
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");
    let groups = builder.build_query_as().fetch_all(conn).await?;
    Ok(groups)
}

pub async fn update_status(
    group_id: GroupId,
    status: GroupStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Group>, sqlx::Error> {
    let group = sqlx::query_as(
        "UPDATE buying_groups SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(group_id)
    .bind(status)
    .fetch_optional(conn)
    .await?;
    Ok(group)
}

/// Adds `delta` (which may be negative) to the group's committed quantity.
pub async fn adjust_quantity(
    group_id: GroupId,
    delta: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Group>, sqlx::Error> {
    let group = sqlx::query_as(
        "UPDATE buying_groups SET current_quantity = current_quantity + $2, updated_at = CURRENT_TIMESTAMP WHERE id \
         = $1 RETURNING *",
    )
    .bind(group_id)
    .bind(delta)
    .fetch_optional(conn)
    .await?;
    Ok(group)
}

/// All `Open` groups whose deadline is at or before `now`, oldest deadline first.
///
/// `unixepoch` normalizes the stored timestamps so string formatting differences
/// between `CURRENT_TIMESTAMP` and bound chrono values cannot skew the comparison.
pub async fn expired_open_groups(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Group>, sqlx::Error> {
    let groups = sqlx::query_as(
        "SELECT * FROM buying_groups WHERE status = 'Open' AND unixepoch(expires_at) <= unixepoch($1) ORDER BY \
         expires_at ASC",
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(groups)
}
