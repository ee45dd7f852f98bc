use sqlx::SqliteConnection;

use crate::{
    db_types::{EventRecord, GroupId},
    events::GroupEvent,
    traits::CoordinationDbError,
};

/// Appends events to the audit log in the order given. Insertion order is the
/// replay order; `id` is monotonic within a connection.
pub async fn insert_events(events: &[GroupEvent], conn: &mut SqliteConnection) -> Result<(), CoordinationDbError> {
    for event in events {
        let payload = serde_json::to_string(event)
            .map_err(|e| CoordinationDbError::DatabaseError(format!("Could not serialize event: {e}")))?;
        sqlx::query("INSERT INTO group_events (group_id, event_type, payload) VALUES ($1, $2, $3)")
            .bind(event.group_id())
            .bind(event.event_type())
            .bind(payload)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn fetch_for_group(group_id: GroupId, conn: &mut SqliteConnection) -> Result<Vec<EventRecord>, sqlx::Error> {
    let events = sqlx::query_as("SELECT * FROM group_events WHERE group_id = $1 ORDER BY id ASC")
        .bind(group_id)
        .fetch_all(conn)
        .await?;
    Ok(events)
}
