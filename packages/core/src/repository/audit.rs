//! Append-only audit log.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows::{self, ts};
use crate::error::StoreError;
use crate::model::{AuditEntry, CustodyEventType};

/// An audit entry about to be written.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
    pub entity_type: &'static str,
    pub entity_id: Uuid,
    pub event_type: CustodyEventType,
    pub old_state: Option<Value>,
    pub new_state: Option<Value>,
    pub changed_by: Option<Uuid>,
    pub edge_node_id: Option<Uuid>,
    pub notes: Option<String>,
}

fn snapshot(entity: &'static str, raw: Option<String>) -> Result<Option<Value>, StoreError> {
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|e| StoreError::corrupt(entity, format!("bad state snapshot: {e}")))
    })
    .transpose()
}

pub(crate) fn entry_from_row(row: &SqliteRow) -> Result<AuditEntry, StoreError> {
    use sqlx::Row;
    const E: &str = "audit entry";
    Ok(AuditEntry {
        id: row.try_get("id")?,
        entity_type: row.try_get("entity_type")?,
        entity_id: rows::uuid(row, E, "entity_id")?,
        event_type: row.try_get("event_type")?,
        old_state: snapshot(E, row.try_get("old_state")?)?,
        new_state: snapshot(E, row.try_get("new_state")?)?,
        changed_by: rows::opt_uuid(row, E, "changed_by")?,
        edge_node_id: rows::opt_uuid(row, E, "edge_node_id")?,
        notes: row.try_get("notes")?,
        created_at: rows::time(row, E, "created_at")?,
    })
}

pub async fn append(
    conn: &mut SqliteConnection,
    entry: &NewAuditEntry,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO audit_log
         (entity_type, entity_id, event_type, old_state, new_state, changed_by, edge_node_id,
          notes, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.entity_type)
    .bind(entry.entity_id.to_string())
    .bind(entry.event_type.as_str())
    .bind(entry.old_state.as_ref().map(Value::to_string))
    .bind(entry.new_state.as_ref().map(Value::to_string))
    .bind(entry.changed_by.map(|id| id.to_string()))
    .bind(entry.edge_node_id.map(|id| id.to_string()))
    .bind(entry.notes.as_deref())
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Recent entries, newest first. `limit` is clamped to 1..=500.
pub async fn list_entries(
    conn: &mut SqliteConnection,
    entity_type: Option<&str>,
    entity_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<AuditEntry>, StoreError> {
    let limit = limit.clamp(1, 500);

    let mut conditions = vec!["1=1"];
    if entity_type.is_some() {
        conditions.push("entity_type = ?");
    }
    if entity_id.is_some() {
        conditions.push("entity_id = ?");
    }
    let sql = format!(
        "SELECT id, entity_type, entity_id, event_type, old_state, new_state, changed_by,
                edge_node_id, notes, created_at
         FROM audit_log
         WHERE {}
         ORDER BY id DESC
         LIMIT ?",
        conditions.join(" AND ")
    );

    let mut query = sqlx::query(&sql);
    if let Some(entity_type) = entity_type {
        query = query.bind(entity_type);
    }
    if let Some(id) = entity_id {
        query = query.bind(id.to_string());
    }
    let rows = query.bind(limit).fetch_all(&mut *conn).await?;
    rows.iter().map(entry_from_row).collect()
}
