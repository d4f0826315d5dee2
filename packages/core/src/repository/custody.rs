//! Custody records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows::{self, ts};
use crate::error::StoreError;
use crate::model::{CustodyRecord, ItemKind, ItemRef};

const RECORD_COLUMNS: &str = "c.id, c.asset_id, c.kit_id, c.worker_id, c.edge_node_id, \
     c.event_type, c.checked_out_at, c.expected_return_at, c.returned_at, c.is_overdue, \
     c.overdue_flagged_at, c.overdue_hours, c.is_override, c.override_by, c.override_reason, \
     c.notes, c.created_at";

pub(crate) fn record_from_row(row: &SqliteRow) -> Result<CustodyRecord, StoreError> {
    use sqlx::Row;
    const E: &str = "custody record";
    let asset_id = rows::opt_uuid(row, E, "asset_id")?;
    let kit_id = rows::opt_uuid(row, E, "kit_id")?;
    let item = match (asset_id, kit_id) {
        (Some(id), None) => ItemRef::asset(id),
        (None, Some(id)) => ItemRef::kit(id),
        _ => {
            return Err(StoreError::corrupt(
                E,
                "record must reference exactly one of asset or kit",
            ))
        }
    };
    Ok(CustodyRecord {
        id: rows::uuid(row, E, "id")?,
        item,
        worker_id: rows::uuid(row, E, "worker_id")?,
        edge_node_id: rows::opt_uuid(row, E, "edge_node_id")?,
        event_type: rows::enum_col(row, E, "event_type")?,
        checked_out_at: rows::time(row, E, "checked_out_at")?,
        expected_return_at: rows::opt_time(row, E, "expected_return_at")?,
        returned_at: rows::opt_time(row, E, "returned_at")?,
        is_overdue: rows::flag(row, "is_overdue")?,
        overdue_flagged_at: rows::opt_time(row, E, "overdue_flagged_at")?,
        overdue_hours: row.try_get("overdue_hours")?,
        is_override: rows::flag(row, "is_override")?,
        override_by: rows::opt_uuid(row, E, "override_by")?,
        override_reason: row.try_get("override_reason")?,
        notes: row.try_get("notes")?,
        created_at: rows::time(row, E, "created_at")?,
    })
}

pub async fn insert_record(
    conn: &mut SqliteConnection,
    record: &CustodyRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO custody_records
         (id, asset_id, kit_id, worker_id, edge_node_id, event_type, checked_out_at,
          expected_return_at, returned_at, is_overdue, overdue_flagged_at, overdue_hours,
          is_override, override_by, override_reason, notes, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id.to_string())
    .bind(record.item.asset_id().map(|id| id.to_string()))
    .bind(record.item.kit_id().map(|id| id.to_string()))
    .bind(record.worker_id.to_string())
    .bind(record.edge_node_id.map(|id| id.to_string()))
    .bind(record.event_type.as_str())
    .bind(ts(record.checked_out_at))
    .bind(record.expected_return_at.map(ts))
    .bind(record.returned_at.map(ts))
    .bind(record.is_overdue as i64)
    .bind(record.overdue_flagged_at.map(ts))
    .bind(record.overdue_hours)
    .bind(record.is_override as i64)
    .bind(record.override_by.map(|id| id.to_string()))
    .bind(record.override_reason.as_deref())
    .bind(record.notes.as_deref())
    .bind(ts(record.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn fetch_record(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<CustodyRecord>, StoreError> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM custody_records c WHERE c.id = ?");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(record_from_row).transpose()
}

/// The item's open record, most recent checkout first.
pub async fn find_open_record(
    conn: &mut SqliteConnection,
    item: ItemRef,
) -> Result<Option<CustodyRecord>, StoreError> {
    let column = match item.kind {
        ItemKind::Asset => "asset_id",
        ItemKind::Kit => "kit_id",
    };
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM custody_records c
         WHERE c.{column} = ? AND c.returned_at IS NULL
         ORDER BY c.checked_out_at DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(item.id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(record_from_row).transpose()
}

/// Close an open record. Returns `false` if it was already closed.
///
/// `notes` replaces the stored notes only when given.
pub async fn close_record(
    conn: &mut SqliteConnection,
    id: Uuid,
    returned_at: DateTime<Utc>,
    overdue_hours: Option<f64>,
    notes: Option<&str>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE custody_records
         SET returned_at = ?, overdue_hours = COALESCE(?, overdue_hours), notes = COALESCE(?, notes)
         WHERE id = ? AND returned_at IS NULL",
    )
    .bind(ts(returned_at))
    .bind(overdue_hours)
    .bind(notes)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Ids of open records that carry a return deadline.
pub async fn list_open_record_ids_with_deadline(
    conn: &mut SqliteConnection,
) -> Result<Vec<Uuid>, StoreError> {
    use sqlx::Row;
    let rows = sqlx::query(
        "SELECT id FROM custody_records
         WHERE returned_at IS NULL AND expected_return_at IS NOT NULL
         ORDER BY expected_return_at ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    rows.iter()
        .map(|row| {
            let raw: String = row.try_get("id")?;
            Uuid::parse_str(&raw)
                .map_err(|e| StoreError::corrupt("custody record", format!("bad id '{raw}': {e}")))
        })
        .collect()
}

/// Flag an open record overdue.
///
/// `overdue_flagged_at` keeps its first value; `overdue_hours` is refreshed.
pub async fn mark_overdue(
    conn: &mut SqliteConnection,
    id: Uuid,
    now: DateTime<Utc>,
    overdue_hours: f64,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE custody_records
         SET is_overdue = 1, overdue_flagged_at = COALESCE(overdue_flagged_at, ?), overdue_hours = ?
         WHERE id = ? AND returned_at IS NULL",
    )
    .bind(ts(now))
    .bind(overdue_hours)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// A currently open custody record joined with who and what.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCustody {
    pub record_id: Uuid,
    pub worker_name: String,
    pub worker_employee_id: String,
    pub item_kind: ItemKind,
    pub item_code: String,
    pub item_name: String,
    pub checked_out_at: DateTime<Utc>,
    pub expected_return_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub overdue_hours: Option<f64>,
    pub is_override: bool,
    pub hours_elapsed: f64,
}

/// A custody record with the worker and item names resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CustodyHistoryEntry {
    #[serde(flatten)]
    pub record: CustodyRecord,
    pub worker_name: String,
    pub item_code: String,
    pub item_name: String,
}

const JOINED_FROM: &str = "FROM custody_records c
     JOIN workers w ON w.id = c.worker_id
     LEFT JOIN assets a ON a.id = c.asset_id
     LEFT JOIN kits k ON k.id = c.kit_id";

const JOINED_COLUMNS: &str = "w.full_name AS worker_name, w.employee_id AS worker_employee_id, \
     COALESCE(a.asset_code, k.kit_code) AS item_code, COALESCE(a.name, k.name) AS item_name";

pub async fn list_active(
    conn: &mut SqliteConnection,
    now: DateTime<Utc>,
) -> Result<Vec<ActiveCustody>, StoreError> {
    use sqlx::Row;
    let sql = format!(
        "SELECT {RECORD_COLUMNS}, {JOINED_COLUMNS} {JOINED_FROM}
         WHERE c.returned_at IS NULL
         ORDER BY c.checked_out_at DESC"
    );
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter()
        .map(|row| -> Result<ActiveCustody, StoreError> {
            let record = record_from_row(row)?;
            let elapsed = (now - record.checked_out_at).num_seconds() as f64 / 3600.0;
            Ok(ActiveCustody {
                record_id: record.id,
                worker_name: row.try_get("worker_name")?,
                worker_employee_id: row.try_get("worker_employee_id")?,
                item_kind: record.item.kind,
                item_code: row.try_get("item_code")?,
                item_name: row.try_get("item_name")?,
                checked_out_at: record.checked_out_at,
                expected_return_at: record.expected_return_at,
                is_overdue: record.is_overdue,
                overdue_hours: record.overdue_hours,
                is_override: record.is_override,
                hours_elapsed: (elapsed * 100.0).round() / 100.0,
            })
        })
        .collect()
}

/// Custody history, newest first. `limit` is clamped to 1..=200.
pub async fn list_history(
    conn: &mut SqliteConnection,
    asset_id: Option<Uuid>,
    worker_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<CustodyHistoryEntry>, StoreError> {
    use sqlx::Row;
    let limit = limit.clamp(1, 200);

    let mut conditions = vec!["1=1"];
    if asset_id.is_some() {
        conditions.push("c.asset_id = ?");
    }
    if worker_id.is_some() {
        conditions.push("c.worker_id = ?");
    }
    let sql = format!(
        "SELECT {RECORD_COLUMNS}, {JOINED_COLUMNS} {JOINED_FROM}
         WHERE {}
         ORDER BY c.checked_out_at DESC
         LIMIT ?",
        conditions.join(" AND ")
    );

    let mut query = sqlx::query(&sql);
    if let Some(id) = asset_id {
        query = query.bind(id.to_string());
    }
    if let Some(id) = worker_id {
        query = query.bind(id.to_string());
    }
    let rows = query.bind(limit).fetch_all(&mut *conn).await?;

    rows.iter()
        .map(|row| -> Result<CustodyHistoryEntry, StoreError> {
            Ok(CustodyHistoryEntry {
                record: record_from_row(row)?,
                worker_name: row.try_get("worker_name")?,
                item_code: row.try_get("item_code")?,
                item_name: row.try_get("item_name")?,
            })
        })
        .collect()
}
