//! Alerts.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows::{self, ts};
use crate::error::StoreError;
use crate::model::{Alert, AlertKind, AlertSeverity, AlertStatus};

const ALERT_COLUMNS: &str = "id, alert_type, severity, status, subject_key, asset_id, kit_id, \
     custody_record_id, worker_id, title, message, acknowledged_by, acknowledged_at, \
     resolved_by, resolved_at, resolution_note, created_at, updated_at";

pub(crate) fn alert_from_row(row: &SqliteRow) -> Result<Alert, StoreError> {
    use sqlx::Row;
    const E: &str = "alert";
    Ok(Alert {
        id: rows::uuid(row, E, "id")?,
        kind: rows::enum_col(row, E, "alert_type")?,
        severity: rows::enum_col(row, E, "severity")?,
        status: rows::enum_col(row, E, "status")?,
        subject_key: row.try_get("subject_key")?,
        asset_id: rows::opt_uuid(row, E, "asset_id")?,
        kit_id: rows::opt_uuid(row, E, "kit_id")?,
        custody_record_id: rows::opt_uuid(row, E, "custody_record_id")?,
        worker_id: rows::opt_uuid(row, E, "worker_id")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        acknowledged_by: rows::opt_uuid(row, E, "acknowledged_by")?,
        acknowledged_at: rows::opt_time(row, E, "acknowledged_at")?,
        resolved_by: rows::opt_uuid(row, E, "resolved_by")?,
        resolved_at: rows::opt_time(row, E, "resolved_at")?,
        resolution_note: row.try_get("resolution_note")?,
        created_at: rows::time(row, E, "created_at")?,
        updated_at: rows::time(row, E, "updated_at")?,
    })
}

/// A new OPEN alert.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub subject_key: String,
    pub asset_id: Option<Uuid>,
    pub kit_id: Option<Uuid>,
    pub custody_record_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub title: String,
    pub message: String,
}

pub async fn find_open_alert_id(
    conn: &mut SqliteConnection,
    kind: AlertKind,
    subject_key: &str,
) -> Result<Option<Uuid>, StoreError> {
    use sqlx::Row;
    let row = sqlx::query(
        "SELECT id FROM alerts WHERE alert_type = ? AND subject_key = ? AND status = 'OPEN' LIMIT 1",
    )
    .bind(kind.as_str())
    .bind(subject_key)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(|row| {
        let raw: String = row.try_get("id")?;
        Uuid::parse_str(&raw)
            .map_err(|e| StoreError::corrupt("alert", format!("bad id '{raw}': {e}")))
    })
    .transpose()
}

/// Insert an OPEN alert unless one already exists for its dedup key.
///
/// Returns `true` when a row was written.
pub async fn insert_open_alert(
    conn: &mut SqliteConnection,
    alert: &NewAlert,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let created_at = ts(now);
    let result = sqlx::query(
        "INSERT INTO alerts
         (id, alert_type, severity, status, subject_key, asset_id, kit_id, custody_record_id,
          worker_id, title, message, created_at, updated_at)
         VALUES (?, ?, ?, 'OPEN', ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT DO NOTHING",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(alert.kind.as_str())
    .bind(alert.severity.as_str())
    .bind(&alert.subject_key)
    .bind(alert.asset_id.map(|id| id.to_string()))
    .bind(alert.kit_id.map(|id| id.to_string()))
    .bind(alert.custody_record_id.map(|id| id.to_string()))
    .bind(alert.worker_id.map(|id| id.to_string()))
    .bind(&alert.title)
    .bind(&alert.message)
    .bind(&created_at)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn fetch_alert(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Alert>, StoreError> {
    let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(alert_from_row).transpose()
}

/// OPEN → ACKNOWLEDGED. Returns `false` if the alert was not OPEN.
pub async fn acknowledge(
    conn: &mut SqliteConnection,
    id: Uuid,
    by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let at = ts(now);
    let result = sqlx::query(
        "UPDATE alerts
         SET status = 'ACKNOWLEDGED', acknowledged_by = ?, acknowledged_at = ?, updated_at = ?
         WHERE id = ? AND status = 'OPEN'",
    )
    .bind(by.map(|id| id.to_string()))
    .bind(&at)
    .bind(&at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// OPEN or ACKNOWLEDGED → RESOLVED. Returns `false` if already closed.
pub async fn resolve(
    conn: &mut SqliteConnection,
    id: Uuid,
    by: Option<Uuid>,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let at = ts(now);
    let result = sqlx::query(
        "UPDATE alerts
         SET status = 'RESOLVED', resolved_by = ?, resolved_at = ?, resolution_note = ?, updated_at = ?
         WHERE id = ? AND status IN ('OPEN', 'ACKNOWLEDGED')",
    )
    .bind(by.map(|id| id.to_string()))
    .bind(&at)
    .bind(note)
    .bind(&at)
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Resolve every OPEN alert of the given kinds raised against an asset.
pub async fn resolve_open_for_asset(
    conn: &mut SqliteConnection,
    asset_id: Uuid,
    kinds: &[AlertKind],
    by: Option<Uuid>,
    note: &str,
    now: DateTime<Utc>,
) -> Result<u64, StoreError> {
    if kinds.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; kinds.len()].join(", ");
    let sql = format!(
        "UPDATE alerts
         SET status = 'RESOLVED', resolved_by = ?, resolved_at = ?, resolution_note = ?, updated_at = ?
         WHERE asset_id = ? AND status = 'OPEN' AND alert_type IN ({placeholders})"
    );
    let at = ts(now);
    let mut query = sqlx::query(&sql)
        .bind(by.map(|id| id.to_string()))
        .bind(at.clone())
        .bind(note)
        .bind(at)
        .bind(asset_id.to_string());
    for kind in kinds {
        query = query.bind(kind.as_str());
    }
    let result = query.execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Alerts newest first, optionally filtered. `limit` is clamped to 1..=200.
pub async fn list_alerts(
    conn: &mut SqliteConnection,
    status: Option<AlertStatus>,
    severity: Option<AlertSeverity>,
    limit: i64,
) -> Result<Vec<Alert>, StoreError> {
    let limit = limit.clamp(1, 200);

    let mut conditions = vec!["1=1"];
    if status.is_some() {
        conditions.push("status = ?");
    }
    if severity.is_some() {
        conditions.push("severity = ?");
    }
    let sql = format!(
        "SELECT {ALERT_COLUMNS} FROM alerts WHERE {} ORDER BY created_at DESC LIMIT ?",
        conditions.join(" AND ")
    );

    let mut query = sqlx::query(&sql);
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }
    if let Some(severity) = severity {
        query = query.bind(severity.as_str());
    }
    let rows = query.bind(limit).fetch_all(&mut *conn).await?;
    rows.iter().map(alert_from_row).collect()
}
