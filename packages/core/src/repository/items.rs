//! Assets and kits.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows::{self, ts};
use crate::error::StoreError;
use crate::model::{
    Asset, CalibrationStatus, CustodialItem, ItemKind, ItemRef, ItemState, Kit, SuspensionCause,
};

const ASSET_COLUMNS: &str = "id, asset_code, scan_code, name, category_id, kit_id, serial_number, \
     state, suspension_cause, calibration_status, last_calibrated_at, calibration_due_at, \
     calibration_certificate, max_checkout_hours, is_active, created_at, updated_at";

const KIT_COLUMNS: &str = "id, kit_code, scan_code, name, category_id, expected_count, state, \
     suspension_cause, created_at, updated_at";

pub(crate) fn asset_from_row(row: &SqliteRow) -> Result<Asset, StoreError> {
    use sqlx::Row;
    const E: &str = "asset";
    Ok(Asset {
        id: rows::uuid(row, E, "id")?,
        asset_code: row.try_get("asset_code")?,
        scan_code: row.try_get("scan_code")?,
        name: row.try_get("name")?,
        category_id: rows::uuid(row, E, "category_id")?,
        kit_id: rows::opt_uuid(row, E, "kit_id")?,
        serial_number: row.try_get("serial_number")?,
        state: rows::enum_col(row, E, "state")?,
        suspension_cause: rows::opt_enum_col(row, E, "suspension_cause")?,
        calibration_status: rows::enum_col(row, E, "calibration_status")?,
        last_calibrated_at: rows::opt_time(row, E, "last_calibrated_at")?,
        calibration_due_at: rows::opt_time(row, E, "calibration_due_at")?,
        calibration_certificate: row.try_get("calibration_certificate")?,
        max_checkout_hours: row.try_get("max_checkout_hours")?,
        is_active: rows::flag(row, "is_active")?,
        created_at: rows::time(row, E, "created_at")?,
        updated_at: rows::time(row, E, "updated_at")?,
    })
}

pub(crate) fn kit_from_row(row: &SqliteRow) -> Result<Kit, StoreError> {
    use sqlx::Row;
    const E: &str = "kit";
    Ok(Kit {
        id: rows::uuid(row, E, "id")?,
        kit_code: row.try_get("kit_code")?,
        scan_code: row.try_get("scan_code")?,
        name: row.try_get("name")?,
        category_id: rows::uuid(row, E, "category_id")?,
        expected_count: row.try_get("expected_count")?,
        state: rows::enum_col(row, E, "state")?,
        suspension_cause: rows::opt_enum_col(row, E, "suspension_cause")?,
        created_at: rows::time(row, E, "created_at")?,
        updated_at: rows::time(row, E, "updated_at")?,
    })
}

pub async fn fetch_asset(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Asset>, StoreError> {
    let sql = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(asset_from_row).transpose()
}

pub async fn fetch_kit(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<Kit>, StoreError> {
    let sql = format!("SELECT {KIT_COLUMNS} FROM kits WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(kit_from_row).transpose()
}

/// Load the current row behind an item reference.
pub async fn fetch_item(
    conn: &mut SqliteConnection,
    item: ItemRef,
) -> Result<Option<CustodialItem>, StoreError> {
    Ok(match item.kind {
        ItemKind::Asset => fetch_asset(conn, item.id).await?.map(CustodialItem::Asset),
        ItemKind::Kit => fetch_kit(conn, item.id).await?.map(CustodialItem::Kit),
    })
}

/// Active asset by scan code, falling back to asset code.
pub async fn find_active_asset_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Asset>, StoreError> {
    let sql = format!(
        "SELECT {ASSET_COLUMNS} FROM assets
         WHERE (scan_code = ? OR asset_code = ?) AND is_active = 1
         ORDER BY scan_code = ? DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(code)
        .bind(code)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(asset_from_row).transpose()
}

/// Kit by scan code, falling back to kit code.
pub async fn find_kit_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Kit>, StoreError> {
    let sql = format!(
        "SELECT {KIT_COLUMNS} FROM kits
         WHERE scan_code = ? OR kit_code = ?
         ORDER BY scan_code = ? DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(code)
        .bind(code)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(kit_from_row).transpose()
}

/// Move an item from `from` to `to`, but only if it is still in `from`.
///
/// Returns `false` when the row's state no longer matches, which callers
/// treat as a concurrent update. `cause` is written alongside the state and
/// should be `Some` only when `to` is `SUSPENDED`.
pub async fn compare_and_set_state(
    conn: &mut SqliteConnection,
    item: ItemRef,
    from: ItemState,
    to: ItemState,
    cause: Option<SuspensionCause>,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {} SET state = ?, suspension_cause = ?, updated_at = ?
         WHERE id = ? AND state = ?",
        item.kind.table()
    );
    let result = sqlx::query(&sql)
        .bind(to.as_str())
        .bind(cause.map(|c| c.as_str()))
        .bind(ts(now))
        .bind(item.id.to_string())
        .bind(from.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Active assets with a calibration due date, in due order.
pub async fn list_calibrated_assets(
    conn: &mut SqliteConnection,
) -> Result<Vec<Asset>, StoreError> {
    let sql = format!(
        "SELECT {ASSET_COLUMNS} FROM assets
         WHERE is_active = 1 AND calibration_due_at IS NOT NULL
         ORDER BY calibration_due_at ASC"
    );
    let rows = sqlx::query(&sql).fetch_all(&mut *conn).await?;
    rows.iter().map(asset_from_row).collect()
}

/// Active assets whose calibration falls due on or before `cutoff`.
pub async fn list_assets_due_before(
    conn: &mut SqliteConnection,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Asset>, StoreError> {
    let sql = format!(
        "SELECT {ASSET_COLUMNS} FROM assets
         WHERE is_active = 1 AND calibration_due_at IS NOT NULL AND calibration_due_at <= ?
         ORDER BY calibration_due_at ASC"
    );
    let rows = sqlx::query(&sql)
        .bind(ts(cutoff))
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(asset_from_row).collect()
}

/// Write a calibration status computed by the evaluator.
pub async fn set_calibration_status(
    conn: &mut SqliteConnection,
    asset_id: Uuid,
    status: CalibrationStatus,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE assets SET calibration_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(ts(now))
        .bind(asset_id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Refresh the cached calibration fields from a newly recorded calibration.
pub async fn update_calibration_cache(
    conn: &mut SqliteConnection,
    asset_id: Uuid,
    calibrated_at: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    certificate: Option<&str>,
    status: CalibrationStatus,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE assets
         SET last_calibrated_at = ?, calibration_due_at = ?, calibration_certificate = ?,
             calibration_status = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(ts(calibrated_at))
    .bind(ts(valid_until))
    .bind(certificate)
    .bind(status.as_str())
    .bind(ts(now))
    .bind(asset_id.to_string())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
