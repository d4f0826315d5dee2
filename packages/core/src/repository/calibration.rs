//! Calibration history.

use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows::{self, ts};
use crate::error::StoreError;
use crate::model::CalibrationRecord;

pub(crate) fn calibration_from_row(row: &SqliteRow) -> Result<CalibrationRecord, StoreError> {
    use sqlx::Row;
    const E: &str = "calibration record";
    Ok(CalibrationRecord {
        id: rows::uuid(row, E, "id")?,
        asset_id: rows::uuid(row, E, "asset_id")?,
        calibrated_at: rows::time(row, E, "calibrated_at")?,
        calibrated_by: row.try_get("calibrated_by")?,
        certificate_number: row.try_get("certificate_number")?,
        valid_until: rows::time(row, E, "valid_until")?,
        result: row.try_get("result")?,
        notes: row.try_get("notes")?,
        recorded_by: rows::opt_uuid(row, E, "recorded_by")?,
        created_at: rows::time(row, E, "created_at")?,
    })
}

pub async fn insert_record(
    conn: &mut SqliteConnection,
    record: &CalibrationRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO calibration_records
         (id, asset_id, calibrated_at, calibrated_by, certificate_number, valid_until,
          result, notes, recorded_by, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(record.id.to_string())
    .bind(record.asset_id.to_string())
    .bind(ts(record.calibrated_at))
    .bind(record.calibrated_by.as_deref())
    .bind(record.certificate_number.as_deref())
    .bind(ts(record.valid_until))
    .bind(record.result.as_deref())
    .bind(record.notes.as_deref())
    .bind(record.recorded_by.map(|id| id.to_string()))
    .bind(ts(record.created_at))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// All calibrations of an asset, most recent first.
pub async fn list_for_asset(
    conn: &mut SqliteConnection,
    asset_id: Uuid,
) -> Result<Vec<CalibrationRecord>, StoreError> {
    let rows = sqlx::query(
        "SELECT id, asset_id, calibrated_at, calibrated_by, certificate_number, valid_until,
                result, notes, recorded_by, created_at
         FROM calibration_records
         WHERE asset_id = ?
         ORDER BY calibrated_at DESC",
    )
    .bind(asset_id.to_string())
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(calibration_from_row).collect()
}
