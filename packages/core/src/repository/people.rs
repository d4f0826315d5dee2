//! Workers, edge nodes and asset categories.

use sqlx::sqlite::SqliteRow;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows;
use crate::error::StoreError;
use crate::model::{AssetCategory, EdgeNode, Worker};

const WORKER_COLUMNS: &str =
    "id, employee_id, scan_code, full_name, role, department, is_active, created_at, updated_at";

pub(crate) fn worker_from_row(row: &SqliteRow) -> Result<Worker, StoreError> {
    use sqlx::Row;
    const E: &str = "worker";
    Ok(Worker {
        id: rows::uuid(row, E, "id")?,
        employee_id: row.try_get("employee_id")?,
        scan_code: row.try_get("scan_code")?,
        full_name: row.try_get("full_name")?,
        role: rows::enum_col(row, E, "role")?,
        department: row.try_get("department")?,
        is_active: rows::flag(row, "is_active")?,
        created_at: rows::time(row, E, "created_at")?,
        updated_at: rows::time(row, E, "updated_at")?,
    })
}

pub(crate) fn edge_node_from_row(row: &SqliteRow) -> Result<EdgeNode, StoreError> {
    use sqlx::Row;
    const E: &str = "edge node";
    Ok(EdgeNode {
        id: rows::uuid(row, E, "id")?,
        node_id: row.try_get("node_id")?,
        location: row.try_get("location")?,
        is_active: rows::flag(row, "is_active")?,
        created_at: rows::time(row, E, "created_at")?,
    })
}

pub(crate) fn category_from_row(row: &SqliteRow) -> Result<AssetCategory, StoreError> {
    use sqlx::Row;
    const E: &str = "category";
    Ok(AssetCategory {
        id: rows::uuid(row, E, "id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        requires_calibration: rows::flag(row, "requires_calibration")?,
        default_checkout_hours: row.try_get("default_checkout_hours")?,
        calibration_interval_days: row.try_get("calibration_interval_days")?,
        created_at: rows::time(row, E, "created_at")?,
    })
}

/// Active worker by badge scan code, falling back to employee id.
pub async fn find_active_worker_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<Worker>, StoreError> {
    let sql = format!(
        "SELECT {WORKER_COLUMNS} FROM workers
         WHERE (scan_code = ? OR employee_id = ?) AND is_active = 1
         ORDER BY scan_code = ? DESC
         LIMIT 1"
    );
    let row = sqlx::query(&sql)
        .bind(code)
        .bind(code)
        .bind(code)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(worker_from_row).transpose()
}

pub async fn fetch_worker(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<Worker>, StoreError> {
    let sql = format!("SELECT {WORKER_COLUMNS} FROM workers WHERE id = ?");
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(worker_from_row).transpose()
}

pub async fn find_edge_node(
    conn: &mut SqliteConnection,
    node_id: &str,
) -> Result<Option<EdgeNode>, StoreError> {
    let row = sqlx::query(
        "SELECT id, node_id, location, is_active, created_at FROM edge_nodes WHERE node_id = ?",
    )
    .bind(node_id)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(edge_node_from_row).transpose()
}

pub async fn find_category_by_code(
    conn: &mut SqliteConnection,
    code: &str,
) -> Result<Option<AssetCategory>, StoreError> {
    let row = sqlx::query(
        "SELECT id, code, name, requires_calibration, default_checkout_hours,
                calibration_interval_days, created_at
         FROM asset_categories WHERE code = ?",
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(category_from_row).transpose()
}

pub async fn fetch_category(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<AssetCategory>, StoreError> {
    let row = sqlx::query(
        "SELECT id, code, name, requires_calibration, default_checkout_hours,
                calibration_interval_days, created_at
         FROM asset_categories WHERE id = ?",
    )
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;
    row.as_ref().map(category_from_row).transpose()
}
