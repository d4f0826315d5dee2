//! Registration of workers, categories, assets, kits and edge nodes.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::rows::ts;
use crate::error::StoreError;
use crate::model::{
    Asset, AssetCategory, CalibrationStatus, EdgeNode, ItemState, Kit, Worker, WorkerRole,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorker {
    pub employee_id: String,
    pub scan_code: String,
    pub full_name: String,
    #[serde(default)]
    pub role: WorkerRole,
    pub department: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub requires_calibration: bool,
    #[serde(default = "default_checkout_hours")]
    pub default_checkout_hours: i64,
    pub calibration_interval_days: Option<i64>,
}

fn default_checkout_hours() -> i64 {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAsset {
    pub asset_code: String,
    pub scan_code: String,
    pub name: String,
    pub category_id: Uuid,
    pub kit_id: Option<Uuid>,
    pub serial_number: Option<String>,
    /// Falls back to the category default when absent.
    pub max_checkout_hours: Option<i64>,
    pub calibration_due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewKit {
    pub kit_code: String,
    pub scan_code: String,
    pub name: String,
    pub category_id: Uuid,
    #[serde(default = "default_expected_count")]
    pub expected_count: i64,
}

fn default_expected_count() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewEdgeNode {
    pub node_id: String,
    pub location: Option<String>,
}

pub async fn insert_worker(
    conn: &mut SqliteConnection,
    new: NewWorker,
    now: DateTime<Utc>,
) -> Result<Worker, StoreError> {
    let worker = Worker {
        id: Uuid::new_v4(),
        employee_id: new.employee_id,
        scan_code: new.scan_code,
        full_name: new.full_name,
        role: new.role,
        department: new.department,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO workers
         (id, employee_id, scan_code, full_name, role, department, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(worker.id.to_string())
    .bind(&worker.employee_id)
    .bind(&worker.scan_code)
    .bind(&worker.full_name)
    .bind(worker.role.as_str())
    .bind(worker.department.as_deref())
    .bind(ts(now))
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;
    Ok(worker)
}

pub async fn insert_category(
    conn: &mut SqliteConnection,
    new: NewCategory,
    now: DateTime<Utc>,
) -> Result<AssetCategory, StoreError> {
    let category = AssetCategory {
        id: Uuid::new_v4(),
        code: new.code,
        name: new.name,
        requires_calibration: new.requires_calibration,
        default_checkout_hours: new.default_checkout_hours,
        calibration_interval_days: new.calibration_interval_days,
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO asset_categories
         (id, code, name, requires_calibration, default_checkout_hours,
          calibration_interval_days, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(category.id.to_string())
    .bind(&category.code)
    .bind(&category.name)
    .bind(category.requires_calibration as i64)
    .bind(category.default_checkout_hours)
    .bind(category.calibration_interval_days)
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;
    Ok(category)
}

/// Insert an asset in `AVAILABLE`.
///
/// Calibration status starts `UNKNOWN` for calibration-tracked assets and
/// `NOT_REQUIRED` otherwise; the next calibration pass classifies it.
pub async fn insert_asset(
    conn: &mut SqliteConnection,
    new: NewAsset,
    category: &AssetCategory,
    now: DateTime<Utc>,
) -> Result<Asset, StoreError> {
    let tracked = category.requires_calibration || new.calibration_due_at.is_some();
    let asset = Asset {
        id: Uuid::new_v4(),
        asset_code: new.asset_code,
        scan_code: new.scan_code,
        name: new.name,
        category_id: category.id,
        kit_id: new.kit_id,
        serial_number: new.serial_number,
        state: ItemState::Available,
        suspension_cause: None,
        calibration_status: if tracked {
            CalibrationStatus::Unknown
        } else {
            CalibrationStatus::NotRequired
        },
        last_calibrated_at: None,
        calibration_due_at: new.calibration_due_at,
        calibration_certificate: None,
        max_checkout_hours: new
            .max_checkout_hours
            .unwrap_or(category.default_checkout_hours),
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO assets
         (id, asset_code, scan_code, name, category_id, kit_id, serial_number, state,
          calibration_status, calibration_due_at, max_checkout_hours, is_active,
          created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
    )
    .bind(asset.id.to_string())
    .bind(&asset.asset_code)
    .bind(&asset.scan_code)
    .bind(&asset.name)
    .bind(asset.category_id.to_string())
    .bind(asset.kit_id.map(|id| id.to_string()))
    .bind(asset.serial_number.as_deref())
    .bind(asset.state.as_str())
    .bind(asset.calibration_status.as_str())
    .bind(asset.calibration_due_at.map(ts))
    .bind(asset.max_checkout_hours)
    .bind(ts(now))
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;
    Ok(asset)
}

pub async fn insert_kit(
    conn: &mut SqliteConnection,
    new: NewKit,
    now: DateTime<Utc>,
) -> Result<Kit, StoreError> {
    let kit = Kit {
        id: Uuid::new_v4(),
        kit_code: new.kit_code,
        scan_code: new.scan_code,
        name: new.name,
        category_id: new.category_id,
        expected_count: new.expected_count,
        state: ItemState::Available,
        suspension_cause: None,
        created_at: now,
        updated_at: now,
    };
    sqlx::query(
        "INSERT INTO kits
         (id, kit_code, scan_code, name, category_id, expected_count, state, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(kit.id.to_string())
    .bind(&kit.kit_code)
    .bind(&kit.scan_code)
    .bind(&kit.name)
    .bind(kit.category_id.to_string())
    .bind(kit.expected_count)
    .bind(kit.state.as_str())
    .bind(ts(now))
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;
    Ok(kit)
}

pub async fn insert_edge_node(
    conn: &mut SqliteConnection,
    new: NewEdgeNode,
    now: DateTime<Utc>,
) -> Result<EdgeNode, StoreError> {
    let node = EdgeNode {
        id: Uuid::new_v4(),
        node_id: new.node_id,
        location: new.location,
        is_active: true,
        created_at: now,
    };
    sqlx::query(
        "INSERT INTO edge_nodes (id, node_id, location, is_active, created_at)
         VALUES (?, ?, ?, 1, ?)",
    )
    .bind(node.id.to_string())
    .bind(&node.node_id)
    .bind(node.location.as_deref())
    .bind(ts(now))
    .execute(&mut *conn)
    .await?;
    Ok(node)
}
