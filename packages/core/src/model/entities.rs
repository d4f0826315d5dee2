//! Persisted records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::*;
use super::item::ItemRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub employee_id: String,
    /// Code printed on the worker's badge.
    pub scan_code: String,
    pub full_name: String,
    pub role: WorkerRole,
    pub department: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered capture station.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeNode {
    pub id: Uuid,
    pub node_id: String,
    pub location: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCategory {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub requires_calibration: bool,
    pub default_checkout_hours: i64,
    pub calibration_interval_days: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub asset_code: String,
    pub scan_code: String,
    pub name: String,
    pub category_id: Uuid,
    pub kit_id: Option<Uuid>,
    pub serial_number: Option<String>,
    pub state: ItemState,
    pub suspension_cause: Option<SuspensionCause>,
    pub calibration_status: CalibrationStatus,
    pub last_calibrated_at: Option<DateTime<Utc>>,
    pub calibration_due_at: Option<DateTime<Utc>>,
    pub calibration_certificate: Option<String>,
    pub max_checkout_hours: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kit {
    pub id: Uuid,
    pub kit_code: String,
    pub scan_code: String,
    pub name: String,
    pub category_id: Uuid,
    pub expected_count: i64,
    pub state: ItemState,
    pub suspension_cause: Option<SuspensionCause>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One checkout episode. Open while `returned_at` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyRecord {
    pub id: Uuid,
    pub item: ItemRef,
    pub worker_id: Uuid,
    pub edge_node_id: Option<Uuid>,
    pub event_type: CustodyEventType,
    pub checked_out_at: DateTime<Utc>,
    pub expected_return_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub is_overdue: bool,
    pub overdue_flagged_at: Option<DateTime<Utc>>,
    pub overdue_hours: Option<f64>,
    pub is_override: bool,
    pub override_by: Option<Uuid>,
    pub override_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CustodyRecord {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationRecord {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub calibrated_at: DateTime<Utc>,
    pub calibrated_by: Option<String>,
    pub certificate_number: Option<String>,
    pub valid_until: DateTime<Utc>,
    pub result: Option<String>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    /// Dedup subject: asset, kit or custody record id depending on `kind`.
    pub subject_key: String,
    pub asset_id: Option<Uuid>,
    pub kit_id: Option<Uuid>,
    pub custody_record_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub acknowledged_by: Option<Uuid>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub event_type: String,
    pub old_state: Option<serde_json::Value>,
    pub new_state: Option<serde_json::Value>,
    pub changed_by: Option<Uuid>,
    pub edge_node_id: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
