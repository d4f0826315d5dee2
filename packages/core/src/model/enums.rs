//! Closed enumerations persisted as text.
//!
//! The string forms are part of the stored data contract and must not
//! change. Every enum round-trips through `as_str` / `FromStr`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Item lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state shared by assets and kits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemState {
    Available,
    InCustody,
    Overdue,
    Suspended,
    OverrideCustody,
    /// Retired from service. Terminal.
    Withdrawn,
}

impl ItemState {
    pub const ALL: [ItemState; 6] = [
        ItemState::Available,
        ItemState::InCustody,
        ItemState::Overdue,
        ItemState::Suspended,
        ItemState::OverrideCustody,
        ItemState::Withdrawn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Available => "AVAILABLE",
            ItemState::InCustody => "IN_CUSTODY",
            ItemState::Overdue => "OVERDUE",
            ItemState::Suspended => "SUSPENDED",
            ItemState::OverrideCustody => "OVERRIDE_CUSTODY",
            ItemState::Withdrawn => "WITHDRAWN",
        }
    }

    /// Currently with a worker.
    pub fn is_held(&self) -> bool {
        match self {
            ItemState::InCustody | ItemState::Overdue | ItemState::OverrideCustody => true,
            ItemState::Available | ItemState::Suspended | ItemState::Withdrawn => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemState::Withdrawn)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(ItemState::Available),
            "IN_CUSTODY" => Ok(ItemState::InCustody),
            "OVERDUE" => Ok(ItemState::Overdue),
            "SUSPENDED" => Ok(ItemState::Suspended),
            "OVERRIDE_CUSTODY" => Ok(ItemState::OverrideCustody),
            "WITHDRAWN" => Ok(ItemState::Withdrawn),
            other => Err(ParseEnumError::new("item state", other)),
        }
    }
}

/// Why an item sits in `SUSPENDED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspensionCause {
    Calibration,
    Manual,
}

impl SuspensionCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuspensionCause::Calibration => "CALIBRATION",
            SuspensionCause::Manual => "MANUAL",
        }
    }
}

impl FromStr for SuspensionCause {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CALIBRATION" => Ok(SuspensionCause::Calibration),
            "MANUAL" => Ok(SuspensionCause::Manual),
            other => Err(ParseEnumError::new("suspension cause", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CalibrationStatus {
    Valid,
    DueSoon,
    Overdue,
    NotRequired,
    Unknown,
}

impl CalibrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalibrationStatus::Valid => "VALID",
            CalibrationStatus::DueSoon => "DUE_SOON",
            CalibrationStatus::Overdue => "OVERDUE",
            CalibrationStatus::NotRequired => "NOT_REQUIRED",
            CalibrationStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CalibrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALID" => Ok(CalibrationStatus::Valid),
            "DUE_SOON" => Ok(CalibrationStatus::DueSoon),
            "OVERDUE" => Ok(CalibrationStatus::Overdue),
            "NOT_REQUIRED" => Ok(CalibrationStatus::NotRequired),
            "UNKNOWN" => Ok(CalibrationStatus::Unknown),
            other => Err(ParseEnumError::new("calibration status", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Custody / audit events
// ---------------------------------------------------------------------------

/// Event type recorded on custody records and audit entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyEventType {
    Checkout,
    Return,
    OverrideCheckout,
    Transfer,
    Suspend,
    Reinstate,
    Withdraw,
    CalibrationDue,
    CalibrationUpdated,
    OverdueFlagged,
    AlertSent,
}

impl CustodyEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustodyEventType::Checkout => "CHECKOUT",
            CustodyEventType::Return => "RETURN",
            CustodyEventType::OverrideCheckout => "OVERRIDE_CHECKOUT",
            CustodyEventType::Transfer => "TRANSFER",
            CustodyEventType::Suspend => "SUSPEND",
            CustodyEventType::Reinstate => "REINSTATE",
            CustodyEventType::Withdraw => "WITHDRAW",
            CustodyEventType::CalibrationDue => "CALIBRATION_DUE",
            CustodyEventType::CalibrationUpdated => "CALIBRATION_UPDATED",
            CustodyEventType::OverdueFlagged => "OVERDUE_FLAGGED",
            CustodyEventType::AlertSent => "ALERT_SENT",
        }
    }
}

impl fmt::Display for CustodyEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustodyEventType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CHECKOUT" => Ok(CustodyEventType::Checkout),
            "RETURN" => Ok(CustodyEventType::Return),
            "OVERRIDE_CHECKOUT" => Ok(CustodyEventType::OverrideCheckout),
            "TRANSFER" => Ok(CustodyEventType::Transfer),
            "SUSPEND" => Ok(CustodyEventType::Suspend),
            "REINSTATE" => Ok(CustodyEventType::Reinstate),
            "WITHDRAW" => Ok(CustodyEventType::Withdraw),
            "CALIBRATION_DUE" => Ok(CustodyEventType::CalibrationDue),
            "CALIBRATION_UPDATED" => Ok(CustodyEventType::CalibrationUpdated),
            "OVERDUE_FLAGGED" => Ok(CustodyEventType::OverdueFlagged),
            "ALERT_SENT" => Ok(CustodyEventType::AlertSent),
            other => Err(ParseEnumError::new("custody event type", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    OverdueReturn,
    CalibrationExpired,
    CalibrationDueSoon,
    UnauthorizedMovement,
    CheckoutAnomaly,
    SystemSyncFailure,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::OverdueReturn => "OVERDUE_RETURN",
            AlertKind::CalibrationExpired => "CALIBRATION_EXPIRED",
            AlertKind::CalibrationDueSoon => "CALIBRATION_DUE_SOON",
            AlertKind::UnauthorizedMovement => "UNAUTHORIZED_MOVEMENT",
            AlertKind::CheckoutAnomaly => "CHECKOUT_ANOMALY",
            AlertKind::SystemSyncFailure => "SYSTEM_SYNC_FAILURE",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OVERDUE_RETURN" => Ok(AlertKind::OverdueReturn),
            "CALIBRATION_EXPIRED" => Ok(AlertKind::CalibrationExpired),
            "CALIBRATION_DUE_SOON" => Ok(AlertKind::CalibrationDueSoon),
            "UNAUTHORIZED_MOVEMENT" => Ok(AlertKind::UnauthorizedMovement),
            "CHECKOUT_ANOMALY" => Ok(AlertKind::CheckoutAnomaly),
            "SYSTEM_SYNC_FAILURE" => Ok(AlertKind::SystemSyncFailure),
            other => Err(ParseEnumError::new("alert kind", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(AlertSeverity::Info),
            "WARNING" => Ok(AlertSeverity::Warning),
            "CRITICAL" => Ok(AlertSeverity::Critical),
            other => Err(ParseEnumError::new("alert severity", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Resolved,
    Suppressed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Suppressed => "SUPPRESSED",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(AlertStatus::Open),
            "ACKNOWLEDGED" => Ok(AlertStatus::Acknowledged),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            "SUPPRESSED" => Ok(AlertStatus::Suppressed),
            other => Err(ParseEnumError::new("alert status", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRole {
    #[default]
    Operator,
    Technician,
    Supervisor,
    Admin,
    ToolroomIncharge,
}

impl WorkerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerRole::Operator => "OPERATOR",
            WorkerRole::Technician => "TECHNICIAN",
            WorkerRole::Supervisor => "SUPERVISOR",
            WorkerRole::Admin => "ADMIN",
            WorkerRole::ToolroomIncharge => "TOOLROOM_INCHARGE",
        }
    }

    /// Roles allowed to authorise an override checkout or a manual
    /// suspend / reinstate / withdraw.
    pub fn can_override(&self) -> bool {
        match self {
            WorkerRole::Supervisor | WorkerRole::Admin | WorkerRole::ToolroomIncharge => true,
            WorkerRole::Operator | WorkerRole::Technician => false,
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPERATOR" => Ok(WorkerRole::Operator),
            "TECHNICIAN" => Ok(WorkerRole::Technician),
            "SUPERVISOR" => Ok(WorkerRole::Supervisor),
            "ADMIN" => Ok(WorkerRole::Admin),
            "TOOLROOM_INCHARGE" => Ok(WorkerRole::ToolroomIncharge),
            other => Err(ParseEnumError::new("worker role", other)),
        }
    }
}
