//! Periodic rule evaluation.
//!
//! [`RulesEngine`] runs the two passes the scheduler drives: the overdue
//! pass over open custody records and the calibration pass over calibrated
//! assets. Both read time from the injected [`Clock`], process each row in
//! its own transaction and stop at the first store error.

pub mod calibration;
pub mod overdue;

use std::sync::Arc;

use serde::Serialize;

use crate::clock::Clock;
use crate::repository::ToolroomRepository;

pub use calibration::{classify, Classification, RecordCalibration};

/// Thresholds used by both passes.
#[derive(Debug, Clone)]
pub struct RulesConfig {
    /// Overdue alerts at or above this many hours are CRITICAL.
    pub critical_overdue_hours: f64,
    /// Days before the due date inside which a DUE_SOON alert is raised.
    pub due_soon_alert_days: i64,
    /// Days before the due date from which status reads DUE_SOON.
    pub early_warning_days: i64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            critical_overdue_hours: 8.0,
            due_soon_alert_days: 7,
            early_warning_days: 30,
        }
    }
}

/// Result of one overdue pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OverdueSummary {
    /// Open records with a deadline that were examined.
    pub overdue_records_processed: usize,
    /// Records flagged overdue for the first time.
    pub records_flagged: usize,
    pub alerts_created: usize,
}

/// Result of one calibration pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CalibrationSummary {
    pub assets_checked: usize,
    pub statuses_updated: usize,
    pub assets_suspended: usize,
    pub alerts_created: usize,
}

#[derive(Clone)]
pub struct RulesEngine {
    repo: ToolroomRepository,
    clock: Arc<dyn Clock>,
    config: RulesConfig,
}

impl RulesEngine {
    pub fn new(repo: ToolroomRepository, clock: Arc<dyn Clock>, config: RulesConfig) -> Self {
        Self {
            repo,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }
}
