//! Shared fixtures for unit tests.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::custody::CustodyService;
use crate::db::create_pool;
use crate::model::{Asset, AssetCategory, EdgeNode, Kit, Worker, WorkerRole};
use crate::repository::{
    NewAsset, NewCategory, NewEdgeNode, NewKit, NewWorker, ToolroomRepository,
};
use crate::rules::{RulesConfig, RulesEngine};

/// Monday 08:00 UTC, the start of every test timeline.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap()
}

/// In-memory store with one hand-tool category and a manual clock at
/// [`fixed_now`]. Codes scan as `QR-<code>`.
pub(crate) struct Fixture {
    pub repo: ToolroomRepository,
    pub clock: Arc<ManualClock>,
    pub category: AssetCategory,
}

impl Fixture {
    pub async fn new() -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        let repo = ToolroomRepository::new(pool);
        let clock = Arc::new(ManualClock::new(fixed_now()));
        let category = repo
            .register_category(
                NewCategory {
                    code: "HT".into(),
                    name: "Hand Tools".into(),
                    requires_calibration: false,
                    default_checkout_hours: 8,
                    calibration_interval_days: None,
                },
                fixed_now(),
            )
            .await
            .unwrap();
        Self {
            repo,
            clock,
            category,
        }
    }

    pub fn service(&self) -> CustodyService {
        CustodyService::new(
            self.repo.clone(),
            Arc::new(self.repo.clone()),
            self.clock.clone(),
            "EDGE-001",
        )
    }

    pub fn engine(&self) -> RulesEngine {
        RulesEngine::new(self.repo.clone(), self.clock.clone(), RulesConfig::default())
    }

    pub async fn worker(&self, employee_id: &str, role: WorkerRole) -> Worker {
        self.repo
            .register_worker(
                NewWorker {
                    employee_id: employee_id.into(),
                    scan_code: format!("QR-{employee_id}"),
                    full_name: format!("Worker {employee_id}"),
                    role,
                    department: None,
                },
                fixed_now(),
            )
            .await
            .unwrap()
    }

    /// Asset named `Torque Wrench <code>`.
    pub async fn asset(&self, code: &str, calibration_due_at: Option<DateTime<Utc>>) -> Asset {
        self.repo
            .register_asset(
                NewAsset {
                    asset_code: code.into(),
                    scan_code: format!("QR-{code}"),
                    name: format!("Torque Wrench {code}"),
                    category_id: self.category.id,
                    kit_id: None,
                    serial_number: None,
                    max_checkout_hours: None,
                    calibration_due_at,
                },
                fixed_now(),
            )
            .await
            .unwrap()
    }

    pub async fn kit(&self, code: &str) -> Kit {
        self.repo
            .register_kit(
                NewKit {
                    kit_code: code.into(),
                    scan_code: format!("QR-{code}"),
                    name: format!("Service Kit {code}"),
                    category_id: self.category.id,
                    expected_count: 4,
                },
                fixed_now(),
            )
            .await
            .unwrap()
    }

    pub async fn edge_node(&self, node_id: &str) -> EdgeNode {
        self.repo
            .register_edge_node(
                NewEdgeNode {
                    node_id: node_id.into(),
                    location: Some("Tool crib".into()),
                },
                fixed_now(),
            )
            .await
            .unwrap()
    }
}
