//! SQLite entity store.
//!
//! The submodules hold free functions that take a `&mut SqliteConnection`,
//! so the same query runs against a pooled connection or inside an open
//! transaction. [`ToolroomRepository`] wraps the pool and exposes the
//! single-statement reads and registrations used by the HTTP layer.
//!
//! The pool has one connection. Code holding a transaction must route every
//! query through that transaction or it will wait on itself.

pub mod alerts;
pub mod audit;
pub mod calibration;
pub mod custody;
pub mod dashboard;
pub mod items;
pub mod people;
pub mod registry;
pub(crate) mod rows;

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::{CustodyError, CustodyResult, Missing, StoreError};
use crate::model::{
    Alert, AlertSeverity, AlertStatus, Asset, AssetCategory, AuditEntry, CalibrationRecord,
    EdgeNode, Kit, Worker,
};

pub use alerts::NewAlert;
pub use audit::NewAuditEntry;
pub use custody::{ActiveCustody, CustodyHistoryEntry};
pub use dashboard::DashboardSummary;
pub use registry::{NewAsset, NewCategory, NewEdgeNode, NewKit, NewWorker};

#[derive(Clone)]
pub struct ToolroomRepository {
    pool: SqlitePool,
}

impl ToolroomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    // ---- Registry ----

    pub async fn register_worker(
        &self,
        new: NewWorker,
        now: DateTime<Utc>,
    ) -> CustodyResult<Worker> {
        let what = format!("Worker '{}'", new.employee_id);
        let mut conn = self.pool.acquire().await?;
        registry::insert_worker(&mut conn, new, now)
            .await
            .map_err(|e| CustodyError::from_insert(e, what))
    }

    pub async fn register_category(
        &self,
        new: NewCategory,
        now: DateTime<Utc>,
    ) -> CustodyResult<AssetCategory> {
        let what = format!("Category '{}'", new.code);
        let mut conn = self.pool.acquire().await?;
        registry::insert_category(&mut conn, new, now)
            .await
            .map_err(|e| CustodyError::from_insert(e, what))
    }

    pub async fn register_asset(&self, new: NewAsset, now: DateTime<Utc>) -> CustodyResult<Asset> {
        let what = format!("Asset '{}'", new.asset_code);
        let mut conn = self.pool.acquire().await?;
        let category = people::fetch_category(&mut conn, new.category_id)
            .await?
            .ok_or_else(|| CustodyError::NotFound(Missing::Category(new.category_id.to_string())))?;
        registry::insert_asset(&mut conn, new, &category, now)
            .await
            .map_err(|e| CustodyError::from_insert(e, what))
    }

    pub async fn register_kit(&self, new: NewKit, now: DateTime<Utc>) -> CustodyResult<Kit> {
        let what = format!("Kit '{}'", new.kit_code);
        let mut conn = self.pool.acquire().await?;
        if people::fetch_category(&mut conn, new.category_id).await?.is_none() {
            return Err(CustodyError::NotFound(Missing::Category(
                new.category_id.to_string(),
            )));
        }
        registry::insert_kit(&mut conn, new, now)
            .await
            .map_err(|e| CustodyError::from_insert(e, what))
    }

    pub async fn register_edge_node(
        &self,
        new: NewEdgeNode,
        now: DateTime<Utc>,
    ) -> CustodyResult<EdgeNode> {
        let what = format!("Edge node '{}'", new.node_id);
        let mut conn = self.pool.acquire().await?;
        registry::insert_edge_node(&mut conn, new, now)
            .await
            .map_err(|e| CustodyError::from_insert(e, what))
    }

    // ---- Reads ----

    pub async fn asset(&self, id: Uuid) -> Result<Option<Asset>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        items::fetch_asset(&mut conn, id).await
    }

    pub async fn kit(&self, id: Uuid) -> Result<Option<Kit>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        items::fetch_kit(&mut conn, id).await
    }

    pub async fn alert(&self, id: Uuid) -> Result<Option<Alert>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        alerts::fetch_alert(&mut conn, id).await
    }

    pub async fn active_custody(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActiveCustody>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        custody::list_active(&mut conn, now).await
    }

    pub async fn custody_history(
        &self,
        asset_id: Option<Uuid>,
        worker_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<CustodyHistoryEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        custody::list_history(&mut conn, asset_id, worker_id, limit).await
    }

    pub async fn list_alerts(
        &self,
        status: Option<AlertStatus>,
        severity: Option<AlertSeverity>,
        limit: i64,
    ) -> Result<Vec<Alert>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        alerts::list_alerts(&mut conn, status, severity, limit).await
    }

    pub async fn calibration_history(
        &self,
        asset_id: Uuid,
    ) -> Result<Vec<CalibrationRecord>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        calibration::list_for_asset(&mut conn, asset_id).await
    }

    /// Active assets whose calibration falls due within `days` of `now`,
    /// including those already past due.
    pub async fn calibration_due_within(
        &self,
        now: DateTime<Utc>,
        days: i64,
    ) -> Result<Vec<Asset>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        items::list_assets_due_before(&mut conn, now + Duration::days(days)).await
    }

    pub async fn dashboard_summary(
        &self,
        now: DateTime<Utc>,
    ) -> Result<DashboardSummary, StoreError> {
        let mut conn = self.pool.acquire().await?;
        dashboard::summary(&mut conn, now).await
    }

    pub async fn audit_entries(
        &self,
        entity_type: Option<&str>,
        entity_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        audit::list_entries(&mut conn, entity_type, entity_id, limit).await
    }
}
