//! Read-only views: dashboard counters and the audit trail.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{store_error, ApiError, SharedState};
use crate::model::AuditEntry;
use crate::repository::DashboardSummary;

pub fn create_queries_router(state: SharedState) -> Router {
    Router::new()
        .route("/dashboard/summary", get(dashboard_summary))
        .route("/audit", get(audit_log))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub entity_type: Option<String>,
    pub entity_id: Option<Uuid>,
    pub limit: Option<i64>,
}

pub async fn dashboard_summary(
    State(state): State<SharedState>,
) -> Result<Json<DashboardSummary>, ApiError> {
    let now = state.clock.now();
    let summary = state.repo.dashboard_summary(now).await.map_err(store_error)?;
    Ok(Json(summary))
}

/// `GET /audit`: newest first, `limit` defaults to 100 (max 500).
pub async fn audit_log(
    State(state): State<SharedState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    let entries = state
        .repo
        .audit_entries(
            query.entity_type.as_deref(),
            query.entity_id,
            query.limit.unwrap_or(100),
        )
        .await
        .map_err(store_error)?;
    Ok(Json(entries))
}
