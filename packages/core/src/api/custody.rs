//! Scan endpoints.
//!
//! Routes:
//! - `POST /custody/checkout`
//! - `POST /custody/return`
//! - `POST /custody/override`
//! - `POST /custody/scan`     (checkout or return decided from item state)
//! - `GET  /custody/active`
//! - `GET  /custody/history`

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{custody_error, store_error, ApiError, SharedState};
use crate::custody::{ScanKind, ScanOutcome};
use crate::error::CustodyResult;
use crate::model::CustodyRecord;
use crate::repository::{ActiveCustody, CustodyHistoryEntry};

pub fn create_custody_router(state: SharedState) -> Router {
    Router::new()
        .route("/custody/checkout", post(checkout))
        .route("/custody/return", post(return_item))
        .route("/custody/override", post(override_checkout))
        .route("/custody/scan", post(scan))
        .route("/custody/active", get(active))
        .route("/custody/history", get(history))
        .with_state(state)
}

// ---- Request shapes ----

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(alias = "worker_qr")]
    pub worker_code: String,
    #[serde(alias = "asset_qr")]
    pub item_code: String,
    pub edge_node_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    #[serde(alias = "worker_qr")]
    pub worker_code: String,
    #[serde(alias = "asset_qr")]
    pub item_code: String,
    #[serde(alias = "supervisor_qr")]
    pub supervisor_code: String,
    pub reason: String,
    pub edge_node_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UniversalScanRequest {
    #[serde(alias = "worker_qr")]
    pub worker_code: String,
    #[serde(alias = "asset_qr")]
    pub item_code: String,
    /// Optional explicit CHECKOUT or RETURN.
    pub event_type: Option<ScanKind>,
    pub edge_node_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub asset_id: Option<Uuid>,
    pub worker_id: Option<Uuid>,
    pub limit: Option<i64>,
}

fn counted<T>(state: &SharedState, operation: &str, result: CustodyResult<T>) -> Result<T, ApiError> {
    state.metrics.record_custody(operation, &result);
    result.map_err(custody_error)
}

// ---- Handlers ----

pub async fn checkout(
    State(state): State<SharedState>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<CustodyRecord>, ApiError> {
    let result = state
        .service
        .checkout(
            &body.worker_code,
            &body.item_code,
            body.edge_node_id.as_deref(),
            body.notes.as_deref(),
        )
        .await;
    counted(&state, "checkout", result).map(Json)
}

pub async fn return_item(
    State(state): State<SharedState>,
    Json(body): Json<ScanRequest>,
) -> Result<Json<CustodyRecord>, ApiError> {
    let result = state
        .service
        .return_item(
            &body.worker_code,
            &body.item_code,
            body.edge_node_id.as_deref(),
            body.notes.as_deref(),
        )
        .await;
    counted(&state, "return", result).map(Json)
}

pub async fn override_checkout(
    State(state): State<SharedState>,
    Json(body): Json<OverrideRequest>,
) -> Result<Json<CustodyRecord>, ApiError> {
    let result = state
        .service
        .override_checkout(
            &body.worker_code,
            &body.item_code,
            &body.supervisor_code,
            &body.reason,
            body.edge_node_id.as_deref(),
        )
        .await;
    counted(&state, "override", result).map(Json)
}

pub async fn scan(
    State(state): State<SharedState>,
    Json(body): Json<UniversalScanRequest>,
) -> Result<Json<ScanOutcome>, ApiError> {
    let result = state
        .service
        .resolve_by_scan(
            &body.worker_code,
            &body.item_code,
            body.event_type,
            body.edge_node_id.as_deref(),
            body.notes.as_deref(),
        )
        .await;
    counted(&state, "scan", result).map(Json)
}

/// `GET /custody/active`: open records with elapsed hours.
pub async fn active(
    State(state): State<SharedState>,
) -> Result<Json<Vec<ActiveCustody>>, ApiError> {
    let now = state.clock.now();
    let active = state.repo.active_custody(now).await.map_err(store_error)?;
    Ok(Json(active))
}

/// `GET /custody/history`: newest first, `limit` defaults to 50.
pub async fn history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<CustodyHistoryEntry>>, ApiError> {
    let history = state
        .repo
        .custody_history(query.asset_id, query.worker_id, query.limit.unwrap_or(50))
        .await
        .map_err(store_error)?;
    Ok(Json(history))
}
