//! Alert listing and operator handling.
//!
//! Routes:
//! - `GET  /alerts`                   (status defaults to OPEN; `ALL` lifts the filter)
//! - `POST /alerts/:id/acknowledge`
//! - `POST /alerts/:id/resolve`

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{bad_request, custody_error, store_error, ApiError, SharedState};
use crate::alerts::lifecycle;
use crate::model::{Alert, AlertSeverity, AlertStatus};

pub fn create_alerts_router(state: SharedState) -> Router {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/:id/acknowledge", post(acknowledge_alert))
        .route("/alerts/:id/resolve", post(resolve_alert))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    pub status: Option<String>,
    pub severity: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AcknowledgeRequest {
    pub worker_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    pub worker_id: Option<Uuid>,
    pub resolution_note: Option<String>,
}

/// `GET /alerts`: newest first, `limit` defaults to 50 (max 200).
pub async fn list_alerts(
    State(state): State<SharedState>,
    Query(query): Query<AlertListQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let status = match query.status.as_deref() {
        None => Some(AlertStatus::Open),
        Some("ALL") => None,
        Some(raw) => Some(
            raw.parse::<AlertStatus>()
                .map_err(|e| bad_request(e.to_string()))?,
        ),
    };
    let severity = query
        .severity
        .as_deref()
        .map(str::parse::<AlertSeverity>)
        .transpose()
        .map_err(|e| bad_request(e.to_string()))?;

    let alerts = state
        .repo
        .list_alerts(status, severity, query.limit.unwrap_or(50))
        .await
        .map_err(store_error)?;
    Ok(Json(alerts))
}

pub async fn acknowledge_alert(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Option<Json<AcknowledgeRequest>>,
) -> Result<Json<Alert>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let alert = lifecycle::acknowledge(&state.repo, state.clock.as_ref(), id, body.worker_id)
        .await
        .map_err(custody_error)?;
    Ok(Json(alert))
}

pub async fn resolve_alert(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveRequest>>,
) -> Result<Json<Alert>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let alert = lifecycle::resolve(
        &state.repo,
        state.clock.as_ref(),
        id,
        body.worker_id,
        body.resolution_note.as_deref(),
    )
    .await
    .map_err(custody_error)?;
    Ok(Json(alert))
}
