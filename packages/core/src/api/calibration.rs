//! Calibration endpoints.
//!
//! Routes:
//! - `POST /assets/:id/calibration`
//! - `GET  /assets/:id/calibration`
//! - `GET  /calibration/due?days=30`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{custody_error, store_error, ApiError, SharedState};
use crate::model::{Asset, CalibrationRecord};
use crate::rules::RecordCalibration;

pub fn create_calibration_router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/assets/:id/calibration",
            get(calibration_history).post(record_calibration),
        )
        .route("/calibration/due", get(calibration_due))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct DueQuery {
    pub days: Option<i64>,
}

pub async fn record_calibration(
    State(state): State<SharedState>,
    Path(asset_id): Path<Uuid>,
    Json(body): Json<RecordCalibration>,
) -> Result<(StatusCode, Json<CalibrationRecord>), ApiError> {
    let record = state
        .engine
        .record_calibration(asset_id, body)
        .await
        .map_err(custody_error)?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Newest calibration first.
pub async fn calibration_history(
    State(state): State<SharedState>,
    Path(asset_id): Path<Uuid>,
) -> Result<Json<Vec<CalibrationRecord>>, ApiError> {
    let history = state
        .repo
        .calibration_history(asset_id)
        .await
        .map_err(store_error)?;
    Ok(Json(history))
}

/// Assets due within `days` (default 30), including those already overdue.
pub async fn calibration_due(
    State(state): State<SharedState>,
    Query(query): Query<DueQuery>,
) -> Result<Json<Vec<Asset>>, ApiError> {
    let now = state.clock.now();
    let assets = state
        .repo
        .calibration_due_within(now, query.days.unwrap_or(30))
        .await
        .map_err(store_error)?;
    Ok(Json(assets))
}
