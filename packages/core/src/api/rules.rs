//! On-demand rule passes. The scheduler runs the same passes on a timer.

use axum::{extract::State, routing::post, Json, Router};

use super::{store_error, ApiError, SharedState};
use crate::rules::{CalibrationSummary, OverdueSummary};

pub fn create_rules_router(state: SharedState) -> Router {
    Router::new()
        .route("/rules/run-overdue-check", post(run_overdue_check))
        .route("/rules/run-calibration-check", post(run_calibration_check))
        .with_state(state)
}

pub async fn run_overdue_check(
    State(state): State<SharedState>,
) -> Result<Json<OverdueSummary>, ApiError> {
    let summary = state.engine.run_overdue_check().await.map_err(|err| {
        state
            .metrics
            .rule_check_errors_total
            .with_label_values(&["overdue"])
            .inc();
        store_error(err)
    })?;
    state.metrics.record_overdue_pass(&summary);
    Ok(Json(summary))
}

pub async fn run_calibration_check(
    State(state): State<SharedState>,
) -> Result<Json<CalibrationSummary>, ApiError> {
    let summary = state.engine.run_calibration_check().await.map_err(|err| {
        state
            .metrics
            .rule_check_errors_total
            .with_label_values(&["calibration"])
            .inc();
        store_error(err)
    })?;
    state.metrics.record_calibration_pass(&summary);
    Ok(Json(summary))
}
