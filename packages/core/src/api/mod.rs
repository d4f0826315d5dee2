//! HTTP surface.
//!
//! Thin axum handlers over [`CustodyService`], [`RulesEngine`] and
//! [`ToolroomRepository`]. Each submodule exposes a `create_*_router`
//! and [`create_router`] merges them with the operational endpoints.

pub mod alerts;
pub mod calibration;
pub mod custody;
pub mod health;
pub mod items;
pub mod queries;
pub mod registry;
pub mod rules;

use std::sync::Arc;

use axum::{http::StatusCode, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::clock::Clock;
use crate::custody::CustodyService;
use crate::error::{CustodyError, StoreError};
use crate::metrics::{track_http, AppMetrics};
use crate::repository::ToolroomRepository;
use crate::rules::RulesEngine;

/// Everything a handler may need.
pub struct AppState {
    pub service: CustodyService,
    pub engine: RulesEngine,
    pub repo: ToolroomRepository,
    pub clock: Arc<dyn Clock>,
    pub metrics: Arc<AppMetrics>,
}

pub type SharedState = Arc<AppState>;

/// Error half of every handler result.
pub type ApiError = (StatusCode, Json<Value>);

/// Assemble the full router.
pub fn create_router(state: SharedState) -> Router {
    let metrics = state.metrics.clone();
    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(health::metrics).with_state(metrics.clone()))
        .merge(custody::create_custody_router(state.clone()))
        .merge(rules::create_rules_router(state.clone()))
        .merge(alerts::create_alerts_router(state.clone()))
        .merge(calibration::create_calibration_router(state.clone()))
        .merge(items::create_items_router(state.clone()))
        .merge(registry::create_registry_router(state.clone()))
        .merge(queries::create_queries_router(state))
        .layer(middleware::from_fn_with_state(metrics, track_http))
        .layer(CorsLayer::permissive())
}

/// Map a core error to its HTTP status and `{"error": ...}` body.
pub(crate) fn custody_error(err: CustodyError) -> ApiError {
    let status = match &err {
        CustodyError::NotFound(_) => StatusCode::NOT_FOUND,
        CustodyError::Conflict(_) => StatusCode::CONFLICT,
        CustodyError::Forbidden { .. } => StatusCode::FORBIDDEN,
        CustodyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}

pub(crate) fn store_error(err: StoreError) -> ApiError {
    custody_error(CustodyError::Store(err))
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConflictReason, Missing};

    #[test]
    fn errors_map_to_statuses() {
        let (status, body) =
            custody_error(CustodyError::NotFound(Missing::Worker("QR-X".into())));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0["error"], "Worker 'QR-X' not found or inactive");

        let (status, _) = custody_error(CustodyError::Conflict(ConflictReason::NotHeld));
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = custody_error(CustodyError::Forbidden {
            role: "OPERATOR".into(),
        });
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = store_error(StoreError::corrupt("asset", "bad state"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
