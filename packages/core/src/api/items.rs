//! Supervisor actions on a single item, addressed by scan or item code.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::{custody_error, ApiError, SharedState};
use crate::model::CustodialItem;

pub fn create_items_router(state: SharedState) -> Router {
    Router::new()
        .route("/items/:code/suspend", post(suspend))
        .route("/items/:code/reinstate", post(reinstate))
        .route("/items/:code/withdraw", post(withdraw))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ItemActionRequest {
    #[serde(alias = "supervisor_qr")]
    pub actor_code: String,
    pub reason: Option<String>,
}

pub async fn suspend(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(body): Json<ItemActionRequest>,
) -> Result<Json<CustodialItem>, ApiError> {
    let result = state
        .service
        .suspend(&code, &body.actor_code, body.reason.as_deref())
        .await;
    state.metrics.record_custody("suspend", &result);
    result.map(Json).map_err(custody_error)
}

pub async fn reinstate(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(body): Json<ItemActionRequest>,
) -> Result<Json<CustodialItem>, ApiError> {
    let result = state.service.reinstate(&code, &body.actor_code).await;
    state.metrics.record_custody("reinstate", &result);
    result.map(Json).map_err(custody_error)
}

pub async fn withdraw(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Json(body): Json<ItemActionRequest>,
) -> Result<Json<CustodialItem>, ApiError> {
    let result = state
        .service
        .withdraw(&code, &body.actor_code, body.reason.as_deref())
        .await;
    state.metrics.record_custody("withdraw", &result);
    result.map(Json).map_err(custody_error)
}
