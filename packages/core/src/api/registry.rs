//! Registration endpoints. Each returns `201` with the stored entity.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};

use super::{custody_error, ApiError, SharedState};
use crate::model::{Asset, AssetCategory, EdgeNode, Kit, Worker};
use crate::repository::{NewAsset, NewCategory, NewEdgeNode, NewKit, NewWorker};

pub fn create_registry_router(state: SharedState) -> Router {
    Router::new()
        .route("/workers", post(create_worker))
        .route("/categories", post(create_category))
        .route("/assets", post(create_asset))
        .route("/kits", post(create_kit))
        .route("/edge-nodes", post(create_edge_node))
        .with_state(state)
}

pub async fn create_worker(
    State(state): State<SharedState>,
    Json(body): Json<NewWorker>,
) -> Result<(StatusCode, Json<Worker>), ApiError> {
    let now = state.clock.now();
    let worker = state
        .repo
        .register_worker(body, now)
        .await
        .map_err(custody_error)?;
    Ok((StatusCode::CREATED, Json(worker)))
}

pub async fn create_category(
    State(state): State<SharedState>,
    Json(body): Json<NewCategory>,
) -> Result<(StatusCode, Json<AssetCategory>), ApiError> {
    let now = state.clock.now();
    let category = state
        .repo
        .register_category(body, now)
        .await
        .map_err(custody_error)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn create_asset(
    State(state): State<SharedState>,
    Json(body): Json<NewAsset>,
) -> Result<(StatusCode, Json<Asset>), ApiError> {
    let now = state.clock.now();
    let asset = state
        .repo
        .register_asset(body, now)
        .await
        .map_err(custody_error)?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn create_kit(
    State(state): State<SharedState>,
    Json(body): Json<NewKit>,
) -> Result<(StatusCode, Json<Kit>), ApiError> {
    let now = state.clock.now();
    let kit = state
        .repo
        .register_kit(body, now)
        .await
        .map_err(custody_error)?;
    Ok((StatusCode::CREATED, Json(kit)))
}

pub async fn create_edge_node(
    State(state): State<SharedState>,
    Json(body): Json<NewEdgeNode>,
) -> Result<(StatusCode, Json<EdgeNode>), ApiError> {
    let now = state.clock.now();
    let node = state
        .repo
        .register_edge_node(body, now)
        .await
        .map_err(custody_error)?;
    Ok((StatusCode::CREATED, Json(node)))
}
