use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use play4me_models::{Device, PlaySession};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Owner, error::ApiError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/playlists/{id}/start", post(start))
        .route("/api/playlists/{id}/stop", post(stop))
        .route("/api/devices", get(devices))
}

#[derive(Debug, Deserialize)]
struct StartRequest {
    device_id: String,
}

#[derive(Debug, Serialize)]
struct StopResponse {
    session_ids: Vec<Uuid>,
}

async fn start(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
    Json(req): Json<StartRequest>,
) -> Result<Json<PlaySession>, ApiError> {
    let session = state.sessions.start(&owner_id, id, &req.device_id).await?;
    Ok(Json(session))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<Json<StopResponse>, ApiError> {
    let session_ids = state.sessions.stop(&owner_id, id).await?;

    if session_ids.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No open session for playlist {id}"
        )));
    }

    Ok(Json(StopResponse { session_ids }))
}

async fn devices(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<Device>>, ApiError> {
    Ok(Json(state.sessions.devices(&owner_id).await?))
}
