use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use play4me_models::{Playlist, PlaylistSettings, PlaylistSummary};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Owner, error::ApiError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/playlists", get(list).post(create))
        .route("/api/playlists/{id}", put(update).delete(delete))
}

#[derive(Debug, Deserialize)]
struct PlaylistRequest {
    title: String,
    description: String,
    #[serde(default)]
    settings: PlaylistSettings,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
) -> Result<Json<Vec<PlaylistSummary>>, ApiError> {
    Ok(Json(state.database.list_playlists(&owner_id).await?))
}

async fn create(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Json(req): Json<PlaylistRequest>,
) -> Result<(StatusCode, Json<Playlist>), ApiError> {
    let playlist = state
        .database
        .create_playlist(&owner_id, &req.title, &req.description, req.settings)
        .await?;

    tracing::info!("Created playlist {} for {owner_id}", playlist.id);
    Ok((StatusCode::CREATED, Json(playlist)))
}

async fn update(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
    Json(req): Json<PlaylistRequest>,
) -> Result<Json<Playlist>, ApiError> {
    let playlist = state
        .database
        .update_playlist(&owner_id, id, &req.title, &req.description, req.settings)
        .await?;

    Ok(Json(playlist))
}

async fn delete(
    State(state): State<Arc<AppState>>,
    Owner(owner_id): Owner,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !state.database.delete_playlist(&owner_id, id).await? {
        return Err(ApiError::NotFound(format!("Playlist not found: {id}")));
    }

    Ok(StatusCode::NO_CONTENT)
}
