use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub const REFILL_SECRET_HEADER: &str = "x-refill-secret";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/refill", post(refill))
}

#[derive(Debug, Deserialize)]
struct RefillParameters {
    session_id: Option<Uuid>,
}

/// External trigger for the refill scheduler. The work happens on the job
/// worker; this only queues it.
async fn refill(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<RefillParameters>,
) -> Result<StatusCode, ApiError> {
    let presented = headers
        .get(REFILL_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());

    if !state.refill_allowed(presented) {
        return Err(ApiError::Unauthorized);
    }

    match params.session_id {
        Some(session_id) => state.jobs.refill_session(session_id),
        None => state.jobs.refill_all(),
    }

    Ok(StatusCode::ACCEPTED)
}
