use axum::Router;
use snafu::prelude::*;
use std::sync::Arc;

use crate::routes::{playback, playlists, refill};

pub use crate::app_state::AppState;
pub use crate::error::ApiError;

mod app_state;
mod auth;
mod error;
mod routes;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("{port} already in use"))]
    PortInUse { port: u16, source: std::io::Error },
    #[snafu(display("Server stopped: {source}"))]
    Serve { source: std::io::Error },
}

pub async fn init(state: AppState, port: u16) -> Result<(), Error> {
    let interface = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&interface)
        .await
        .context(PortInUseSnafu { port })?;

    tracing::info!("Listening on {interface}");

    let router = create_router(Arc::new(state));

    axum::serve(listener, router).await.context(ServeSnafu)
}

pub fn create_router(shared_state: Arc<AppState>) -> Router {
    axum::Router::new()
        .merge(playlists::routes())
        .merge(playback::routes())
        .layer(axum::middleware::from_fn_with_state(
            shared_state.clone(),
            auth::auth_middleware,
        ))
        .merge(refill::routes())
        .with_state(shared_state)
}
