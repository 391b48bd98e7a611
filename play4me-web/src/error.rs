use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use play4me_engine::error::Error;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound(String),
    Engine(Error),
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::Engine(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Engine(error) if error.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Engine(Error::NoTracksSelected { .. } | Error::Generation { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Engine(Error::Provider { .. } | Error::LanguageModel { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match self {
            ApiError::Unauthorized => "Not authenticated".to_string(),
            ApiError::NotFound(message) => message,
            ApiError::Engine(error) => {
                if status.is_server_error() {
                    tracing::error!("Request failed: {error}");
                }
                error.to_string()
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
