use snafu::prelude::*;

pub mod groq;
pub mod spotify;
pub mod spotify_models;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Request to {endpoint} failed: {source}"))]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("{endpoint} responded with {status}: {message}"))]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },
    #[snafu(display("{endpoint} was not found"))]
    NotFound { endpoint: String },
    #[snafu(display("Unable to parse response from {endpoint}: {source}"))]
    Deserialize {
        endpoint: String,
        source: serde_json::Error,
    },
    #[snafu(display("Unable to refresh access token: {message}"))]
    TokenRefresh { message: String },
    #[snafu(display("Completion contained no message"))]
    EmptyCompletion,
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}
