use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Database error: {source}"))]
    Database { source: sqlx::Error },
    #[snafu(display("Unable to migrate database: {source}"))]
    Migration { source: sqlx::migrate::MigrateError },
    #[snafu(display("Unable to find a location for the database"))]
    DatabaseLocation,
    #[snafu(display("Provider error: {source}"))]
    Provider { source: play4me_client::Error },
    #[snafu(display("{entity} not found: {id}"))]
    NotFound { entity: String, id: String },
    #[snafu(display("Language model request failed: {source}"))]
    LanguageModel { source: play4me_client::Error },
    #[snafu(display("Unable to generate songs: {message}"))]
    Generation { message: String },
    #[snafu(display("No tracks could be selected for playlist {playlist_id}"))]
    NoTracksSelected { playlist_id: String },
    #[snafu(display("No account registered for {owner_id}"))]
    AccountMissing { owner_id: String },
    #[snafu(display("Invalid stored value in {column}: {value}"))]
    InvalidColumn { column: String, value: String },
    #[snafu(display("Unable to handle timestamp: {message}"))]
    Timestamp { message: String },
    #[snafu(display("{source}"))]
    Io { source: std::io::Error },
}

impl Error {
    /// True when an expected entity, local or provider side, does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound { .. } => true,
            Error::Provider { source } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for Error {
    fn from(source: sqlx::Error) -> Self {
        Error::Database { source }
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(source: sqlx::migrate::MigrateError) -> Self {
        Error::Migration { source }
    }
}

impl From<play4me_client::Error> for Error {
    fn from(source: play4me_client::Error) -> Self {
        Error::Provider { source }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io { source }
    }
}
