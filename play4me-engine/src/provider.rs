use async_trait::async_trait;
use play4me_client::groq::GroqClient;
use play4me_models::{CurrentlyPlaying, Device, ProviderPlaylist, TopArtist, Track};
use serde_json::Value;
use snafu::prelude::*;

use crate::{Error, Result, error::LanguageModelSnafu};

/// Everything the engine needs from a streaming provider, scoped to one user.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    async fn create_playlist(&self, name: &str, description: &str) -> Result<ProviderPlaylist>;
    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()>;
    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<Track>>;
    async fn remove_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()>;
    /// Best match for an exact title and artist, if any.
    async fn search_track(&self, title: &str, artist: &str) -> Result<Option<Track>>;
    /// Plays `context_uri` from its first item on `device_id`.
    async fn resume_playback(&self, device_id: &str, context_uri: &str) -> Result<()>;
    async fn pause_playback(&self, device_id: &str) -> Result<()>;
    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>>;
    async fn recently_played(&self, limit: u32) -> Result<Vec<Track>>;
    async fn top_artists(&self, limit: u32) -> Result<Vec<TopArtist>>;
    async fn devices(&self) -> Result<Vec<Device>>;

    fn playlist_uri(&self, playlist_id: &str) -> String {
        format!("spotify:playlist:{playlist_id}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JsonSchema<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub schema: &'a Value,
}

/// Schema constrained text generation.
#[async_trait]
pub trait SongGenerator: Send + Sync {
    async fn complete_json(&self, prompt: &str, schema: &JsonSchema<'_>) -> Result<Value>;
}

#[async_trait]
impl SongGenerator for GroqClient {
    async fn complete_json(&self, prompt: &str, schema: &JsonSchema<'_>) -> Result<Value> {
        let content = GroqClient::complete_json(
            self,
            prompt,
            schema.name,
            schema.description,
            schema.schema,
        )
        .await
        .context(LanguageModelSnafu)?;

        serde_json::from_str(&content).map_err(|e| Error::Generation {
            message: format!("completion is not valid JSON: {e}"),
        })
    }
}
