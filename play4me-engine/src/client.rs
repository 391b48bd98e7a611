use async_trait::async_trait;
use moka::future::Cache;
use play4me_client::spotify::SpotifyClient;
use play4me_models::{CurrentlyPlaying, Device, ProviderPlaylist, TopArtist, Track};

use crate::{Result, provider::MusicProvider};

pub type SearchCache = Cache<String, Option<Track>>;

pub fn search_cache() -> SearchCache {
    moka::future::CacheBuilder::new(10_000)
        .time_to_live(std::time::Duration::from_secs(60 * 60 * 24))
        .build()
}

/// Spotify backed provider. Search results are shared across users through
/// `search_cache` since they do not depend on the account.
#[derive(Debug, Clone)]
pub struct SpotifyProvider {
    client: SpotifyClient,
    search_cache: SearchCache,
}

impl SpotifyProvider {
    pub fn new(client: SpotifyClient, search_cache: SearchCache) -> Self {
        Self {
            client,
            search_cache,
        }
    }
}

fn search_key(title: &str, artist: &str) -> String {
    format!("{}\u{1f}{}", title.to_lowercase(), artist.to_lowercase())
}

#[async_trait]
impl MusicProvider for SpotifyProvider {
    async fn create_playlist(&self, name: &str, description: &str) -> Result<ProviderPlaylist> {
        let user = self.client.current_user().await?;
        let playlist = self
            .client
            .create_playlist(&user.id, name, description)
            .await?;

        Ok(playlist.into())
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        Ok(self.client.unfollow_playlist(playlist_id).await?)
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let tracks = self.client.playlist_items(playlist_id).await?;
        Ok(tracks.into_iter().map(Into::into).collect())
    }

    async fn remove_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        Ok(self.client.remove_playlist_items(playlist_id, uris).await?)
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        Ok(self.client.add_playlist_items(playlist_id, uris).await?)
    }

    async fn search_track(&self, title: &str, artist: &str) -> Result<Option<Track>> {
        let key = search_key(title, artist);
        if let Some(cache) = self.search_cache.get(&key).await {
            return Ok(cache);
        }

        let track = self
            .client
            .search_track(title, artist)
            .await?
            .map(Track::from);

        self.search_cache.insert(key, track.clone()).await;
        Ok(track)
    }

    async fn resume_playback(&self, device_id: &str, context_uri: &str) -> Result<()> {
        Ok(self.client.start_playback(device_id, context_uri).await?)
    }

    async fn pause_playback(&self, device_id: &str) -> Result<()> {
        Ok(self.client.pause_playback(device_id).await?)
    }

    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>> {
        let playing = self.client.currently_playing().await?;
        Ok(playing.map(Into::into))
    }

    async fn recently_played(&self, limit: u32) -> Result<Vec<Track>> {
        let history = self.client.recently_played(limit).await?;
        Ok(history.into_iter().map(|item| item.track.into()).collect())
    }

    async fn top_artists(&self, limit: u32) -> Result<Vec<TopArtist>> {
        let artists = self.client.top_artists(limit).await?;
        Ok(artists.into_iter().map(Into::into).collect())
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        let devices = self.client.devices().await?;
        Ok(devices.into_iter().map(Into::into).collect())
    }
}
