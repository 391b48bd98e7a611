use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use snafu::prelude::*;

use crate::{
    ApiSnafu, DeserializeSnafu, HttpSnafu, NotFoundSnafu, Result, TokenRefreshSnafu,
    spotify_models::{
        AddItemsRequest, Artist, CreatePlaylistRequest, CurrentlyPlayingResponse, DevicesResponse,
        ErrorResponse, Paging, PlayHistoryItem, PlaybackOffset, PlaylistItem, RemoveItemsRequest,
        SearchResponse, SpotifyDevice, SpotifyPlaylist, SpotifyTrack, StartPlaybackRequest,
        TokenResponse, UriReference, UserProfile,
    },
};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";

/// Spotify caps playlist item mutations at 100 uris per request.
const MAX_ITEMS_PER_REQUEST: usize = 100;

/// Thin Spotify Web API client bound to one user's access token.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client, access_token: String) -> Self {
        Self {
            http,
            access_token,
            base_url: API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Response> {
        tracing::debug!("Spotify request: {endpoint}");
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context(HttpSnafu { endpoint })?;

        check_status(endpoint, response).await
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        let endpoint = "me";
        let response = self.send(endpoint, self.http.get(self.url(endpoint))).await?;
        parse_json(endpoint, response).await
    }

    pub async fn create_playlist(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> Result<SpotifyPlaylist> {
        let endpoint = format!("users/{user_id}/playlists");
        let request = self
            .http
            .post(self.url(&endpoint))
            .json(&CreatePlaylistRequest {
                name,
                description,
                public: false,
            });
        let response = self.send(&endpoint, request).await?;
        parse_json(&endpoint, response).await
    }

    pub async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        let endpoint = format!("playlists/{playlist_id}/followers");
        self.send(&endpoint, self.http.delete(self.url(&endpoint)))
            .await?;
        Ok(())
    }

    pub async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<SpotifyTrack>> {
        let endpoint = format!("playlists/{playlist_id}/tracks");
        let mut tracks = Vec::new();
        let mut offset = 0;

        loop {
            let request = self
                .http
                .get(self.url(&endpoint))
                .query(&[("limit", MAX_ITEMS_PER_REQUEST), ("offset", offset)]);
            let response = self.send(&endpoint, request).await?;
            let page: Paging<PlaylistItem> = parse_json(&endpoint, response).await?;

            offset += page.items.len();
            let done = page.next.is_none() || page.items.is_empty();
            tracks.extend(page.items.into_iter().filter_map(|item| item.track));

            if done {
                break;
            }
        }

        Ok(tracks)
    }

    pub async fn remove_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let endpoint = format!("playlists/{playlist_id}/tracks");

        for chunk in uris.chunks(MAX_ITEMS_PER_REQUEST) {
            let body = RemoveItemsRequest {
                tracks: chunk.iter().map(|uri| UriReference { uri }).collect(),
            };
            let request = self.http.delete(self.url(&endpoint)).json(&body);
            self.send(&endpoint, request).await?;
        }

        Ok(())
    }

    pub async fn add_playlist_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let endpoint = format!("playlists/{playlist_id}/tracks");

        for chunk in uris.chunks(MAX_ITEMS_PER_REQUEST) {
            let request = self
                .http
                .post(self.url(&endpoint))
                .json(&AddItemsRequest { uris: chunk });
            self.send(&endpoint, request).await?;
        }

        Ok(())
    }

    pub async fn search_track(&self, title: &str, artist: &str) -> Result<Option<SpotifyTrack>> {
        let endpoint = "search";
        let query = search_query(title, artist);
        let request = self
            .http
            .get(self.url(endpoint))
            .query(&[("q", query.as_str()), ("type", "track"), ("limit", "1")]);
        let response = self.send(endpoint, request).await?;
        let results: SearchResponse = parse_json(endpoint, response).await?;

        Ok(results
            .tracks
            .and_then(|tracks| tracks.items.into_iter().next()))
    }

    pub async fn start_playback(&self, device_id: &str, context_uri: &str) -> Result<()> {
        let endpoint = "me/player/play";
        let request = self
            .http
            .put(self.url(endpoint))
            .query(&[("device_id", device_id)])
            .json(&StartPlaybackRequest {
                context_uri,
                offset: PlaybackOffset { position: 0 },
            });
        self.send(endpoint, request).await?;
        Ok(())
    }

    pub async fn pause_playback(&self, device_id: &str) -> Result<()> {
        let endpoint = "me/player/pause";
        let request = self
            .http
            .put(self.url(endpoint))
            .query(&[("device_id", device_id)])
            .header(reqwest::header::CONTENT_LENGTH, 0);
        self.send(endpoint, request).await?;
        Ok(())
    }

    /// `None` when nothing is playing on any device.
    pub async fn currently_playing(&self) -> Result<Option<CurrentlyPlayingResponse>> {
        let endpoint = "me/player/currently-playing";
        let response = self.send(endpoint, self.http.get(self.url(endpoint))).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await.context(HttpSnafu { endpoint })?;
        if bytes.is_empty() {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .context(DeserializeSnafu { endpoint })
    }

    pub async fn recently_played(&self, limit: u32) -> Result<Vec<PlayHistoryItem>> {
        let endpoint = "me/player/recently-played";
        let request = self
            .http
            .get(self.url(endpoint))
            .query(&[("limit", limit)]);
        let response = self.send(endpoint, request).await?;
        let page: Paging<PlayHistoryItem> = parse_json(endpoint, response).await?;
        Ok(page.items)
    }

    pub async fn top_artists(&self, limit: u32) -> Result<Vec<Artist>> {
        let endpoint = "me/top/artists";
        let limit = limit.to_string();
        let request = self
            .http
            .get(self.url(endpoint))
            .query(&[("time_range", "medium_term"), ("limit", limit.as_str())]);
        let response = self.send(endpoint, request).await?;
        let page: Paging<Artist> = parse_json(endpoint, response).await?;
        Ok(page.items)
    }

    pub async fn devices(&self) -> Result<Vec<SpotifyDevice>> {
        let endpoint = "me/player/devices";
        let response = self.send(endpoint, self.http.get(self.url(endpoint))).await?;
        let devices: DevicesResponse = parse_json(endpoint, response).await?;
        Ok(devices.devices)
    }
}

/// Exchanges a refresh token for a fresh access token.
pub async fn refresh_access_token(
    http: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let endpoint = TOKEN_ENDPOINT;
    let response = http
        .post(endpoint)
        .basic_auth(client_id, Some(client_secret))
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .send()
        .await
        .context(HttpSnafu { endpoint })?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return TokenRefreshSnafu {
            message: format!("{status}: {body}"),
        }
        .fail();
    }

    parse_json(endpoint, response).await
}

pub fn search_query(title: &str, artist: &str) -> String {
    let title = title.replace('"', "");
    let artist = artist.replace('"', "");
    format!("track:\"{title}\" artist:\"{artist}\"")
}

async fn check_status(endpoint: &str, response: Response) -> Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return NotFoundSnafu { endpoint }.fail();
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|error| error.error.message)
        .unwrap_or(body);

    ApiSnafu {
        endpoint,
        status: status.as_u16(),
        message,
    }
    .fail()
}

async fn parse_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
    let bytes = response.bytes().await.context(HttpSnafu { endpoint })?;
    serde_json::from_slice(&bytes).context(DeserializeSnafu { endpoint })
}
