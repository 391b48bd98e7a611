use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use play4me_models::{
    CurrentlyPlaying, Device, Playlist, PlaylistSettings, ProviderPlaylist, SongOption, SongSlot,
    TopArtist, Track,
};
use serde_json::{Value, json};
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

use crate::{
    Error, Result,
    connector::ProviderConnector,
    database::Database,
    provider::{JsonSchema, MusicProvider, SongGenerator},
};

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        uri: format!("spotify:track:{id}"),
        name: id.to_string(),
        kind: "track".to_string(),
        artists: vec![],
        album: None,
    }
}

pub fn playlist(description: &str) -> Playlist {
    Playlist {
        id: Uuid::new_v4(),
        owner_id: "owner".to_string(),
        title: description.to_string(),
        description: description.to_string(),
        settings: PlaylistSettings::default(),
    }
}

pub fn slot(a: (&str, &str), b: (&str, &str)) -> SongSlot {
    SongSlot {
        a: SongOption {
            title: a.0.to_string(),
            artist: a.1.to_string(),
        },
        b: SongOption {
            title: b.0.to_string(),
            artist: b.1.to_string(),
        },
    }
}

/// Slots whose option `a` is "Song n" by "Artist n" and whose option `b`
/// never resolves.
pub fn numbered_slots(range: std::ops::Range<usize>) -> Vec<SongSlot> {
    range
        .map(|n| {
            slot(
                (&format!("Song {n}"), &format!("Artist {n}")),
                ("Missing", "Nobody"),
            )
        })
        .collect()
}

pub async fn database(pool: Pool<Sqlite>) -> Arc<Database> {
    Arc::new(Database::from_pool(pool).await.unwrap())
}

#[derive(Default)]
struct ProviderState {
    catalog: HashMap<(String, String), Track>,
    failing_searches: Vec<String>,
    playlists: HashMap<String, Vec<Track>>,
    created: Vec<ProviderPlaylist>,
    unfollowed: Vec<String>,
    add_calls: usize,
    remove_calls: usize,
    search_calls: usize,
    resumed: Vec<(String, String)>,
    paused: Vec<String>,
    fail_pause: bool,
    fail_resume: bool,
    currently_playing: Option<CurrentlyPlaying>,
    recently_played: Vec<Track>,
    top_artists: Vec<TopArtist>,
    devices: Vec<Device>,
}

/// In-memory provider. Playlists that were never created or were deleted
/// answer with not found, like the real API.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<ProviderState>,
}

impl FakeProvider {
    pub fn add_catalog(&self, songs: &[(&str, &str, &str)]) {
        let mut state = self.state.lock().unwrap();
        for (title, artist, uri) in songs {
            let id = uri.rsplit(':').next().unwrap_or(uri).to_string();
            state.catalog.insert(
                (title.to_string(), artist.to_string()),
                Track {
                    id,
                    uri: uri.to_string(),
                    name: title.to_string(),
                    kind: "track".to_string(),
                    artists: vec![artist.to_string()],
                    album: None,
                },
            );
        }
    }

    /// Registers "Song n" by "Artist n" as `spotify:track:song-n`.
    pub fn add_numbered_catalog(&self, range: std::ops::Range<usize>) {
        let songs: Vec<_> = range
            .map(|n| (format!("Song {n}"), format!("Artist {n}"), format!("spotify:track:song-{n}")))
            .collect();
        let songs: Vec<_> = songs
            .iter()
            .map(|(title, artist, uri)| (title.as_str(), artist.as_str(), uri.as_str()))
            .collect();
        self.add_catalog(&songs);
    }

    pub fn fail_search_for(&self, title: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_searches
            .push(title.to_string());
    }

    pub fn insert_playlist(&self, playlist_id: &str, tracks: Vec<Track>) {
        self.state
            .lock()
            .unwrap()
            .playlists
            .insert(playlist_id.to_string(), tracks);
    }

    pub fn delete_playlist(&self, playlist_id: &str) {
        self.state.lock().unwrap().playlists.remove(playlist_id);
    }

    pub fn items(&self, playlist_id: &str) -> Option<Vec<Track>> {
        self.state.lock().unwrap().playlists.get(playlist_id).cloned()
    }

    pub fn play(&self, track: Option<Track>) {
        self.state.lock().unwrap().currently_playing = Some(CurrentlyPlaying {
            is_playing: track.is_some(),
            item: track,
        });
    }

    pub fn set_recently_played(&self, tracks: Vec<Track>) {
        self.state.lock().unwrap().recently_played = tracks;
    }

    pub fn set_top_artists(&self, artists: Vec<TopArtist>) {
        self.state.lock().unwrap().top_artists = artists;
    }

    pub fn set_devices(&self, devices: Vec<Device>) {
        self.state.lock().unwrap().devices = devices;
    }

    pub fn fail_pause(&self) {
        self.state.lock().unwrap().fail_pause = true;
    }

    pub fn fail_resume(&self) {
        self.state.lock().unwrap().fail_resume = true;
    }

    pub fn created(&self) -> Vec<ProviderPlaylist> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn unfollowed(&self) -> Vec<String> {
        self.state.lock().unwrap().unfollowed.clone()
    }

    pub fn add_calls(&self) -> usize {
        self.state.lock().unwrap().add_calls
    }

    pub fn remove_calls(&self) -> usize {
        self.state.lock().unwrap().remove_calls
    }

    pub fn search_calls(&self) -> usize {
        self.state.lock().unwrap().search_calls
    }

    pub fn resumed(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().resumed.clone()
    }

    pub fn paused(&self) -> Vec<String> {
        self.state.lock().unwrap().paused.clone()
    }
}

fn missing(playlist_id: &str) -> Error {
    Error::NotFound {
        entity: "Provider playlist".to_string(),
        id: playlist_id.to_string(),
    }
}

fn failure(message: &str) -> Error {
    Error::Generation {
        message: message.to_string(),
    }
}

#[async_trait]
impl MusicProvider for FakeProvider {
    async fn create_playlist(&self, name: &str, _description: &str) -> Result<ProviderPlaylist> {
        let mut state = self.state.lock().unwrap();
        let id = format!("created-{}", state.created.len() + 1);
        let playlist = ProviderPlaylist {
            id: id.clone(),
            uri: format!("spotify:playlist:{id}"),
            name: name.to_string(),
        };
        state.playlists.insert(id, vec![]);
        state.created.push(playlist.clone());
        Ok(playlist)
    }

    async fn unfollow_playlist(&self, playlist_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.playlists.remove(playlist_id);
        state.unfollowed.push(playlist_id.to_string());
        Ok(())
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<Track>> {
        self.state
            .lock()
            .unwrap()
            .playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| missing(playlist_id))
    }

    async fn remove_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.remove_calls += 1;
        let items = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| missing(playlist_id))?;
        items.retain(|track| !uris.contains(&track.uri));
        Ok(())
    }

    async fn add_items(&self, playlist_id: &str, uris: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.add_calls += 1;
        let tracks: Vec<_> = uris
            .iter()
            .map(|uri| {
                state
                    .catalog
                    .values()
                    .find(|track| &track.uri == uri)
                    .cloned()
                    .unwrap_or_else(|| track(uri.rsplit(':').next().unwrap_or(uri)))
            })
            .collect();
        let items = state
            .playlists
            .get_mut(playlist_id)
            .ok_or_else(|| missing(playlist_id))?;
        items.extend(tracks);
        Ok(())
    }

    async fn search_track(&self, title: &str, artist: &str) -> Result<Option<Track>> {
        let mut state = self.state.lock().unwrap();
        state.search_calls += 1;
        if state.failing_searches.iter().any(|failing| failing == title) {
            return Err(failure("search unavailable"));
        }
        Ok(state
            .catalog
            .get(&(title.to_string(), artist.to_string()))
            .cloned())
    }

    async fn resume_playback(&self, device_id: &str, context_uri: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_resume {
            return Err(failure("no active device"));
        }
        state
            .resumed
            .push((device_id.to_string(), context_uri.to_string()));
        Ok(())
    }

    async fn pause_playback(&self, device_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_pause {
            return Err(failure("device offline"));
        }
        state.paused.push(device_id.to_string());
        Ok(())
    }

    async fn currently_playing(&self) -> Result<Option<CurrentlyPlaying>> {
        Ok(self.state.lock().unwrap().currently_playing.clone())
    }

    async fn recently_played(&self, limit: u32) -> Result<Vec<Track>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .recently_played
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn top_artists(&self, limit: u32) -> Result<Vec<TopArtist>> {
        let state = self.state.lock().unwrap();
        Ok(state.top_artists.iter().take(limit as usize).cloned().collect())
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        Ok(self.state.lock().unwrap().devices.clone())
    }
}

/// Replays a fixed completion and records every prompt it receives.
pub struct FakeGenerator {
    response: std::result::Result<Value, String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn with_slots(slots: Vec<SongSlot>) -> Self {
        Self {
            response: Ok(json!({ "slots": slots })),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn with_value(value: Value) -> Self {
        Self {
            response: Ok(value),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            prompts: Mutex::new(vec![]),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SongGenerator for FakeGenerator {
    async fn complete_json(&self, prompt: &str, _schema: &JsonSchema<'_>) -> Result<Value> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.response.clone().map_err(|message| failure(&message))
    }
}

/// Hands out the same provider for every owner.
pub struct FakeConnector {
    pub provider: Arc<FakeProvider>,
}

#[async_trait]
impl ProviderConnector for FakeConnector {
    async fn connect(&self, _owner_id: &str) -> Result<Arc<dyn MusicProvider>> {
        Ok(self.provider.clone())
    }
}
