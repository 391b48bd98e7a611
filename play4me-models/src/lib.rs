use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Track {
    pub id: String,
    pub uri: String,
    pub name: String,
    pub kind: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
}

/// A previously queued or played item, only used to avoid repeats.
#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct HistoryItem {
    pub name: String,
    pub kind: String,
    pub uri: String,
}

impl From<&Track> for HistoryItem {
    fn from(value: &Track) -> Self {
        Self {
            name: value.name.clone(),
            kind: value.kind.clone(),
            uri: value.uri.clone(),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TopArtist {
    pub name: String,
    pub genres: Vec<String>,
}

#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    pub kind: String,
    pub is_active: bool,
    pub volume_percent: Option<u32>,
}

#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CurrentlyPlaying {
    pub is_playing: bool,
    pub item: Option<Track>,
}

/// A playlist created on the provider side.
#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct ProviderPlaylist {
    pub id: String,
    pub uri: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaylistSettings {
    pub use_preferences: bool,
    pub dont_repeat_from_history: bool,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            use_preferences: true,
            dont_repeat_from_history: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Playlist {
    pub id: Uuid,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub settings: PlaylistSettings,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaylistSummary {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub active: bool,
}

/// Binding between an owner and the provider playlist used as their queue.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaylistQueue {
    pub id: Uuid,
    pub owner_id: String,
    pub queue_playlist_id: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct PlaySession {
    pub id: Uuid,
    pub owner_id: String,
    pub playlist_id: Uuid,
    pub device_id: String,
    pub queue_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub stopped_at: Option<OffsetDateTime>,
}

impl PlaySession {
    pub fn is_open(&self) -> bool {
        self.stopped_at.is_none()
    }
}

/// An open session together with everything a refill cycle needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    pub session: PlaySession,
    pub queue: PlaylistQueue,
    pub playlist: Playlist,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SongOption {
    pub title: String,
    pub artist: String,
}

/// One radio position with two alternative songs.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct SongSlot {
    pub a: SongOption,
    pub b: SongOption,
}

impl SongSlot {
    pub fn options(&self) -> [&SongOption; 2] {
        [&self.a, &self.b]
    }
}
