use play4me_models::{CurrentlyPlaying, Device};
use serde::{Deserialize, Serialize};

use crate::spotify_models::SpotifyTrack;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentlyPlayingResponse {
    #[serde(default)]
    pub is_playing: bool,
    pub currently_playing_type: Option<String>,
    pub item: Option<SpotifyTrack>,
}

impl From<CurrentlyPlayingResponse> for CurrentlyPlaying {
    fn from(value: CurrentlyPlayingResponse) -> Self {
        Self {
            is_playing: value.is_playing,
            item: value.item.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DevicesResponse {
    pub devices: Vec<SpotifyDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyDevice {
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_active: bool,
    pub volume_percent: Option<u32>,
}

impl From<SpotifyDevice> for Device {
    fn from(value: SpotifyDevice) -> Self {
        Self {
            id: value.id,
            name: value.name,
            kind: value.kind,
            is_active: value.is_active,
            volume_percent: value.volume_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartPlaybackRequest<'a> {
    pub context_uri: &'a str,
    pub offset: PlaybackOffset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackOffset {
    pub position: u32,
}
