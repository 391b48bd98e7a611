use play4me_models::{TopArtist, Track};
use serde::{Deserialize, Serialize};

use crate::spotify_models::Paging;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: Option<String>,
    pub uri: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub artists: Vec<ArtistSimple>,
    pub album: Option<AlbumSimple>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistSimple {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumSimple {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub tracks: Option<Paging<SpotifyTrack>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayHistoryItem {
    pub track: SpotifyTrack,
    pub played_at: String,
}

impl From<SpotifyTrack> for Track {
    fn from(value: SpotifyTrack) -> Self {
        Self {
            id: value
                .id
                .unwrap_or_else(|| value.uri.rsplit(':').next().unwrap_or_default().to_string()),
            uri: value.uri,
            name: value.name,
            kind: value.kind,
            artists: value.artists.into_iter().map(|artist| artist.name).collect(),
            album: value.album.map(|album| album.name),
        }
    }
}

impl From<Artist> for TopArtist {
    fn from(value: Artist) -> Self {
        Self {
            name: value.name,
            genres: value.genres,
        }
    }
}
