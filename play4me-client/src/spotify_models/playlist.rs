use play4me_models::ProviderPlaylist;
use serde::{Deserialize, Serialize};

use crate::spotify_models::SpotifyTrack;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyPlaylist {
    pub id: String,
    pub uri: String,
    pub name: String,
}

impl From<SpotifyPlaylist> for ProviderPlaylist {
    fn from(value: SpotifyPlaylist) -> Self {
        Self {
            id: value.id,
            uri: value.uri,
            name: value.name,
        }
    }
}

/// Entry of a playlist. The track is null for items that are no longer available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    pub track: Option<SpotifyTrack>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlaylistRequest<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub public: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AddItemsRequest<'a> {
    pub uris: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveItemsRequest<'a> {
    pub tracks: Vec<UriReference<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UriReference<'a> {
    pub uri: &'a str,
}
