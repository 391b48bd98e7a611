pub mod playback;
pub mod playlists;
pub mod refill;
