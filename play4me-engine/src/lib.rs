use crate::error::Error;

use tokio::sync::broadcast;

pub use play4me_client::Error as ClientError;

pub mod client;
pub mod connector;
pub mod database;
pub mod error;
pub mod jobs;
pub mod provider;
pub mod queue;
pub mod scheduler;
pub mod selector;
pub mod session;

#[cfg(test)]
mod testing;

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type ExitReceiver = broadcast::Receiver<bool>;
pub type ExitSender = broadcast::Sender<bool>;

/// Tunables shared by session start and the refill scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Tracks queued when a session starts.
    pub initial_batch: usize,
    /// Minimum number of tracks that should remain ahead of the listener.
    pub queue_floor: usize,
    pub recently_played_limit: u32,
    pub top_artists_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_batch: 10,
            queue_floor: 10,
            recently_played_limit: 50,
            top_artists_limit: 50,
        }
    }
}
