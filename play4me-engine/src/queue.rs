use std::sync::Arc;

use play4me_models::{PlaylistQueue, Track};

use crate::{Result, database::Database, provider::MusicProvider};

pub const QUEUE_PLAYLIST_NAME: &str = "Play4Me";
pub const QUEUE_PLAYLIST_DESCRIPTION: &str = "Play4Me uses this playlist to queue songs.";

/// Owns the provider playlist each owner listens through.
pub struct QueueManager {
    database: Arc<Database>,
}

impl QueueManager {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    /// Returns the owner's queue, creating the provider playlist and the
    /// binding on first use. Safe to call concurrently for the same owner.
    pub async fn ensure_queue(
        &self,
        provider: &dyn MusicProvider,
        owner_id: &str,
    ) -> Result<PlaylistQueue> {
        if let Some(queue) = self.database.get_queue(owner_id).await? {
            return Ok(queue);
        }

        let created = provider
            .create_playlist(QUEUE_PLAYLIST_NAME, QUEUE_PLAYLIST_DESCRIPTION)
            .await?;
        let queue = self.database.insert_queue(owner_id, &created.id).await?;

        if queue.queue_playlist_id != created.id {
            tracing::info!(
                "Queue for {owner_id} was created concurrently, unfollowing {}",
                created.id
            );
            if let Err(error) = provider.unfollow_playlist(&created.id).await {
                tracing::warn!("Unable to unfollow orphan playlist {}: {error}", created.id);
            }
        }

        Ok(queue)
    }

    /// Replaces the queue content with `tracks`. A queue whose provider
    /// playlist has disappeared gets a fresh playlist bound in place.
    pub async fn reset_queue(
        &self,
        provider: &dyn MusicProvider,
        queue: &mut PlaylistQueue,
        tracks: &[Track],
    ) -> Result<()> {
        let uris = track_uris(tracks);

        match self.replace_items(provider, &queue.queue_playlist_id, &uris).await {
            Err(error) if error.is_not_found() => {
                tracing::warn!(
                    "Queue playlist {} for {} is missing, creating a new one",
                    queue.queue_playlist_id,
                    queue.owner_id
                );
                self.replace_playlist(provider, queue).await?;
                provider.add_items(&queue.queue_playlist_id, &uris).await
            }
            result => result,
        }
    }

    /// Adds `tracks` to the end of the queue without touching what is there.
    pub async fn append(
        &self,
        provider: &dyn MusicProvider,
        queue: &PlaylistQueue,
        tracks: &[Track],
    ) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }

        provider
            .add_items(&queue.queue_playlist_id, &track_uris(tracks))
            .await
    }

    async fn replace_items(
        &self,
        provider: &dyn MusicProvider,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<()> {
        let current = provider.playlist_items(playlist_id).await?;

        if !current.is_empty() {
            provider.remove_items(playlist_id, &track_uris(&current)).await?;
        }

        if !uris.is_empty() {
            provider.add_items(playlist_id, uris).await?;
        }

        Ok(())
    }

    async fn replace_playlist(
        &self,
        provider: &dyn MusicProvider,
        queue: &mut PlaylistQueue,
    ) -> Result<()> {
        let created = provider
            .create_playlist(QUEUE_PLAYLIST_NAME, QUEUE_PLAYLIST_DESCRIPTION)
            .await?;

        self.database
            .set_queue_playlist_id(queue.id, &created.id)
            .await?;
        queue.queue_playlist_id = created.id;

        Ok(())
    }
}

fn track_uris(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|track| track.uri.clone()).collect()
}
