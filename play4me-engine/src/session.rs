use std::{collections::BTreeSet, sync::Arc};

use play4me_models::{Device, PlaySession, Playlist, PlaylistQueue};
use uuid::Uuid;

use crate::{
    EngineConfig, Error, Result,
    connector::ProviderConnector,
    database::Database,
    provider::MusicProvider,
    queue::QueueManager,
    selector::{SelectionContext, SelectionRequest, TrackSelector},
};

/// Starts and stops listening sessions. Starting a session stops any other
/// open session of the same owner.
pub struct SessionManager {
    database: Arc<Database>,
    connector: Arc<dyn ProviderConnector>,
    queues: QueueManager,
    selector: Arc<TrackSelector>,
    config: EngineConfig,
}

impl SessionManager {
    pub fn new(
        database: Arc<Database>,
        connector: Arc<dyn ProviderConnector>,
        selector: Arc<TrackSelector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            queues: QueueManager::new(database.clone()),
            database,
            connector,
            selector,
            config,
        }
    }

    /// Closes the owner's open sessions, fills the queue and starts playback,
    /// then records the new session. The session row is inserted only after
    /// playback has started.
    pub async fn start(
        &self,
        owner_id: &str,
        playlist_id: Uuid,
        device_id: &str,
    ) -> Result<PlaySession> {
        let playlist = self.database.get_playlist(owner_id, playlist_id).await?;
        let provider = self.connector.connect(owner_id).await?;

        let previous: Vec<Uuid> = self
            .database
            .open_sessions_for_owner(owner_id)
            .await?
            .iter()
            .map(|session| session.id)
            .collect();
        if !previous.is_empty() {
            self.database.stop_sessions(&previous).await?;
            tracing::info!("Stopped previous sessions of {owner_id}: {previous:?}");
        }

        let mut queue = self.queues.ensure_queue(provider.as_ref(), owner_id).await?;

        if let Err(error) = self
            .fill_and_play(provider.as_ref(), &playlist, &mut queue, device_id)
            .await
        {
            tracing::error!("Unable to start playlist {} for {owner_id}: {error}", playlist.id);
            return Err(error);
        }

        // Last start wins when two starts of the same owner overlap.
        let (session, stopped) = self
            .database
            .open_session(owner_id, playlist.id, device_id, queue.id)
            .await?;

        if !stopped.is_empty() {
            tracing::info!("Start of {} replaced sessions {stopped:?}", session.id);
        }

        tracing::info!(
            "Started session {} for playlist {} on {device_id}",
            session.id,
            playlist.id
        );
        Ok(session)
    }

    async fn fill_and_play(
        &self,
        provider: &dyn MusicProvider,
        playlist: &Playlist,
        queue: &mut PlaylistQueue,
        device_id: &str,
    ) -> Result<()> {
        let queued = match provider.playlist_items(&queue.queue_playlist_id).await {
            Ok(items) => items,
            Err(error) if error.is_not_found() => vec![],
            Err(error) => return Err(error),
        };

        let context = SelectionContext::gather(provider, playlist, &queued, &self.config).await?;
        let tracks = self
            .selector
            .select_tracks(
                provider,
                SelectionRequest {
                    count: self.config.initial_batch,
                    playlist,
                    history: &context.history,
                    taste: &context.taste,
                },
            )
            .await?;

        if tracks.is_empty() {
            return Err(Error::NoTracksSelected {
                playlist_id: playlist.id.to_string(),
            });
        }

        self.queues.reset_queue(provider, queue, &tracks).await?;
        provider
            .resume_playback(device_id, &provider.playlist_uri(&queue.queue_playlist_id))
            .await
    }

    /// Pauses and closes the owner's open sessions of `playlist_id`. Pause
    /// failures are logged; the sessions are closed regardless. Returns the
    /// ids of the closed sessions, empty when none were open.
    pub async fn stop(&self, owner_id: &str, playlist_id: Uuid) -> Result<Vec<Uuid>> {
        let sessions = self
            .database
            .open_sessions_for_playlist(owner_id, playlist_id)
            .await?;

        if sessions.is_empty() {
            return Ok(vec![]);
        }

        match self.connector.connect(owner_id).await {
            Ok(provider) => {
                let devices: BTreeSet<&str> = sessions
                    .iter()
                    .map(|session| session.device_id.as_str())
                    .collect();

                for device_id in devices {
                    if let Err(error) = provider.pause_playback(device_id).await {
                        tracing::warn!("Unable to pause {device_id}: {error}");
                    }
                }
            }
            Err(error) => tracing::warn!("Unable to reach provider for {owner_id}: {error}"),
        }

        let ids: Vec<Uuid> = sessions.iter().map(|session| session.id).collect();
        self.database.stop_sessions(&ids).await?;

        tracing::info!("Stopped sessions {ids:?} of playlist {playlist_id}");
        Ok(ids)
    }

    pub async fn devices(&self, owner_id: &str) -> Result<Vec<Device>> {
        let provider = self.connector.connect(owner_id).await?;
        provider.devices().await
    }
}
