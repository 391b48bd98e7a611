use std::sync::Arc;

use futures::future::join_all;
use play4me_models::{ActiveSession, Track};
use uuid::Uuid;

use crate::{
    EngineConfig, Result,
    connector::ProviderConnector,
    database::Database,
    provider::MusicProvider,
    queue::QueueManager,
    selector::{SelectionContext, SelectionRequest, TrackSelector},
};

/// What one refill cycle did to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillOutcome {
    /// The listener left the queue; the session was stopped.
    Abandoned,
    Sufficient { remaining: usize },
    Appended { count: usize },
    /// The queue was short but no new tracks could be selected.
    Exhausted,
    QueueRecreated { count: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillSummary {
    pub sessions: usize,
    pub appended: usize,
    pub abandoned: usize,
    pub failed: usize,
}

/// Number of tracks to request so that at least `floor` remain ahead of
/// `position`, or `None` when the queue is long enough.
pub fn plan_refill(total: usize, position: usize, floor: usize) -> Option<usize> {
    let remaining = total.saturating_sub(position);

    if remaining >= floor {
        return None;
    }

    let deficit = floor - remaining;
    Some((deficit * 3).div_ceil(2))
}

pub struct RefillScheduler {
    database: Arc<Database>,
    connector: Arc<dyn ProviderConnector>,
    queues: QueueManager,
    selector: Arc<TrackSelector>,
    config: EngineConfig,
}

impl RefillScheduler {
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

    /// Refills every open session concurrently. A failing session is logged
    /// and does not affect the others.
    pub async fn tick(&self) -> Result<RefillSummary> {
        let sessions = self.database.active_sessions().await?;
        tracing::debug!("Refill tick over {} sessions", sessions.len());

        let outcomes = join_all(sessions.iter().map(|active| async move {
            let result = self.refill_session(active).await;
            if let Err(error) = &result {
                tracing::error!(
                    "Refill of session {} for {} failed: {error}",
                    active.session.id,
                    active.session.owner_id
                );
            }
            result
        }))
        .await;

        let mut summary = RefillSummary {
            sessions: sessions.len(),
            ..Default::default()
        };

        for outcome in outcomes {
            match outcome {
                Ok(RefillOutcome::Appended { count } | RefillOutcome::QueueRecreated { count }) => {
                    summary.appended += count
                }
                Ok(RefillOutcome::Abandoned) => summary.abandoned += 1,
                Ok(_) => {}
                Err(_) => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// Refills one session by id. `None` when it is not open.
    pub async fn refill_by_id(&self, session_id: Uuid) -> Result<Option<RefillOutcome>> {
        match self.database.active_session(session_id).await? {
            Some(active) => self.refill_session(&active).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn refill_session(&self, active: &ActiveSession) -> Result<RefillOutcome> {
        let provider = self.connector.connect(&active.session.owner_id).await?;
        let provider = provider.as_ref();

        let items = match provider
            .playlist_items(&active.queue.queue_playlist_id)
            .await
        {
            Ok(items) => items,
            Err(error) if error.is_not_found() => return self.recreate_queue(provider, active).await,
            Err(error) => return Err(error),
        };

        let playing_uri = provider
            .currently_playing()
            .await?
            .and_then(|playing| playing.item)
            .map(|track| track.uri);

        let Some(position) = playing_uri
            .as_deref()
            .and_then(|uri| items.iter().position(|track| track.uri == uri))
        else {
            tracing::info!(
                "Session {} is no longer playing its queue, stopping it",
                active.session.id
            );
            self.database.stop_sessions(&[active.session.id]).await?;
            return Ok(RefillOutcome::Abandoned);
        };

        let Some(count) = plan_refill(items.len(), position, self.config.queue_floor) else {
            return Ok(RefillOutcome::Sufficient {
                remaining: items.len() - position,
            });
        };

        let tracks = self.select(provider, active, &items, count).await?;

        if tracks.is_empty() {
            tracing::warn!("No tracks selected for session {}", active.session.id);
            return Ok(RefillOutcome::Exhausted);
        }

        self.queues.append(provider, &active.queue, &tracks).await?;
        tracing::info!(
            "Appended {} tracks to session {}",
            tracks.len(),
            active.session.id
        );

        Ok(RefillOutcome::Appended {
            count: tracks.len(),
        })
    }

    async fn recreate_queue(
        &self,
        provider: &dyn MusicProvider,
        active: &ActiveSession,
    ) -> Result<RefillOutcome> {
        tracing::warn!(
            "Queue playlist of session {} is missing, recreating it",
            active.session.id
        );

        let tracks = self
            .select(provider, active, &[], self.config.queue_floor)
            .await?;
        let mut queue = active.queue.clone();
        self.queues.reset_queue(provider, &mut queue, &tracks).await?;

        provider
            .resume_playback(
                &active.session.device_id,
                &provider.playlist_uri(&queue.queue_playlist_id),
            )
            .await?;

        Ok(RefillOutcome::QueueRecreated {
            count: tracks.len(),
        })
    }

    async fn select(
        &self,
        provider: &dyn MusicProvider,
        active: &ActiveSession,
        queued: &[Track],
        count: usize,
    ) -> Result<Vec<Track>> {
        let context =
            SelectionContext::gather(provider, &active.playlist, queued, &self.config).await?;

        self.selector
            .select_tracks(
                provider,
                SelectionRequest {
                    count,
                    playlist: &active.playlist,
                    history: &context.history,
                    taste: &context.taste,
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error,
        testing::{FakeConnector, FakeGenerator, FakeProvider, database, numbered_slots, track},
    };
    use async_trait::async_trait;
    use play4me_models::PlaylistSettings;
    use sqlx::{Pool, Sqlite};

    #[test]
    fn plan_refill_tops_up_by_half_again() {
        assert_eq!(plan_refill(12, 5, 10), Some(5));
        assert_eq!(plan_refill(10, 0, 10), None);
        assert_eq!(plan_refill(20, 9, 10), None);
        assert_eq!(plan_refill(10, 9, 10), Some(14));
        assert_eq!(plan_refill(0, 0, 10), Some(15));
    }

    struct Fixture {
        database: Arc<Database>,
        provider: Arc<FakeProvider>,
        generator: Arc<FakeGenerator>,
        scheduler: RefillScheduler,
        active: ActiveSession,
    }

    /// An open session whose queue holds `queued` tracks named `q-0..`.
    async fn fixture(pool: Pool<Sqlite>, queued: usize) -> Fixture {
        let database = database(pool).await;
        let provider = Arc::new(FakeProvider::default());
        provider.add_numbered_catalog(0..40);
        let generator = Arc::new(FakeGenerator::with_slots(numbered_slots(0..40)));

        let playlist = database
            .create_playlist("owner", "Jazz", "upbeat jazz", PlaylistSettings::default())
            .await
            .unwrap();
        let queue = database.insert_queue("owner", "queue-1").await.unwrap();
        provider.insert_playlist(
            "queue-1",
            (0..queued).map(|n| track(&format!("q-{n}"))).collect(),
        );
        let (session, _) = database
            .open_session("owner", playlist.id, "phone", queue.id)
            .await
            .unwrap();
        let active = database.active_session(session.id).await.unwrap().unwrap();

        let scheduler = RefillScheduler::new(
            database.clone(),
            Arc::new(FakeConnector {
                provider: provider.clone(),
            }),
            Arc::new(TrackSelector::new(generator.clone())),
            EngineConfig::default(),
        );

        Fixture {
            database,
            provider,
            generator,
            scheduler,
            active,
        }
    }

    #[sqlx::test]
    async fn short_queue_gets_appended(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;
        f.provider.play(Some(track("q-5")));

        let outcome = f.scheduler.refill_session(&f.active).await.unwrap();

        assert_eq!(outcome, RefillOutcome::Appended { count: 5 });
        let items = f.provider.items("queue-1").unwrap();
        assert_eq!(items.len(), 17);
        let head: Vec<_> = items.iter().take(12).map(|track| track.id.clone()).collect();
        let expected: Vec<_> = (0..12).map(|n| format!("q-{n}")).collect();
        assert_eq!(head, expected);
        assert!(f.generator.prompts()[0].contains("next **5 scheduled radio slots**"));
    }

    #[sqlx::test]
    async fn long_queue_is_left_alone(pool: Pool<Sqlite>) {
        let f = fixture(pool, 20).await;
        f.provider.play(Some(track("q-3")));

        let outcome = f.scheduler.refill_session(&f.active).await.unwrap();

        assert_eq!(outcome, RefillOutcome::Sufficient { remaining: 17 });
        assert_eq!(f.provider.add_calls(), 0);
        assert!(f.generator.prompts().is_empty());
    }

    #[sqlx::test]
    async fn playing_elsewhere_abandons_the_session(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;
        f.provider.play(Some(track("somewhere-else")));

        let outcome = f.scheduler.refill_session(&f.active).await.unwrap();

        assert_eq!(outcome, RefillOutcome::Abandoned);
        assert_eq!(f.provider.add_calls(), 0);
        let session = f.database.get_session(f.active.session.id).await.unwrap().unwrap();
        assert!(session.stopped_at.is_some());
    }

    #[sqlx::test]
    async fn nothing_playing_abandons_the_session(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;

        let outcome = f.scheduler.refill_session(&f.active).await.unwrap();

        assert_eq!(outcome, RefillOutcome::Abandoned);
        assert_eq!(f.provider.add_calls(), 0);
    }

    #[sqlx::test]
    async fn missing_queue_is_recreated_and_resumed(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;
        f.provider.delete_playlist("queue-1");

        let outcome = f.scheduler.refill_session(&f.active).await.unwrap();

        assert_eq!(outcome, RefillOutcome::QueueRecreated { count: 10 });
        let queue = f.database.get_queue("owner").await.unwrap().unwrap();
        assert_ne!(queue.queue_playlist_id, "queue-1");
        assert_eq!(f.provider.items(&queue.queue_playlist_id).unwrap().len(), 10);
        assert_eq!(
            f.provider.resumed(),
            vec![(
                "phone".to_string(),
                format!("spotify:playlist:{}", queue.queue_playlist_id)
            )]
        );
        assert!(f.database.get_session(f.active.session.id).await.unwrap().unwrap().is_open());
    }

    #[sqlx::test]
    async fn exhausted_selection_is_a_soft_no_op(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;
        let played: Vec<_> = (0..40).map(|n| track(&format!("song-{n}"))).collect();
        f.provider.set_recently_played(played);
        f.provider.play(Some(track("q-11")));

        let outcome = f.scheduler.refill_session(&f.active).await.unwrap();

        assert_eq!(outcome, RefillOutcome::Exhausted);
        assert_eq!(f.provider.add_calls(), 0);
    }

    #[sqlx::test]
    async fn tick_reports_each_session(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;
        f.provider.play(Some(track("q-5")));

        let summary = f.scheduler.tick().await.unwrap();

        assert_eq!(
            summary,
            RefillSummary {
                sessions: 1,
                appended: 5,
                abandoned: 0,
                failed: 0,
            }
        );
        assert_eq!(
            f.scheduler.refill_by_id(Uuid::new_v4()).await.unwrap(),
            None
        );
    }

    /// Connects only `owner_id`; every other owner has no account.
    struct SingleOwnerConnector {
        owner_id: &'static str,
        provider: Arc<FakeProvider>,
    }

    #[async_trait]
    impl ProviderConnector for SingleOwnerConnector {
        async fn connect(&self, owner_id: &str) -> Result<Arc<dyn MusicProvider>> {
            if owner_id == self.owner_id {
                Ok(self.provider.clone())
            } else {
                Err(Error::AccountMissing {
                    owner_id: owner_id.to_string(),
                })
            }
        }
    }

    #[sqlx::test]
    async fn failing_session_does_not_stop_the_tick(pool: Pool<Sqlite>) {
        let f = fixture(pool, 12).await;
        f.provider.play(Some(track("q-5")));

        let other_playlist = f
            .database
            .create_playlist("other", "Rock", "loud rock", PlaylistSettings::default())
            .await
            .unwrap();
        let other_queue = f.database.insert_queue("other", "queue-2").await.unwrap();
        f.database
            .open_session("other", other_playlist.id, "laptop", other_queue.id)
            .await
            .unwrap();

        let scheduler = RefillScheduler::new(
            f.database.clone(),
            Arc::new(SingleOwnerConnector {
                owner_id: "owner",
                provider: f.provider.clone(),
            }),
            Arc::new(TrackSelector::new(f.generator.clone())),
            EngineConfig::default(),
        );

        let summary = scheduler.tick().await.unwrap();

        assert_eq!(
            summary,
            RefillSummary {
                sessions: 2,
                appended: 5,
                abandoned: 0,
                failed: 1,
            }
        );
        assert_eq!(f.provider.items("queue-1").unwrap().len(), 17);
        assert_eq!(f.database.open_sessions_for_owner("other").await.unwrap().len(), 1);
    }
}
