use crate::{Error, Result};
use play4me_models::{
    ActiveSession, PlaySession, Playlist, PlaylistQueue, PlaylistSettings, PlaylistSummary,
};
use sqlx::{Pool, Sqlite, SqlitePool, sqlite::SqliteConnectOptions};
use std::path::PathBuf;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

pub struct Database {
    pool: Pool<Sqlite>,
    database_path: PathBuf,
}

impl Database {
    /// Opens the database at `database_url`, falling back to `DATABASE_URL` and
    /// then to the local data directory.
    pub async fn new(database_url: Option<String>) -> Result<Self> {
        let database_url = database_url.or_else(|| std::env::var("DATABASE_URL").ok());

        let database_path = if let Some(url) = database_url {
            PathBuf::from(url.replace("sqlite://", ""))
        } else {
            let Some(mut path) = dirs::data_local_dir() else {
                return Err(Error::DatabaseLocation);
            };
            path.push("play4me");

            if !path.exists() {
                let Ok(_) = std::fs::create_dir_all(&path) else {
                    return Err(Error::DatabaseLocation);
                };
            }

            path.push("data.db");

            path
        };

        let options = SqliteConnectOptions::new()
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .filename(&database_path)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        Database::init(pool, database_path).await
    }

    /// Wraps an already opened pool, running migrations on it.
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        Database::init(pool, PathBuf::from(":memory:")).await
    }

    async fn init(pool: Pool<Sqlite>, database_path: PathBuf) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self {
            pool,
            database_path,
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.database_path
    }

    pub async fn upsert_account(&self, account: &NewAccount) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (owner_id, api_token, refresh_token)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id) DO UPDATE SET
                api_token = excluded.api_token,
                refresh_token = excluded.refresh_token,
                access_token = NULL,
                expires_at = NULL
            "#,
        )
        .bind(&account.owner_id)
        .bind(&account.api_token)
        .bind(&account.refresh_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn owner_for_token(&self, api_token: &str) -> Result<Option<String>> {
        let owner_id = sqlx::query_scalar::<_, String>(
            "SELECT owner_id FROM accounts WHERE api_token = ?1",
        )
        .bind(api_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner_id)
    }

    pub async fn get_account(&self, owner_id: &str) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT owner_id, api_token, access_token, refresh_token, expires_at
            FROM accounts
            WHERE owner_id = ?1
            "#,
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    pub async fn store_access_token(
        &self,
        owner_id: &str,
        access_token: &str,
        expires_at: OffsetDateTime,
        refresh_token: Option<&str>,
    ) -> Result<()> {
        let expires_at = format_timestamp(expires_at)?;

        sqlx::query(
            r#"
            UPDATE accounts
            SET access_token = ?1,
                expires_at = ?2,
                refresh_token = COALESCE(?3, refresh_token)
            WHERE owner_id = ?4
            "#,
        )
        .bind(access_token)
        .bind(expires_at)
        .bind(refresh_token)
        .bind(owner_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_playlist(
        &self,
        owner_id: &str,
        title: &str,
        description: &str,
        settings: PlaylistSettings,
    ) -> Result<Playlist> {
        let row = sqlx::query_as::<_, PlaylistRow>(
            r#"
            INSERT INTO playlists (id, owner_id, title, description, use_preferences, dont_repeat_from_history)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, owner_id, title, description, use_preferences, dont_repeat_from_history
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(owner_id)
        .bind(title)
        .bind(description)
        .bind(settings.use_preferences)
        .bind(settings.dont_repeat_from_history)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    pub async fn update_playlist(
        &self,
        owner_id: &str,
        playlist_id: Uuid,
        title: &str,
        description: &str,
        settings: PlaylistSettings,
    ) -> Result<Playlist> {
        let row = sqlx::query_as::<_, PlaylistRow>(
            r#"
            UPDATE playlists
            SET title = ?1,
                description = ?2,
                use_preferences = ?3,
                dont_repeat_from_history = ?4
            WHERE id = ?5 AND owner_id = ?6
            RETURNING id, owner_id, title, description, use_preferences, dont_repeat_from_history
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(settings.use_preferences)
        .bind(settings.dont_repeat_from_history)
        .bind(playlist_id.to_string())
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Playlist::try_from)
            .transpose()?
            .ok_or_else(|| not_found("Playlist", playlist_id))
    }

    /// Returns false when the owner has no such playlist.
    pub async fn delete_playlist(&self, owner_id: &str, playlist_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playlists WHERE id = ?1 AND owner_id = ?2")
            .bind(playlist_id.to_string())
            .bind(owner_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_playlist(&self, owner_id: &str, playlist_id: Uuid) -> Result<Playlist> {
        let row = sqlx::query_as::<_, PlaylistRow>(
            r#"
            SELECT id, owner_id, title, description, use_preferences, dont_repeat_from_history
            FROM playlists
            WHERE id = ?1 AND owner_id = ?2
            "#,
        )
        .bind(playlist_id.to_string())
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Playlist::try_from)
            .transpose()?
            .ok_or_else(|| not_found("Playlist", playlist_id))
    }

    pub async fn list_playlists(&self, owner_id: &str) -> Result<Vec<PlaylistSummary>> {
        let rows = sqlx::query_as::<_, PlaylistSummaryRow>(
            r#"
            SELECT p.id, p.owner_id, p.title, p.description, p.use_preferences, p.dont_repeat_from_history,
                EXISTS (
                    SELECT 1 FROM play_sessions s
                    WHERE s.playlist_id = p.id AND s.stopped_at IS NULL
                ) AS active
            FROM playlists p
            WHERE p.owner_id = ?1
            ORDER BY p.title
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PlaylistSummary {
                    playlist: row.playlist.try_into()?,
                    active: row.active != 0,
                })
            })
            .collect()
    }

    pub async fn get_queue(&self, owner_id: &str) -> Result<Option<PlaylistQueue>> {
        let row = sqlx::query_as::<_, QueueRow>(
            "SELECT id, owner_id, queue_playlist_id FROM playlist_queues WHERE owner_id = ?1",
        )
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlaylistQueue::try_from).transpose()
    }

    /// Inserts a queue binding unless the owner already has one, and returns
    /// whichever row ends up stored.
    pub async fn insert_queue(
        &self,
        owner_id: &str,
        queue_playlist_id: &str,
    ) -> Result<PlaylistQueue> {
        sqlx::query(
            r#"
            INSERT INTO playlist_queues (id, owner_id, queue_playlist_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(owner_id)
        .bind(queue_playlist_id)
        .execute(&self.pool)
        .await?;

        self.get_queue(owner_id)
            .await?
            .ok_or_else(|| not_found("Queue", owner_id))
    }

    pub async fn set_queue_playlist_id(&self, queue_id: Uuid, queue_playlist_id: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE playlist_queues SET queue_playlist_id = ?1 WHERE id = ?2")
                .bind(queue_playlist_id)
                .bind(queue_id.to_string())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(not_found("Queue", queue_id));
        }

        Ok(())
    }

    /// Stops every open session of the owner and opens a new one in a single
    /// transaction. Returns the new session and the ids of the stopped ones.
    pub async fn open_session(
        &self,
        owner_id: &str,
        playlist_id: Uuid,
        device_id: &str,
        queue_id: Uuid,
    ) -> Result<(PlaySession, Vec<Uuid>)> {
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let mut transaction = self.pool.begin().await?;

        let stopped = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE play_sessions
            SET stopped_at = ?1
            WHERE owner_id = ?2 AND stopped_at IS NULL
            RETURNING id
            "#,
        )
        .bind(&now)
        .bind(owner_id)
        .fetch_all(&mut *transaction)
        .await?;

        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO play_sessions (id, owner_id, playlist_id, device_id, queue_id, started_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING id, owner_id, playlist_id, device_id, queue_id, started_at, stopped_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(owner_id)
        .bind(playlist_id.to_string())
        .bind(device_id)
        .bind(queue_id.to_string())
        .bind(&now)
        .fetch_one(&mut *transaction)
        .await?;

        transaction.commit().await?;

        let stopped = stopped
            .iter()
            .map(|id| parse_uuid("play_sessions.id", id))
            .collect::<Result<Vec<_>>>()?;

        Ok((row.try_into()?, stopped))
    }

    /// Closes the given sessions. Sessions that are already stopped keep their
    /// original `stopped_at`.
    pub async fn stop_sessions(&self, session_ids: &[Uuid]) -> Result<()> {
        let now = format_timestamp(OffsetDateTime::now_utc())?;
        let mut transaction = self.pool.begin().await?;

        for session_id in session_ids {
            sqlx::query(
                "UPDATE play_sessions SET stopped_at = ?1 WHERE id = ?2 AND stopped_at IS NULL",
            )
            .bind(&now)
            .bind(session_id.to_string())
            .execute(&mut *transaction)
            .await?;
        }

        transaction.commit().await?;
        Ok(())
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<PlaySession>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, owner_id, playlist_id, device_id, queue_id, started_at, stopped_at
            FROM play_sessions
            WHERE id = ?1
            "#,
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(PlaySession::try_from).transpose()
    }

    pub async fn open_sessions_for_playlist(
        &self,
        owner_id: &str,
        playlist_id: Uuid,
    ) -> Result<Vec<PlaySession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, owner_id, playlist_id, device_id, queue_id, started_at, stopped_at
            FROM play_sessions
            WHERE owner_id = ?1 AND playlist_id = ?2 AND stopped_at IS NULL
            "#,
        )
        .bind(owner_id)
        .bind(playlist_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PlaySession::try_from).collect()
    }

    pub async fn open_sessions_for_owner(&self, owner_id: &str) -> Result<Vec<PlaySession>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, owner_id, playlist_id, device_id, queue_id, started_at, stopped_at
            FROM play_sessions
            WHERE owner_id = ?1 AND stopped_at IS NULL
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PlaySession::try_from).collect()
    }

    /// Every open session joined with its queue binding and playlist.
    pub async fn active_sessions(&self) -> Result<Vec<ActiveSession>> {
        let rows = sqlx::query_as::<_, ActiveSessionRow>(&format!(
            "{ACTIVE_SESSION_SELECT} WHERE s.stopped_at IS NULL ORDER BY s.started_at"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ActiveSession::try_from).collect()
    }

    pub async fn active_session(&self, session_id: Uuid) -> Result<Option<ActiveSession>> {
        let row = sqlx::query_as::<_, ActiveSessionRow>(&format!(
            "{ACTIVE_SESSION_SELECT} WHERE s.stopped_at IS NULL AND s.id = ?1"
        ))
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ActiveSession::try_from).transpose()
    }
}

const ACTIVE_SESSION_SELECT: &str = r#"
    SELECT s.id AS session_id, s.owner_id, s.playlist_id, s.device_id, s.queue_id,
        s.started_at, s.stopped_at, q.queue_playlist_id,
        p.title, p.description, p.use_preferences, p.dont_repeat_from_history
    FROM play_sessions s
    JOIN playlist_queues q ON q.id = s.queue_id
    JOIN playlists p ON p.id = s.playlist_id
"#;

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner_id: String,
    pub api_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct Account {
    pub owner_id: String,
    pub api_token: String,
    pub access_token: Option<String>,
    pub refresh_token: String,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    owner_id: String,
    api_token: String,
    access_token: Option<String>,
    refresh_token: String,
    expires_at: Option<String>,
}

impl TryFrom<AccountRow> for Account {
    type Error = Error;

    fn try_from(row: AccountRow) -> Result<Self> {
        Ok(Self {
            owner_id: row.owner_id,
            api_token: row.api_token,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PlaylistRow {
    id: String,
    owner_id: String,
    title: String,
    description: String,
    use_preferences: i64,
    dont_repeat_from_history: i64,
}

impl TryFrom<PlaylistRow> for Playlist {
    type Error = Error;

    fn try_from(row: PlaylistRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid("playlists.id", &row.id)?,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            settings: PlaylistSettings {
                use_preferences: row.use_preferences != 0,
                dont_repeat_from_history: row.dont_repeat_from_history != 0,
            },
        })
    }
}

#[derive(sqlx::FromRow)]
struct PlaylistSummaryRow {
    #[sqlx(flatten)]
    playlist: PlaylistRow,
    active: i64,
}

#[derive(sqlx::FromRow)]
struct QueueRow {
    id: String,
    owner_id: String,
    queue_playlist_id: String,
}

impl TryFrom<QueueRow> for PlaylistQueue {
    type Error = Error;

    fn try_from(row: QueueRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid("playlist_queues.id", &row.id)?,
            owner_id: row.owner_id,
            queue_playlist_id: row.queue_playlist_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    owner_id: String,
    playlist_id: String,
    device_id: String,
    queue_id: String,
    started_at: String,
    stopped_at: Option<String>,
}

impl TryFrom<SessionRow> for PlaySession {
    type Error = Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Self {
            id: parse_uuid("play_sessions.id", &row.id)?,
            owner_id: row.owner_id,
            playlist_id: parse_uuid("play_sessions.playlist_id", &row.playlist_id)?,
            device_id: row.device_id,
            queue_id: parse_uuid("play_sessions.queue_id", &row.queue_id)?,
            started_at: parse_timestamp(&row.started_at)?,
            stopped_at: row.stopped_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ActiveSessionRow {
    session_id: String,
    owner_id: String,
    playlist_id: String,
    device_id: String,
    queue_id: String,
    started_at: String,
    stopped_at: Option<String>,
    queue_playlist_id: String,
    title: String,
    description: String,
    use_preferences: i64,
    dont_repeat_from_history: i64,
}

impl TryFrom<ActiveSessionRow> for ActiveSession {
    type Error = Error;

    fn try_from(row: ActiveSessionRow) -> Result<Self> {
        let session = PlaySession::try_from(SessionRow {
            id: row.session_id,
            owner_id: row.owner_id.clone(),
            playlist_id: row.playlist_id.clone(),
            device_id: row.device_id,
            queue_id: row.queue_id,
            started_at: row.started_at,
            stopped_at: row.stopped_at,
        })?;

        let queue = PlaylistQueue {
            id: session.queue_id,
            owner_id: row.owner_id.clone(),
            queue_playlist_id: row.queue_playlist_id,
        };

        let playlist = Playlist::try_from(PlaylistRow {
            id: row.playlist_id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            use_preferences: row.use_preferences,
            dont_repeat_from_history: row.dont_repeat_from_history,
        })?;

        Ok(Self {
            session,
            queue,
            playlist,
        })
    }
}

fn not_found(entity: &str, id: impl ToString) -> Error {
    Error::NotFound {
        entity: entity.to_string(),
        id: id.to_string(),
    }
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| Error::InvalidColumn {
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn format_timestamp(timestamp: OffsetDateTime) -> Result<String> {
    timestamp.format(&Rfc3339).map_err(|e| Error::Timestamp {
        message: e.to_string(),
    })
}

fn parse_timestamp(value: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| Error::Timestamp {
        message: format!("{value}: {e}"),
    })
}
