use std::sync::Arc;

use async_trait::async_trait;
use moka::future::Cache;
use play4me_client::spotify::{SpotifyClient, refresh_access_token};
use time::{Duration, OffsetDateTime};

use crate::{
    Error, Result,
    client::{SearchCache, SpotifyProvider, search_cache},
    database::{Account, Database},
    provider::MusicProvider,
};

/// Resolves a provider handle authorised as the given owner.
#[async_trait]
pub trait ProviderConnector: Send + Sync {
    async fn connect(&self, owner_id: &str) -> Result<Arc<dyn MusicProvider>>;
}

/// Tokens are refreshed when they expire within this window.
const REFRESH_MARGIN: Duration = Duration::seconds(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: OffsetDateTime,
}

impl CachedToken {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at - REFRESH_MARGIN > now
    }
}

pub struct SpotifyConnector {
    database: Arc<Database>,
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    tokens: Cache<String, CachedToken>,
    search_cache: SearchCache,
}

impl SpotifyConnector {
    pub fn new(
        database: Arc<Database>,
        http: reqwest::Client,
        client_id: String,
        client_secret: String,
    ) -> Self {
        let tokens = moka::future::CacheBuilder::new(1000)
            .time_to_live(std::time::Duration::from_secs(60 * 60))
            .build();

        Self {
            database,
            http,
            client_id,
            client_secret,
            tokens,
            search_cache: search_cache(),
        }
    }

    async fn access_token(&self, owner_id: &str) -> Result<String> {
        let now = OffsetDateTime::now_utc();

        if let Some(cached) = self.tokens.get(owner_id).await
            && cached.is_fresh(now)
        {
            return Ok(cached.access_token);
        }

        let account = self
            .database
            .get_account(owner_id)
            .await?
            .ok_or_else(|| Error::AccountMissing {
                owner_id: owner_id.to_string(),
            })?;

        if let Some(token) = stored_token(&account)
            && token.is_fresh(now)
        {
            self.tokens.insert(owner_id.to_string(), token.clone()).await;
            return Ok(token.access_token);
        }

        tracing::debug!("Refreshing access token for {owner_id}");
        let response = refresh_access_token(
            &self.http,
            &self.client_id,
            &self.client_secret,
            &account.refresh_token,
        )
        .await?;

        let token = CachedToken {
            access_token: response.access_token,
            expires_at: now + Duration::seconds(response.expires_in),
        };

        self.database
            .store_access_token(
                owner_id,
                &token.access_token,
                token.expires_at,
                response.refresh_token.as_deref(),
            )
            .await?;
        self.tokens.insert(owner_id.to_string(), token.clone()).await;

        Ok(token.access_token)
    }
}

fn stored_token(account: &Account) -> Option<CachedToken> {
    Some(CachedToken {
        access_token: account.access_token.clone()?,
        expires_at: account.expires_at?,
    })
}

#[async_trait]
impl ProviderConnector for SpotifyConnector {
    async fn connect(&self, owner_id: &str) -> Result<Arc<dyn MusicProvider>> {
        let access_token = self.access_token(owner_id).await?;
        let client = SpotifyClient::new(self.http.clone(), access_token);

        Ok(Arc::new(SpotifyProvider::new(
            client,
            self.search_cache.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewAccount;
    use sqlx::{Pool, Sqlite};

    #[test]
    fn tokens_close_to_expiry_are_stale() {
        let now = OffsetDateTime::now_utc();
        let token = |seconds| CachedToken {
            access_token: "token".into(),
            expires_at: now + Duration::seconds(seconds),
        };

        assert!(token(3600).is_fresh(now));
        assert!(!token(30).is_fresh(now));
        assert!(!token(-10).is_fresh(now));
    }

    #[sqlx::test]
    async fn stored_tokens_are_used_without_refreshing(pool: Pool<Sqlite>) {
        let database = Arc::new(Database::from_pool(pool).await.unwrap());
        database
            .upsert_account(&NewAccount {
                owner_id: "owner".into(),
                api_token: "api".into(),
                refresh_token: "refresh".into(),
            })
            .await
            .unwrap();
        database
            .store_access_token(
                "owner",
                "stored",
                OffsetDateTime::now_utc() + Duration::hours(1),
                None,
            )
            .await
            .unwrap();

        let connector = SpotifyConnector::new(
            database,
            reqwest::Client::new(),
            "id".into(),
            "secret".into(),
        );

        assert_eq!(connector.access_token("owner").await.unwrap(), "stored");
    }

    #[sqlx::test]
    async fn unknown_owners_cannot_connect(pool: Pool<Sqlite>) {
        let database = Arc::new(Database::from_pool(pool).await.unwrap());
        let connector = SpotifyConnector::new(
            database,
            reqwest::Client::new(),
            "id".into(),
            "secret".into(),
        );

        assert!(matches!(
            connector.connect("nobody").await,
            Err(Error::AccountMissing { .. })
        ));
    }
}
