use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::error::{Result, SavedFeedError};
use crate::auth::{PasswordGrant, StaticCredential, TokenExchange, TokenManager};
use crate::cache::{CacheSettings, FeedCache, FeedSource, Synchronizer};
use crate::config::Config;
use crate::domain::FeedSnapshot;
use crate::fetcher::RedditClient;
use crate::server::{FeedServer, ServerSettings};
use crate::store::SqliteStore;

/// Running system: credential refresh, feed cache, the store they share
/// and, when configured, the HTTP endpoint.
pub struct AppContext {
    pub tokens: Arc<TokenManager>,
    pub client: Arc<RedditClient>,
    pub store: Arc<SqliteStore>,
    pub cache: Arc<FeedCache<SqliteStore>>,
    pub server: Option<FeedServer>,
    cancel: CancellationToken,
}

impl AppContext {
    /// Authenticates, runs the first sync and starts both background loops.
    pub async fn start(config: &Config, export_path: Option<PathBuf>) -> Result<Self> {
        config
            .validate_credentials()
            .map_err(|e| SavedFeedError::Config(e.to_string()))?;
        let cancel = CancellationToken::new();

        let store = Arc::new(open_store(config)?);
        let grant = Arc::new(PasswordGrant::new(&config.reddit)?);
        let tokens = Arc::new(TokenManager::start(grant, &cancel).await?);
        let client = Arc::new(RedditClient::new(&config.reddit, tokens.clone())?);

        let listen = config
            .server
            .listen_addr()
            .map_err(|e| SavedFeedError::Config(e.to_string()))?;
        let settings = CacheSettings {
            user: config.reddit.username.clone(),
            site_origin: config.reddit.site_origin.clone(),
            update_interval: config
                .cache
                .interval()
                .map_err(|e| SavedFeedError::Config(e.to_string()))?,
            export_path: export_path.or_else(|| config.cache.export_path.clone()),
        };

        let cache = match FeedCache::start(client.clone(), store.clone(), settings, &cancel).await {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                tokens.stop().await;
                return Err(e);
            }
        };

        let server = match listen {
            Some(listen) => {
                let settings = ServerSettings {
                    listen,
                    access_key: config.server.rss_access_key.clone(),
                    request_timeout: config.server.request_timeout(),
                };
                match FeedServer::start(settings, cache.clone(), &cancel).await {
                    Ok(server) => Some(server),
                    Err(e) => {
                        futures::join!(cache.stop(), tokens.stop());
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        info!("Saved feed for {} is up", config.reddit.username);
        Ok(Self {
            tokens,
            client,
            store,
            cache,
            server,
            cancel,
        })
    }

    pub fn feed(&self) -> Arc<FeedSnapshot> {
        self.cache.current_feed()
    }

    /// Stops the server and both background loops, waits for them, then
    /// closes the store.
    pub async fn shutdown(self) {
        info!("Shutting down");
        self.cancel.cancel();
        let server = async {
            if let Some(ref server) = self.server {
                server.stop().await;
            }
        };
        futures::join!(server, self.cache.stop(), self.tokens.stop());

        let Self {
            store,
            cache,
            server,
            client,
            tokens,
            ..
        } = self;
        drop(server);
        drop(cache);
        drop(client);
        drop(tokens);

        match Arc::try_unwrap(store) {
            Ok(store) => {
                if let Err(e) = store.close() {
                    warn!("Failed to close database: {}", e);
                }
            }
            Err(_) => warn!("Database still in use at shutdown, leaving it to drop"),
        }
    }
}

pub fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = config
        .cache
        .database_path()
        .map_err(|e| SavedFeedError::Config(e.to_string()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!("Opening database {}", path.display());
    SqliteStore::new(&path)
}

/// Authenticates once and builds a synchronizer without any background task.
pub async fn one_shot_synchronizer(
    config: &Config,
    store: Arc<SqliteStore>,
) -> Result<Synchronizer<SqliteStore>> {
    config
        .validate_credentials()
        .map_err(|e| SavedFeedError::Config(e.to_string()))?;
    // A single cycle finishes well within one token lifetime.
    let credential = PasswordGrant::new(&config.reddit)?.exchange().await?;
    let client = RedditClient::new(&config.reddit, Arc::new(StaticCredential::new(credential)))?;
    Ok(Synchronizer::new(
        Arc::new(client),
        store,
        &config.reddit.username,
        &config.reddit.site_origin,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CredentialSource;
    use crate::store::PostStore;

    const SAVED: &str = r#"{"kind": "Listing", "data": {"after": null, "before": null, "dist": 2, "children": [
        {"kind": "t3", "data": {"id": "p1", "title": "Newest", "permalink": "/r/rust/p1/"}},
        {"kind": "t1", "data": {"id": "c1", "link_title": "Older thread", "link_permalink": "https://www.reddit.com/r/rust/t/"}}
    ]}}"#;

    fn config(server_url: &str, db: PathBuf) -> Config {
        let mut config = Config::default();
        config.reddit.username = "alice".into();
        config.reddit.password = "hunter2".into();
        config.reddit.user_agent = "saved-feed-test/0.1".into();
        config.reddit.app_id = "app".into();
        config.reddit.app_secret = "secret".into();
        config.reddit.api_url = server_url.to_string();
        config.reddit.token_url = format!("{}/api/v1/access_token", server_url);
        config.cache.database = Some(db);
        config
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut server = mockito::Server::new_async().await;
        let token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok-1", "expires_in": 3600}"#)
            .create_async()
            .await;
        let saved = server
            .mock("GET", "/user/alice/saved")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(SAVED)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("data").join("posts.db");
        let export = dir.path().join("saved.xml");
        let config = config(&server.url(), db.clone());

        let ctx = AppContext::start(&config, Some(export.clone())).await.unwrap();
        assert_eq!(ctx.tokens.current_token().token, "tok-1");

        let feed = ctx.feed();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed.entries[0].title, "Newest");
        assert_eq!(feed.entries[0].link, "https://reddit.com/r/rust/p1/");
        assert_eq!(feed.entries[1].title, "Older thread");
        assert!(export.exists());

        ctx.shutdown().await;
        token.assert_async().await;
        saved.assert_async().await;

        // Store was closed cleanly and can be reopened with its contents.
        let reopened = SqliteStore::new(&db).unwrap();
        assert_eq!(reopened.count().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_serves_feed_over_http_while_running() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok-1", "expires_in": 3600}"#)
            .create_async()
            .await;
        let _saved = server
            .mock("GET", "/user/alice/saved")
            .with_status(200)
            .with_body(SAVED)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let mut config = config(&server.url(), dir.path().join("posts.db"));
        config.server.listen = Some("127.0.0.1:0".into());
        config.server.rss_access_key = "k3y".into();

        let ctx = AppContext::start(&config, None).await.unwrap();
        let addr = ctx.server.as_ref().unwrap().local_addr();
        let url = format!("http://{}/rss/reddit/k3y", addr);

        let body = reqwest::get(&url).await.unwrap().bytes().await.unwrap();
        let feed = feed_rs::parser::parse(body.as_ref()).unwrap();
        assert_eq!(feed.entries.len(), 2);

        ctx.shutdown().await;
        assert!(reqwest::get(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_start_fails_on_rejected_credentials() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(401)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.url(), dir.path().join("posts.db"));

        assert!(matches!(
            AppContext::start(&config, None).await,
            Err(SavedFeedError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_start_fails_when_first_sync_fails() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok-1", "expires_in": 3600}"#)
            .create_async()
            .await;
        let _saved = server
            .mock("GET", "/user/alice/saved")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.url(), dir.path().join("posts.db"));

        assert!(matches!(
            AppContext::start(&config, None).await,
            Err(SavedFeedError::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_start_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config("http://127.0.0.1:9", dir.path().join("posts.db"));
        config.reddit.app_secret.clear();

        match AppContext::start(&config, None).await {
            Err(SavedFeedError::Config(msg)) => assert!(msg.contains("reddit.app_secret")),
            other => panic!("expected config error, got {:?}", other.err()),
        }
        assert!(matches!(
            one_shot_synchronizer(&config, Arc::new(SqliteStore::in_memory().unwrap())).await,
            Err(SavedFeedError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_one_shot_synchronizer_runs_a_cycle() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/api/v1/access_token")
            .with_status(200)
            .with_body(r#"{"access_token": "tok-1", "expires_in": 3600}"#)
            .create_async()
            .await;
        let _saved = server
            .mock("GET", "/user/alice/saved")
            .with_status(200)
            .with_body(SAVED)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let config = config(&server.url(), dir.path().join("posts.db"));
        let store = Arc::new(open_store(&config).unwrap());

        let sync = one_shot_synchronizer(&config, store.clone()).await.unwrap();
        let (report, snapshot) = sync.run_cycle().await.unwrap();
        assert_eq!(report.new_items, 2);
        assert_eq!(snapshot.len(), 2);

        let (report, _) = sync.run_cycle().await.unwrap();
        assert_eq!(report.new_items, 0);
    }
}
