//! HTTP endpoint serving the published feed.
//!
//! `GET /rss/reddit/{key}` renders the current snapshot on every request.
//! Any other key gets a 404, so the key works as a shared secret.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::app::Result;
use crate::cache::FeedSource;

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub listen: SocketAddr,
    pub access_key: String,
    pub request_timeout: Duration,
}

#[derive(Clone)]
struct FeedState {
    feed: Arc<dyn FeedSource + Send + Sync>,
    access_key: Arc<str>,
}

async fn get_feed(State(state): State<FeedState>, Path(key): Path<String>) -> Response {
    if key != *state.access_key {
        return StatusCode::NOT_FOUND.into_response();
    }

    let snapshot = state.feed.current_feed();
    match snapshot.write_rss(Vec::new()) {
        Ok(body) => ([(header::CONTENT_TYPE, RSS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to render feed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn build_router(
    feed: Arc<dyn FeedSource + Send + Sync>,
    access_key: &str,
    request_timeout: Duration,
) -> Router {
    let state = FeedState {
        feed,
        access_key: Arc::from(access_key),
    };

    // Layers wrap outwards: the request id is set first and echoed last.
    Router::new()
        .route("/rss/reddit/{key}", get(get_feed))
        .with_state(state)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// Running HTTP server for the feed.
pub struct FeedServer {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl FeedServer {
    /// Binds the listener and starts serving. Binding errors are returned
    /// here rather than from the background task.
    pub async fn start(
        settings: ServerSettings,
        feed: Arc<dyn FeedSource + Send + Sync>,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let listener = TcpListener::bind(settings.listen).await?;
        let local_addr = listener.local_addr()?;
        let router = build_router(feed, &settings.access_key, settings.request_timeout);
        info!("Serving feed on http://{}/rss/reddit/<key>", local_addr);

        let cancel = parent.child_token();
        let shutdown = cancel.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    shutdown.cancelled().await;
                    info!("Feed server shutting down");
                })
                .await;
            if let Err(e) = result {
                error!("Feed server failed: {}", e);
            }
        });

        Ok(Self {
            local_addr,
            cancel,
            task: Mutex::new(Some(handle)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting connections and waits for in-flight requests.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Feed server task failed: {}", e);
            }
        }
    }
}

impl Drop for FeedServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
