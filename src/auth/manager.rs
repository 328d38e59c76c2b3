//! Background refresh of the bearer credential.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::Result;
use crate::auth::{AccessCredential, CredentialSource, TokenExchange};

/// Delay before retrying after a failed refresh.
pub const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Lower bound on the refresh schedule, so a zero lifetime can't spin.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

struct Shared {
    exchange: Arc<dyn TokenExchange + Send + Sync>,
    current: RwLock<Arc<AccessCredential>>,
}

impl Shared {
    async fn refresh(&self) -> Result<Duration> {
        let credential = self.exchange.exchange().await?;
        let expires_in = credential.expires_in;
        *self.current.write() = Arc::new(credential);
        info!("Access token refreshed, valid for {:?}", expires_in);
        Ok(expires_in)
    }
}

/// Owns the current bearer credential and keeps it fresh.
///
/// The first credential is obtained before [`TokenManager::start`]
/// returns, so readers never see an unset value. Afterwards a background
/// task refreshes at half of each credential's lifetime, which leaves room
/// for one failed attempt before the old value expires.
pub struct TokenManager {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TokenManager {
    /// Fetches the initial credential and launches the refresh loop.
    ///
    /// The loop stops when `parent` is cancelled or [`TokenManager::stop`]
    /// is called.
    pub async fn start(
        exchange: Arc<dyn TokenExchange + Send + Sync>,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let credential = exchange.exchange().await?;
        let expires_in = credential.expires_in;
        info!("Obtained initial access token, valid for {:?}", expires_in);

        let shared = Arc::new(Shared {
            exchange,
            current: RwLock::new(Arc::new(credential)),
        });
        let cancel = parent.child_token();

        let handle = tokio::spawn(refresh_loop(shared.clone(), cancel.clone(), expires_in));

        Ok(Self {
            shared,
            cancel,
            task: Mutex::new(Some(handle)),
        })
    }

    /// Exchanges credentials right now and swaps in the result.
    pub async fn refresh(&self) -> Result<Duration> {
        self.shared.refresh().await
    }

    /// Cancels the refresh loop and waits for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Token refresh task failed: {}", e);
            }
        }
    }
}

impl CredentialSource for TokenManager {
    fn current_token(&self) -> Arc<AccessCredential> {
        self.shared.current.read().clone()
    }
}

impl Drop for TokenManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn half_life(expires_in: Duration) -> Duration {
    (expires_in / 2).max(MIN_REFRESH_DELAY)
}

async fn refresh_loop(shared: Arc<Shared>, cancel: CancellationToken, expires_in: Duration) {
    let mut delay = half_life(expires_in);

    loop {
        info!("Next token refresh in {:?}", delay);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = shared.refresh() => result,
        };

        delay = match result {
            Ok(expires_in) => half_life(expires_in),
            Err(e) => {
                error!(
                    "Failed to refresh access token: {}, retrying in {:?}",
                    e, REFRESH_RETRY_DELAY
                );
                REFRESH_RETRY_DELAY
            }
        };
    }

    info!("Token refresh cancelled");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::app::SavedFeedError;

    /// Hands out `tok-N` for the N-th call, failing the calls listed in `fail_on`.
    struct ScriptedExchange {
        calls: AtomicUsize,
        fail_on: HashSet<usize>,
        expires_in: Duration,
    }

    impl ScriptedExchange {
        fn new(expires_in: Duration, fail_on: &[usize]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_on: fail_on.iter().copied().collect(),
                expires_in,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenExchange for ScriptedExchange {
        async fn exchange(&self) -> Result<AccessCredential> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on.contains(&n) {
                return Err(SavedFeedError::Auth(format!("scripted failure {}", n)));
            }
            Ok(AccessCredential::new(format!("tok-{}", n), self.expires_in))
        }
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_initial_exchange_fails() {
        let exchange = ScriptedExchange::new(HOUR, &[1]);
        let root = CancellationToken::new();
        let result = TokenManager::start(exchange.clone(), &root).await;
        assert!(matches!(result, Err(SavedFeedError::Auth(_))));
        assert_eq!(exchange.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_at_half_life() {
        let exchange = ScriptedExchange::new(HOUR, &[]);
        let root = CancellationToken::new();
        let manager = TokenManager::start(exchange.clone(), &root).await.unwrap();
        assert_eq!(exchange.calls(), 1);

        tokio::time::sleep(Duration::from_secs(1799)).await;
        assert_eq!(exchange.calls(), 1);
        let first = manager.current_token();
        let second = manager.current_token();
        assert_eq!(first.token, "tok-1");
        assert_eq!(first, second);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(exchange.calls(), 2);
        assert_eq!(manager.current_token().token, "tok-2");

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_retries_after_backoff() {
        let exchange = ScriptedExchange::new(HOUR, &[2]);
        let root = CancellationToken::new();
        let manager = TokenManager::start(exchange.clone(), &root).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1805)).await;
        assert_eq!(exchange.calls(), 2);
        // The old credential stays in place until a refresh succeeds.
        assert_eq!(manager.current_token().token, "tok-1");

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(exchange.calls(), 3);
        assert_eq!(manager.current_token().token, "tok-3");

        // Back on the half-life schedule: next attempt at 1810 + 1800.
        tokio::time::sleep(Duration::from_secs(1790)).await;
        assert_eq!(exchange.calls(), 3);
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(exchange.calls(), 4);

        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_refreshes() {
        let exchange = ScriptedExchange::new(HOUR, &[]);
        let root = CancellationToken::new();
        let manager = TokenManager::start(exchange.clone(), &root).await.unwrap();

        manager.stop().await;
        tokio::time::sleep(HOUR * 4).await;

        assert_eq!(exchange.calls(), 1);
        assert_eq!(manager.current_token().token, "tok-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_ends_refreshes() {
        let exchange = ScriptedExchange::new(HOUR, &[]);
        let root = CancellationToken::new();
        let manager = TokenManager::start(exchange.clone(), &root).await.unwrap();

        root.cancel();
        tokio::time::sleep(HOUR * 4).await;
        assert_eq!(exchange.calls(), 1);

        // Stopping after the loop already exited still returns.
        manager.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_swaps_credential() {
        let exchange = ScriptedExchange::new(Duration::from_secs(120), &[]);
        let root = CancellationToken::new();
        let manager = TokenManager::start(exchange.clone(), &root).await.unwrap();

        let expires_in = manager.refresh().await.unwrap();
        assert_eq!(expires_in, Duration::from_secs(120));
        assert_eq!(manager.current_token().token, "tok-2");

        manager.stop().await;
    }

    #[test]
    fn test_half_life_has_floor() {
        assert_eq!(half_life(HOUR), Duration::from_secs(1800));
        assert_eq!(half_life(Duration::ZERO), MIN_REFRESH_DELAY);
    }
}
