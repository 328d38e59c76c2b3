//! Incremental mirror of the saved-items listing.
//!
//! ```text
//! SavedSource → dedup against PostStore → append → rebuild → publish
//! ```
//!
//! [`FeedCache`] runs one cycle while starting up and then one per
//! interval in the background. Readers get the last published
//! [`FeedSnapshot`] and never wait for a cycle.

mod sync;

pub use sync::{CycleReport, NewItems, Synchronizer};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::{Result, SavedFeedError};
use crate::config::format_interval;
use crate::domain::FeedSnapshot;
use crate::fetcher::SavedSource;
use crate::store::PostStore;

pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub user: String,
    pub site_origin: String,
    pub update_interval: Duration,
    /// Rendered feed is written here after every published cycle.
    pub export_path: Option<PathBuf>,
}

impl CacheSettings {
    pub fn new(user: impl Into<String>, site_origin: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            site_origin: site_origin.into(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            export_path: None,
        }
    }
}

struct Inner<S> {
    sync: Synchronizer<S>,
    feed: RwLock<Arc<FeedSnapshot>>,
    // Serializes whole cycles; the store's counter assumes no interleaving.
    cycle_lock: tokio::sync::Mutex<()>,
    export_path: Option<PathBuf>,
}

impl<S: PostStore> Inner<S> {
    async fn cycle(&self) -> Result<CycleReport> {
        let _guard = self.cycle_lock.lock().await;
        let start = Instant::now();

        let (report, snapshot) = self.sync.run_cycle().await?;
        self.publish(snapshot);

        info!(
            "Sync complete: {} new items, {} skipped, {} pages, {} total ({:.1}s)",
            report.new_items,
            report.skipped,
            report.pages_fetched,
            report.total_items,
            start.elapsed().as_secs_f64()
        );
        Ok(report)
    }

    fn publish(&self, snapshot: FeedSnapshot) {
        let snapshot = Arc::new(snapshot);
        *self.feed.write() = snapshot.clone();
        self.export(&snapshot);
    }

    fn export(&self, snapshot: &FeedSnapshot) {
        if let Some(ref path) = self.export_path {
            if let Err(e) = export_snapshot(snapshot, path) {
                warn!("Failed to export feed to {}: {}", path.display(), e);
            }
        }
    }
}

/// Writes the rendered feed next to `path` and renames it into place, so
/// readers of the file never see a partial document.
pub fn export_snapshot(snapshot: &FeedSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let file = fs::File::create(&tmp)?;
    let file = snapshot.write_rss(file)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Anything that can hand out the current published snapshot.
pub trait FeedSource {
    fn current_feed(&self) -> Arc<FeedSnapshot>;
}

/// Mirror of a user's saved items with a periodically rebuilt feed.
pub struct FeedCache<S> {
    inner: Arc<Inner<S>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<S: PostStore + Send + Sync + 'static> FeedCache<S> {
    /// Runs the first cycle, publishes its snapshot and starts the
    /// background loop. Fails if the first cycle fails.
    pub async fn start(
        source: Arc<dyn SavedSource + Send + Sync>,
        store: Arc<S>,
        settings: CacheSettings,
        parent: &CancellationToken,
    ) -> Result<Self> {
        let sync = Synchronizer::new(source, store, &settings.user, &settings.site_origin);
        let (report, snapshot) = sync.run_cycle().await?;
        info!(
            "Initial sync: {} new items, {} total",
            report.new_items, report.total_items
        );

        let inner = Arc::new(Inner {
            sync,
            feed: RwLock::new(Arc::new(snapshot)),
            cycle_lock: tokio::sync::Mutex::new(()),
            export_path: settings.export_path,
        });
        let initial = inner.feed.read().clone();
        inner.export(&initial);

        let cancel = parent.child_token();
        let handle = tokio::spawn(sync_loop(
            inner.clone(),
            cancel.clone(),
            settings.update_interval,
        ));

        Ok(Self {
            inner,
            cancel,
            task: Mutex::new(Some(handle)),
        })
    }

    /// The last published snapshot.
    pub fn get_feed(&self) -> Arc<FeedSnapshot> {
        self.inner.feed.read().clone()
    }

    /// Runs a cycle right away, outside the schedule. Waits for a scheduled
    /// cycle in progress to finish first.
    ///
    /// Fails with [`SavedFeedError::Stopped`] once the cache is stopped,
    /// including while waiting for or running the cycle.
    pub async fn sync_now(&self) -> Result<CycleReport> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(SavedFeedError::Stopped),
            result = self.inner.cycle() => result,
        }
    }

    /// Cancels the background loop and waits for it to exit.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Feed sync task failed: {}", e);
            }
        }
    }
}

impl<S: PostStore + Send + Sync + 'static> FeedSource for FeedCache<S> {
    fn current_feed(&self) -> Arc<FeedSnapshot> {
        self.get_feed()
    }
}

impl<S> Drop for FeedCache<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn sync_loop<S: PostStore>(
    inner: Arc<Inner<S>>,
    cancel: CancellationToken,
    interval: Duration,
) {
    loop {
        info!("Next feed sync in {}", format_interval(interval.as_secs()));
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = inner.cycle() => result,
        };

        if let Err(e) = result {
            error!("Feed sync failed, keeping previous feed: {}", e);
        }
    }

    info!("Feed sync cancelled");
}
