//! A single synchronization cycle, independent of any schedule.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::Result;
use crate::domain::{FeedSnapshot, Item, ItemKind};
use crate::fetcher::{iterate_saved, SavedSource};
use crate::store::PostStore;

/// Outcome of one synchronization cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub new_items: usize,
    pub skipped: usize,
    pub pages_fetched: usize,
    pub total_items: usize,
}

/// Items pulled from the remote listing that the store hasn't seen yet.
#[derive(Debug, Default)]
pub struct NewItems {
    pub items: Vec<Item>,
    pub skipped: usize,
    pub pages_fetched: usize,
}

/// One fetch, dedup, persist and rebuild pass over a user's saved items.
pub struct Synchronizer<S> {
    source: Arc<dyn SavedSource + Send + Sync>,
    store: Arc<S>,
    user: String,
    site_origin: String,
}

impl<S: PostStore> Synchronizer<S> {
    pub fn new(
        source: Arc<dyn SavedSource + Send + Sync>,
        store: Arc<S>,
        user: &str,
        site_origin: &str,
    ) -> Self {
        Self {
            source,
            store,
            user: user.to_string(),
            site_origin: site_origin.to_string(),
        }
    }

    /// Pulls saved items newest first until the first one already stored.
    ///
    /// The remote list is treated as append-only and newest-first, so the
    /// first known item marks where the previous cycle left off. An item
    /// that is unsaved and saved again, or a reordered listing, can hide
    /// newer items behind that boundary.
    pub async fn collect_new_items(&self) -> Result<NewItems> {
        let mut saved = iterate_saved(self.source.clone(), &self.user);
        let mut new_items = NewItems::default();

        while let Some(item) = saved.next_item().await? {
            let external_id = match item.external_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping saved item: {}", e);
                    new_items.skipped += 1;
                    continue;
                }
            };

            if self.store.contains(external_id)? {
                debug!("Reached already stored item {}", external_id);
                break;
            }

            if let ItemKind::Other(ref kind) = item.kind {
                warn!(
                    "Saved item {} has unexpected kind {:?}, it will have no link",
                    external_id, kind
                );
            }
            new_items.items.push(item);
        }

        new_items.pages_fetched = saved.pages_fetched();
        Ok(new_items)
    }

    /// Builds a snapshot from everything in the store.
    pub fn rebuild(&self) -> Result<FeedSnapshot> {
        let stored = self.store.scan_all()?;
        Ok(FeedSnapshot::build(&self.user, &self.site_origin, &stored))
    }

    pub async fn run_cycle(&self) -> Result<(CycleReport, FeedSnapshot)> {
        let NewItems {
            items,
            skipped,
            pages_fetched,
        } = self.collect_new_items().await?;
        info!("Total new saved items: {}", items.len());

        let assigned = self.store.append_batch(&items)?;
        let snapshot = self.rebuild()?;

        let report = CycleReport {
            new_items: assigned.len(),
            skipped,
            pages_fetched,
            total_items: snapshot.len(),
        };
        Ok((report, snapshot))
    }
}
