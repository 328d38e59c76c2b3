//! Cursor-driven pagination over the saved listing.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;

use crate::app::Result;
use crate::domain::Item;
use crate::fetcher::SavedSource;

enum Cursor {
    Start,
    After(String),
    End,
}

/// Pull-based walk over a user's saved items, one page in memory at a time.
///
/// Pages are fetched only when the previous one is used up, so a caller
/// that stops early never pays for the rest of the listing. A failed fetch
/// is returned from the pull that needed it; pulling again retries the
/// same page.
pub struct SavedItems {
    source: Arc<dyn SavedSource + Send + Sync>,
    user: String,
    buffer: VecDeque<Item>,
    cursor: Cursor,
    pages_fetched: usize,
}

/// Starts a fresh pagination from the newest saved item.
pub fn iterate_saved(source: Arc<dyn SavedSource + Send + Sync>, user: &str) -> SavedItems {
    SavedItems {
        source,
        user: user.to_string(),
        buffer: VecDeque::new(),
        cursor: Cursor::Start,
        pages_fetched: 0,
    }
}

impl SavedItems {
    pub async fn next_item(&mut self) -> Result<Option<Item>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }

            let after = match self.cursor {
                Cursor::End => return Ok(None),
                Cursor::Start => None,
                Cursor::After(ref after) => Some(after.clone()),
            };

            let page = self
                .source
                .fetch_saved_page(&self.user, after.as_deref())
                .await?;
            self.pages_fetched += 1;
            debug!(
                "Fetched page {} with {} items",
                self.pages_fetched,
                page.children.len()
            );

            // An empty page ends the walk even if it carries a cursor.
            self.cursor = match page.next_cursor() {
                Some(next) if !page.children.is_empty() => Cursor::After(next.to_string()),
                _ => Cursor::End,
            };
            self.buffer = page.children.into();
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}
