use std::io::Write;

use chrono::{DateTime, Utc};
use rss::Channel;

use crate::app::{Result, SavedFeedError};
use crate::domain::Item;
use crate::store::SequenceId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
}

/// A fully built feed document. Published snapshots are shared behind an
/// `Arc` and never mutated; a new cycle builds a new one.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub title: String,
    pub link: String,
    pub entries: Vec<FeedEntry>,
    pub built_at: DateTime<Utc>,
}

impl FeedSnapshot {
    /// Builds the snapshot for `user` from stored items, keeping their order.
    pub fn build(user: &str, site_origin: &str, items: &[(SequenceId, Item)]) -> Self {
        let entries = items
            .iter()
            .map(|(_, item)| FeedEntry {
                title: item.display_title().to_string(),
                link: item.display_link(site_origin),
            })
            .collect();

        Self {
            title: format!("{}'s reddit saved posts", user),
            link: format!("https://www.reddit.com/user/{}/saved/", user),
            entries,
            built_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_channel(&self) -> Channel {
        let items = self
            .entries
            .iter()
            .map(|entry| {
                let mut item = rss::Item::default();
                item.set_title(Some(entry.title.clone()));
                if !entry.link.is_empty() {
                    item.set_link(Some(entry.link.clone()));
                }
                item
            })
            .collect::<Vec<_>>();

        let mut channel = Channel::default();
        channel.set_title(self.title.clone());
        channel.set_link(self.link.clone());
        channel.set_description(self.title.clone());
        channel.set_last_build_date(Some(self.built_at.to_rfc2822()));
        channel.set_items(items);
        channel
    }

    /// Renders the snapshot as an RSS 2.0 document.
    pub fn write_rss<W: Write>(&self, writer: W) -> Result<W> {
        self.to_channel()
            .write_to(writer)
            .map_err(|e| SavedFeedError::Render(e.to_string()))
    }

    pub fn to_rss_string(&self) -> String {
        self.to_channel().to_string()
    }
}
