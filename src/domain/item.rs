use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::app::{Result, SavedFeedError};

/// Remote kind tag for a submitted link post.
pub const LINK_KIND: &str = "t3";
/// Remote kind tag for a comment.
pub const COMMENT_KIND: &str = "t1";

const LINK_FALLBACK_TITLE: &str = "Reddit post";
const COMMENT_FALLBACK_TITLE: &str = "comment";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemKind {
    Link,
    Comment,
    Other(String),
}

impl From<String> for ItemKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            LINK_KIND => ItemKind::Link,
            COMMENT_KIND => ItemKind::Comment,
            _ => ItemKind::Other(kind),
        }
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Link => LINK_KIND.to_string(),
            ItemKind::Comment => COMMENT_KIND.to_string(),
            ItemKind::Other(kind) => kind,
        }
    }
}

impl Default for ItemKind {
    fn default() -> Self {
        ItemKind::Other(String::new())
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Link => f.write_str(LINK_KIND),
            ItemKind::Comment => f.write_str(COMMENT_KIND),
            ItemKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// One saved entry as returned by the remote listing.
///
/// Only the handful of attributes needed for dedup and display are read;
/// everything else in `data` is carried through untouched and persisted
/// as-is. A missing kind decodes as an empty unknown kind and a missing or
/// null `data` as an empty map, so a damaged entry surfaces later as a
/// malformed item instead of failing its whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default)]
    pub kind: ItemKind,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Map<String, Value>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Item {
    pub fn new(kind: ItemKind, data: Map<String, Value>) -> Self {
        Self { kind, data }
    }

    fn str_attr(&self, name: &str) -> Option<&str> {
        self.data.get(name).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_attr("id")
    }

    pub fn title(&self) -> Option<&str> {
        self.str_attr("title")
    }

    pub fn permalink(&self) -> Option<&str> {
        self.str_attr("permalink")
    }

    pub fn link_title(&self) -> Option<&str> {
        self.str_attr("link_title")
    }

    pub fn link_permalink(&self) -> Option<&str> {
        self.str_attr("link_permalink")
    }

    /// The remote's stable identifier, used as the dedup key.
    pub fn external_id(&self) -> Result<&str> {
        self.id().ok_or_else(|| {
            SavedFeedError::MalformedItem(format!("{} item without an id", self.kind))
        })
    }

    pub fn display_title(&self) -> &str {
        match self.kind {
            ItemKind::Link => self.title().unwrap_or(LINK_FALLBACK_TITLE),
            ItemKind::Comment => self.link_title().unwrap_or(COMMENT_FALLBACK_TITLE),
            ItemKind::Other(_) => LINK_FALLBACK_TITLE,
        }
    }

    /// Link for the feed entry. Posts carry a site-relative permalink,
    /// comments carry an absolute link to their parent post.
    pub fn display_link(&self, site_origin: &str) -> String {
        match self.kind {
            ItemKind::Link => self
                .permalink()
                .map(|p| format!("{}{}", site_origin.trim_end_matches('/'), p))
                .unwrap_or_default(),
            ItemKind::Comment => self.link_permalink().unwrap_or_default().to_string(),
            ItemKind::Other(_) => String::new(),
        }
    }
}
