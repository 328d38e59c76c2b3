pub mod pager;
pub mod reddit;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::app::Result;
use crate::domain::Item;

pub use pager::{iterate_saved, SavedItems};
pub use reddit::RedditClient;

/// One page of the saved-items listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub dist: Option<u64>,
    #[serde(default, deserialize_with = "decodable_children")]
    pub children: Vec<Item>,
}

/// Decodes children one at a time, dropping any that aren't an item at all
/// so the rest of the page still comes through.
fn decodable_children<'de, D>(deserializer: D) -> std::result::Result<Vec<Item>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|child| match serde_json::from_value::<Item>(child) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping undecodable saved item: {}", e);
                None
            }
        })
        .collect())
}

impl Page {
    /// Cursor for the following page, if the listing continues.
    pub fn next_cursor(&self) -> Option<&str> {
        self.after.as_deref().filter(|after| !after.is_empty())
    }
}

#[async_trait]
pub trait SavedSource {
    /// Fetches one page of `user`'s saved items, continuing after `after`.
    async fn fetch_saved_page(&self, user: &str, after: Option<&str>) -> Result<Page>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damaged_children_do_not_reject_the_page() {
        let page: Page = serde_json::from_str(
            r#"{"after": "t3_next", "children": [
                {"kind": "t3", "data": {"id": "good"}},
                {"kind": "t3", "data": null},
                {"data": {"id": "kindless"}},
                "not an item",
                {"kind": "t1", "data": {"id": "also_good"}}
            ]}"#,
        )
        .unwrap();

        let ids: Vec<_> = page.children.iter().map(|item| item.id()).collect();
        assert_eq!(
            ids,
            vec![Some("good"), None, Some("kindless"), Some("also_good")]
        );
        assert_eq!(page.next_cursor(), Some("t3_next"));
    }

    #[test]
    fn test_null_children() {
        let page: Page = serde_json::from_str(r#"{"after": null, "children": null}"#).unwrap();
        assert!(page.children.is_empty());
    }

    #[test]
    fn test_next_cursor_treats_empty_as_end() {
        let mut page = Page::default();
        assert_eq!(page.next_cursor(), None);
        page.after = Some(String::new());
        assert_eq!(page.next_cursor(), None);
        page.after = Some("t3_x".into());
        assert_eq!(page.next_cursor(), Some("t3_x"));
    }
}
