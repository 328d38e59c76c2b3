pub mod item;
pub mod snapshot;

pub use item::{Item, ItemKind};
pub use snapshot::{FeedEntry, FeedSnapshot};
