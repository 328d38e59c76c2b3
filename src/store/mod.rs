pub mod sqlite;

use std::fmt;

use crate::app::{Result, SavedFeedError};
use crate::domain::Item;

pub use sqlite::SqliteStore;

/// Process-assigned key of an accepted item. Strictly increasing in
/// acceptance order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceId(pub u64);

impl SequenceId {
    /// Big-endian encoding, so byte order matches numeric order.
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(key: &[u8]) -> Result<Self> {
        let bytes: [u8; 8] = key.try_into().map_err(|_| {
            SavedFeedError::Store(rusqlite::Error::InvalidColumnType(
                0,
                format!("content key of {} bytes", key.len()),
                rusqlite::types::Type::Blob,
            ))
        })?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub trait PostStore {
    /// Records every item not yet indexed, in the order given, inside a
    /// single transaction. Returns the ids assigned to the new items.
    fn append_batch(&self, items: &[Item]) -> Result<Vec<SequenceId>>;

    /// All stored items, oldest accepted first.
    fn scan_all(&self) -> Result<Vec<(SequenceId, Item)>>;

    fn contains(&self, external_id: &str) -> Result<bool>;

    fn lookup(&self, external_id: &str) -> Result<Option<SequenceId>>;

    fn count(&self) -> Result<usize>;
}
