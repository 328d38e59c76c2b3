use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use tracing::{debug, warn};

use crate::app::{Result, SavedFeedError};
use crate::domain::Item;
use crate::store::{PostStore, SequenceId};

const CONTENT_COUNTER: &str = "content";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            SavedFeedError::Store(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    /// Closes the underlying connection, flushing anything SQLite still holds.
    pub fn close(self) -> Result<()> {
        let conn = self.conn.into_inner().map_err(|e| {
            SavedFeedError::Store(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })?;
        conn.close().map_err(|(_, e)| SavedFeedError::Store(e))
    }
}

impl PostStore for SqliteStore {
    fn append_batch(&self, items: &[Item]) -> Result<Vec<SequenceId>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut assigned = Vec::new();

        for item in items {
            let external_id = match item.external_id() {
                Ok(id) => id,
                Err(e) => {
                    warn!("Skipping item: {}", e);
                    continue;
                }
            };

            let indexed = tx
                .query_row(
                    "SELECT 1 FROM post_index WHERE external_id = ?1",
                    params![external_id],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if indexed {
                debug!("Item {} already stored", external_id);
                continue;
            }

            let last: i64 = tx.query_row(
                "SELECT value FROM counters WHERE name = ?1",
                params![CONTENT_COUNTER],
                |row| row.get(0),
            )?;
            let next = last + 1;
            tx.execute(
                "UPDATE counters SET value = ?1 WHERE name = ?2",
                params![next, CONTENT_COUNTER],
            )?;

            let seq = SequenceId(next as u64);
            let key = seq.to_key();
            let body = serde_json::to_string(item)?;

            tx.execute(
                "INSERT INTO content (key, body) VALUES (?1, ?2)",
                params![&key[..], body],
            )?;
            tx.execute(
                "INSERT INTO post_index (external_id, content_key) VALUES (?1, ?2)",
                params![external_id, &key[..]],
            )?;

            assigned.push(seq);
        }

        tx.commit()?;
        Ok(assigned)
    }

    fn scan_all(&self) -> Result<Vec<(SequenceId, Item)>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare("SELECT key, body FROM content ORDER BY key ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(key, body)| {
                let seq = SequenceId::from_key(&key)?;
                let item: Item = serde_json::from_str(&body)?;
                Ok((seq, item))
            })
            .collect()
    }

    fn contains(&self, external_id: &str) -> Result<bool> {
        Ok(self.lookup(external_id)?.is_some())
    }

    fn lookup(&self, external_id: &str) -> Result<Option<SequenceId>> {
        let conn = self.conn()?;

        let key = conn
            .query_row(
                "SELECT content_key FROM post_index WHERE external_id = ?1",
                params![external_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;

        key.map(|k| SequenceId::from_key(&k)).transpose()
    }

    fn count(&self) -> Result<usize> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;

        Ok(count as usize)
    }
}
