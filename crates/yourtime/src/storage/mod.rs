//! Storage layer for yourtime.
//!
//! This module provides the synchronous `SQLite` storage for timer records.
//! Async callers go through [`crate::store::SqliteStore`], which wraps it.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::record::{RecordId, TimerRecord};

/// Storage engine for timer records.
///
/// One row per stopwatch in the `stopwatch` table. Ids come from
/// `AUTOINCREMENT`, so a deleted id is never handed out again.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new record and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn create(&self, name: &str, initial_ms: u64) -> Result<RecordId> {
        self.conn.execute(
            "INSERT INTO stopwatch (item_name, time_ms) VALUES (?1, ?2)",
            params![name, to_sql_ms(initial_ms)?],
        )?;

        let id = RecordId::new(self.conn.last_insert_rowid());
        info!(%id, name, "Created timer record");
        Ok(id)
    }

    /// Get a record by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: RecordId) -> Result<Option<TimerRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, item_name, time_ms FROM stopwatch WHERE id = ?1",
                [id.get()],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Get every record, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self) -> Result<Vec<TimerRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, item_name, time_ms FROM stopwatch ORDER BY id ASC")?;

        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Overwrite the accumulated time of a record.
    ///
    /// Returns `true` if the record exists, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_elapsed(&self, id: RecordId, ms: u64) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE stopwatch SET time_ms = ?1 WHERE id = ?2",
            params![to_sql_ms(ms)?, id.get()],
        )?;
        Ok(affected > 0)
    }

    /// Rename a record.
    ///
    /// Returns `true` if the record exists, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn update_name(&self, id: RecordId, name: &str) -> Result<bool> {
        let affected = self.conn.execute(
            "UPDATE stopwatch SET item_name = ?1 WHERE id = ?2",
            params![name, id.get()],
        )?;
        Ok(affected > 0)
    }

    /// Delete a record by id.
    ///
    /// Returns `true` if a record was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: RecordId) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM stopwatch WHERE id = ?1", [id.get()])?;
        if affected > 0 {
            info!(%id, "Deleted timer record");
        }
        Ok(affected > 0)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<TimerRecord> {
        let id: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        let time_ms: i64 = row.get(2)?;

        let accumulated_ms =
            u64::try_from(time_ms).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(2, time_ms))?;

        Ok(TimerRecord {
            id: RecordId::new(id),
            name,
            accumulated_ms,
        })
    }
}

fn to_sql_ms(ms: u64) -> Result<i64> {
    i64::try_from(ms).map_err(|_| Error::internal(format!("elapsed time {ms}ms out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_storage() -> Storage {
        Storage::open_in_memory().expect("failed to create test storage")
    }

    #[test]
    fn test_open_in_memory() {
        let storage = create_test_storage();
        assert_eq!(storage.path(), Path::new(":memory:"));
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stopwatch.db");

        let storage = Storage::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(storage.path(), path.as_path());
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stopwatch.db");

        let id = {
            let storage = Storage::open(&path).unwrap();
            let id = storage.create("reading", 0).unwrap();
            storage.update_elapsed(id, 4_000).unwrap();
            id
        };

        let storage = Storage::open(&path).unwrap();
        let record = storage.get(id).unwrap().unwrap();
        assert_eq!(record.name, "reading");
        assert_eq!(record.accumulated_ms, 4_000);
    }

    #[test]
    fn test_create_and_get() {
        let storage = create_test_storage();
        let id = storage.create("untilted", 0).unwrap();

        let record = storage.get(id).unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.name, "untilted");
        assert_eq!(record.accumulated_ms, 0);
    }

    #[test]
    fn test_get_nonexistent() {
        let storage = create_test_storage();
        assert!(storage.get(RecordId::new(99_999)).unwrap().is_none());
    }

    #[test]
    fn test_list_ordered_by_id() {
        let storage = create_test_storage();
        let a = storage.create("a", 0).unwrap();
        let b = storage.create("b", 5_000).unwrap();
        let c = storage.create("c", 1_000).unwrap();

        let ids: Vec<_> = storage.list().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn test_update_elapsed() {
        let storage = create_test_storage();
        let id = storage.create("x", 0).unwrap();

        assert!(storage.update_elapsed(id, 3_000).unwrap());
        assert_eq!(storage.get(id).unwrap().unwrap().accumulated_ms, 3_000);

        assert!(storage.update_elapsed(id, 0).unwrap());
        assert_eq!(storage.get(id).unwrap().unwrap().accumulated_ms, 0);
    }

    #[test]
    fn test_update_elapsed_nonexistent() {
        let storage = create_test_storage();
        assert!(!storage.update_elapsed(RecordId::new(5), 1_000).unwrap());
    }

    #[test]
    fn test_update_elapsed_out_of_range() {
        let storage = create_test_storage();
        let id = storage.create("x", 0).unwrap();
        assert!(storage.update_elapsed(id, u64::MAX).is_err());
    }

    #[test]
    fn test_update_name() {
        let storage = create_test_storage();
        let id = storage.create("old", 0).unwrap();

        assert!(storage.update_name(id, "new").unwrap());
        assert_eq!(storage.get(id).unwrap().unwrap().name, "new");
        assert!(!storage.update_name(RecordId::new(999), "new").unwrap());
    }

    #[test]
    fn test_delete() {
        let storage = create_test_storage();
        let id = storage.create("to delete", 0).unwrap();

        assert!(storage.delete(id).unwrap());
        assert!(storage.get(id).unwrap().is_none());
        assert!(!storage.delete(id).unwrap());
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let storage = create_test_storage();
        let first = storage.create("a", 0).unwrap();
        storage.delete(first).unwrap();

        let second = storage.create("b", 0).unwrap();
        assert!(second > first);
    }
}
