//! Async record store abstraction.
//!
//! Timer engines never touch `SQLite` directly. They talk to a
//! [`RecordStore`], which lets the engine and coordinator be exercised
//! against [`MemoryStore`] while the binary runs on [`SqliteStore`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::trace;

use crate::error::{Error, Result};
use crate::record::{RecordId, TimerRecord};
use crate::storage::Storage;

/// A persistent, key-indexed store of timer records.
///
/// Update and delete calls fail with [`Error::RecordNotFound`] when the id
/// does not resolve; every other failure means the store could not be used.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Create a record and return its new id.
    async fn create(&self, name: &str, initial_ms: u64) -> Result<RecordId>;

    /// Read every record, ordered by id.
    async fn read_all(&self) -> Result<Vec<TimerRecord>>;

    /// Read one record, or `None` if it does not exist.
    async fn read_one(&self, id: RecordId) -> Result<Option<TimerRecord>>;

    /// Overwrite a record's accumulated time.
    async fn update_elapsed(&self, id: RecordId, ms: u64) -> Result<()>;

    /// Overwrite a record's name.
    async fn update_name(&self, id: RecordId, name: &str) -> Result<()>;

    /// Delete a record.
    async fn delete(&self, id: RecordId) -> Result<()>;
}

/// [`RecordStore`] backed by the `SQLite` [`Storage`].
///
/// Each call runs on the blocking pool; the connection is shared behind a
/// mutex so clones of the store see the same database.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    storage: Arc<Mutex<Storage>>,
}

impl SqliteStore {
    /// Wrap an already opened storage.
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Open or create the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Storage::open(path).map(Self::new)
    }

    /// Open a fresh in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Storage::open_in_memory().map(Self::new)
    }

    async fn with_storage<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|_| Error::store_unavailable("storage lock poisoned"))?;
            op(&guard)
        })
        .await
        .map_err(|e| Error::store_unavailable(format!("storage task failed: {e}")))?
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn create(&self, name: &str, initial_ms: u64) -> Result<RecordId> {
        let name = name.to_string();
        self.with_storage(move |s| s.create(&name, initial_ms)).await
    }

    async fn read_all(&self) -> Result<Vec<TimerRecord>> {
        self.with_storage(Storage::list).await
    }

    async fn read_one(&self, id: RecordId) -> Result<Option<TimerRecord>> {
        self.with_storage(move |s| s.get(id)).await
    }

    async fn update_elapsed(&self, id: RecordId, ms: u64) -> Result<()> {
        trace!(%id, ms, "Persisting elapsed time");
        let found = self.with_storage(move |s| s.update_elapsed(id, ms)).await?;
        found.then_some(()).ok_or(Error::not_found(id))
    }

    async fn update_name(&self, id: RecordId, name: &str) -> Result<()> {
        let name = name.to_string();
        let found = self.with_storage(move |s| s.update_name(id, &name)).await?;
        found.then_some(()).ok_or(Error::not_found(id))
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        let found = self.with_storage(move |s| s.delete(id)).await?;
        found.then_some(()).ok_or(Error::not_found(id))
    }
}

/// In-process [`RecordStore`] with the same semantics as [`SqliteStore`].
///
/// Ids start at 1 and are never reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    last_id: i64,
    records: BTreeMap<RecordId, TimerRecord>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_inner<T>(&self, op: impl FnOnce(&mut MemoryInner) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| Error::store_unavailable("memory store lock poisoned"))?;
        op(&mut guard)
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, name: &str, initial_ms: u64) -> Result<RecordId> {
        self.with_inner(|inner| {
            inner.last_id += 1;
            let id = RecordId::new(inner.last_id);
            inner.records.insert(
                id,
                TimerRecord {
                    id,
                    name: name.to_string(),
                    accumulated_ms: initial_ms,
                },
            );
            Ok(id)
        })
    }

    async fn read_all(&self) -> Result<Vec<TimerRecord>> {
        self.with_inner(|inner| Ok(inner.records.values().cloned().collect()))
    }

    async fn read_one(&self, id: RecordId) -> Result<Option<TimerRecord>> {
        self.with_inner(|inner| Ok(inner.records.get(&id).cloned()))
    }

    async fn update_elapsed(&self, id: RecordId, ms: u64) -> Result<()> {
        self.with_inner(|inner| {
            let record = inner.records.get_mut(&id).ok_or(Error::not_found(id))?;
            record.accumulated_ms = ms;
            Ok(())
        })
    }

    async fn update_name(&self, id: RecordId, name: &str) -> Result<()> {
        self.with_inner(|inner| {
            let record = inner.records.get_mut(&id).ok_or(Error::not_found(id))?;
            record.name = name.to_string();
            Ok(())
        })
    }

    async fn delete(&self, id: RecordId) -> Result<()> {
        self.with_inner(|inner| {
            inner
                .records
                .remove(&id)
                .map(|_| ())
                .ok_or(Error::not_found(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise_contract(store: &dyn RecordStore) {
        let a = store.create("untilted", 0).await.unwrap();
        let b = store.create("reading", 2_000).await.unwrap();
        assert_ne!(a, b);

        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a);
        assert_eq!(all[1].accumulated_ms, 2_000);

        store.update_elapsed(a, 5_000).await.unwrap();
        store.update_name(a, "writing").await.unwrap();
        let record = store.read_one(a).await.unwrap().unwrap();
        assert_eq!(record.accumulated_ms, 5_000);
        assert_eq!(record.name, "writing");

        store.delete(a).await.unwrap();
        assert!(store.read_one(a).await.unwrap().is_none());

        assert!(store.update_elapsed(a, 1).await.unwrap_err().is_not_found());
        assert!(store.update_name(a, "x").await.unwrap_err().is_not_found());
        assert!(store.delete(a).await.unwrap_err().is_not_found());

        let c = store.create("c", 0).await.unwrap();
        assert!(c > b);
    }

    #[tokio::test]
    async fn test_sqlite_store_contract() {
        let store = SqliteStore::open_in_memory().unwrap();
        exercise_contract(&store).await;
    }

    #[tokio::test]
    async fn test_memory_store_contract() {
        let store = MemoryStore::new();
        exercise_contract(&store).await;
    }

    #[tokio::test]
    async fn test_sqlite_store_clones_share_database() {
        let store = SqliteStore::open_in_memory().unwrap();
        let clone = store.clone();

        let id = store.create("shared", 0).await.unwrap();
        assert!(clone.read_one(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_store_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("stopwatch.db")).unwrap();

        let id = store.create("disk", 1_000).await.unwrap();
        assert_eq!(
            store.read_one(id).await.unwrap().unwrap().accumulated_ms,
            1_000
        );
    }
}
