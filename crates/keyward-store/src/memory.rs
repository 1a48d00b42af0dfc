//! In-memory storage engine backed by [`DashMap`].
//!
//! Used by tests and by deployments that do not need durability. Removal
//! goes through `DashMap::remove`, which holds the shard write lock for the
//! whole check-and-remove, so concurrent deletes of one key report `true`
//! exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{StoreError, StoreResult};
use crate::storage::{Storage, StorageEntry, validate_key};

/// Concurrent in-memory [`Storage`].
///
/// Cheaply cloneable; clones share the same data.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    data: Arc<DashMap<String, Vec<u8>>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryStorage {
    /// Create an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the engine holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`]
    /// until called again with `false`. Lets callers exercise their
    /// storage-failure paths.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory storage is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<StorageEntry>> {
        self.ensure_online()?;
        validate_key(key)?;
        Ok(self
            .data
            .get(key)
            .map(|value| StorageEntry::new(key, value.value().clone())))
    }

    async fn put(&self, entry: StorageEntry) -> StoreResult<()> {
        self.ensure_online()?;
        validate_key(&entry.key)?;
        self.data.insert(entry.key, entry.value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.ensure_online()?;
        validate_key(key)?;
        Ok(self.data.remove(key).is_some())
    }

    async fn create(&self, entry: StorageEntry) -> StoreResult<bool> {
        self.ensure_online()?;
        validate_key(&entry.key)?;
        match self.data.entry(entry.key) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(entry.value);
                Ok(true)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let storage = InMemoryStorage::new();
        storage
            .put(StorageEntry::new("config/lease", b"{}".to_vec()))
            .await
            .unwrap();

        let entry = storage.get("config/lease").await.unwrap().unwrap();
        assert_eq!(entry.value, b"{}");

        assert!(storage.delete("config/lease").await.unwrap());
        assert!(!storage.delete("config/lease").await.unwrap());
        assert!(storage.get("config/lease").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites() {
        let storage = InMemoryStorage::new();
        storage.put(StorageEntry::new("k", b"1".to_vec())).await.unwrap();
        storage.put(StorageEntry::new("k", b"2".to_vec())).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().unwrap().value, b"2");
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn create_keeps_existing_value() {
        let storage = InMemoryStorage::new();
        assert!(storage.create(StorageEntry::new("salt", b"1".to_vec())).await.unwrap());
        assert!(!storage.create(StorageEntry::new("salt", b"2".to_vec())).await.unwrap());
        assert_eq!(storage.get("salt").await.unwrap().unwrap().value, b"1");
    }

    #[tokio::test]
    async fn offline_engine_fails_every_call() {
        let storage = InMemoryStorage::new();
        storage.set_offline(true);
        assert!(matches!(
            storage.get("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(storage.delete("k").await.is_err());

        storage.set_offline(false);
        assert!(storage.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_deletes_succeed_once() {
        let storage = InMemoryStorage::new();
        storage.put(StorageEntry::new("otp/x", b"1".to_vec())).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let s = storage.clone();
                tokio::spawn(async move { s.delete("otp/x").await.unwrap() })
            })
            .collect();

        let mut removed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                removed += 1;
            }
        }
        assert_eq!(removed, 1);
    }
}
