//! The key/value abstraction every Keyward subsystem persists through.
//!
//! A [`Storage`] engine maps string keys to opaque byte values. Engines are
//! shared across concurrent requests as `Arc<dyn Storage>`, so every method
//! takes `&self`.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single key/value record as held by a storage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    /// Full storage key (e.g. `otp/<salted>` or `config/lease`).
    pub key: String,
    /// Raw value bytes. Structured records are JSON.
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Build an entry from raw bytes.
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Build an entry whose value is `record` serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] if `record` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(key: impl Into<String>, record: &T) -> StoreResult<Self> {
        Ok(Self {
            key: key.into(),
            value: serde_json::to_vec(record)?,
        })
    }

    /// Decode the value as a JSON record of type `T`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.value)
    }
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// Key/value storage engine.
///
/// Durability, encryption at rest and replication are the engine's concern.
/// Callers only rely on the per-call guarantees documented below.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the entry at `key`, or `None` if nothing is stored there.
    async fn get(&self, key: &str) -> StoreResult<Option<StorageEntry>>;

    /// Write `entry`, overwriting whatever was stored at its key.
    async fn put(&self, entry: StorageEntry) -> StoreResult<()>;

    /// Remove the entry at `key`.
    ///
    /// Returns `true` only for the caller whose delete actually removed the
    /// entry. Engines must make the existence check and the removal a single
    /// atomic step, so that of several concurrent deletes of the same key at
    /// most one observes `true`.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Write `entry` only if nothing is stored at its key yet.
    ///
    /// Returns `true` if this call created the entry. As with
    /// [`Storage::delete`], the existence check and the write are one atomic
    /// step, so of several concurrent creates at most one observes `true`.
    async fn create(&self, entry: StorageEntry) -> StoreResult<bool>;
}

/// Reject keys no engine can address.
pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
