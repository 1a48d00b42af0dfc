//! # keyward-store
//!
//! Key/value storage for Keyward.
//!
//! Every Keyward subsystem persists through the [`Storage`] trait and never
//! cares which engine sits behind it.
//!
//! ## Engines
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │  Storage (async trait, Arc<dyn Storage>)  │
//! ├─────────────────────┬─────────────────────┤
//! │  InMemoryStorage    │  SqliteStorage      │
//! │  (DashMap)          │  (rusqlite WAL)     │
//! └─────────────────────┴─────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use keyward_store::{SqliteStorage, Storage, StorageEntry};
//!
//! let storage = SqliteStorage::open_async("data/keyward.db").await?;
//! storage.put(StorageEntry::new("config/lease", b"{}".to_vec())).await?;
//! ```

pub mod db;
pub mod error;
pub mod memory;
pub mod storage;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::SqliteStorage;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStorage;
pub use storage::{Storage, StorageEntry};
