//! Error types for the keyward-store crate.
//!
//! All storage operations return [`StoreError`] via [`StoreResult`].

use thiserror::Error;

/// Alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a storage engine.
#[derive(Debug, Error)]
pub enum StoreError {
    /// SQLite operation failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization failed while building an entry.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Storage keys must be non-empty.
    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    /// The engine is not reachable (closed, poisoned, injected failure).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A blocking task was cancelled or panicked.
    #[error("background task failed: {0}")]
    TaskJoin(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(err.to_string())
    }
}
