//! Vault error types.
//!
//! Every public API in this crate returns [`VaultError`]. Absence of a
//! passcode or a lease policy is never an error; it is reported as `None`
//! or [`crate::VerifyOutcome::Invalid`].

use keyward_store::StoreError;

/// Unified error type for the Keyward vault core.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Request errors -----------------------------------------------------
    /// A request field is missing or invalid. Raised before any storage
    /// access.
    #[error("malformed request: {field}: {reason}")]
    MalformedRequest {
        /// Name of the offending field (e.g. `otp`, `ttl`).
        field: &'static str,
        reason: String,
    },

    // -- Salt errors --------------------------------------------------------
    /// The salt secret is empty or could not be decoded.
    #[error("invalid salt secret: {reason}")]
    InvalidSalt { reason: String },

    // -- Configuration errors -----------------------------------------------
    /// The configuration file could not be read or parsed.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    // -- Underlying errors --------------------------------------------------
    /// Any failure from the storage engine. Always surfaced, never retried.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// JSON serialization error while writing a record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Generic ------------------------------------------------------------
    /// Catch-all for unexpected internal errors (e.g. CSPRNG failure).
    #[error("internal vault error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Shorthand for [`VaultError::MalformedRequest`].
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedRequest {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
