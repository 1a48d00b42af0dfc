//! Salting of secret identifiers before they are used as storage keys.
//!
//! A raw passcode must never appear in storage key space: keys may be
//! visible to operators or end up in logs. The [`Salter`] maps an identifier
//! to `base64url(HMAC-SHA256(secret, id))`, which is deterministic for one
//! secret and cannot be inverted or recomputed without it.
//!
//! The secret is per backend. It is either supplied through configuration
//! or generated once and persisted at [`SALT_STORAGE_KEY`].

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use keyward_store::{Storage, StorageEntry};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// Storage key holding a generated salt secret.
pub const SALT_STORAGE_KEY: &str = "salt";

/// Length of a generated salt secret in bytes.
pub const SALT_SECRET_LEN: usize = 32;

/// Deterministic one-way transform from identifier to storage key.
pub struct Salter {
    key: hmac::Key,
}

impl Salter {
    /// Build a salter from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidSalt`] if `secret` is empty.
    pub fn new(secret: &[u8]) -> Result<Self> {
        if secret.is_empty() {
            return Err(VaultError::InvalidSalt {
                reason: "secret must not be empty".into(),
            });
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        })
    }

    /// Build a salter from a base64url (no padding) encoded secret, the
    /// format used in configuration files and `KEYWARD_SALT`.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let secret = URL_SAFE_NO_PAD
            .decode(encoded.trim())
            .map_err(|e| VaultError::InvalidSalt {
                reason: format!("not base64url: {e}"),
            })?;
        Self::new(&secret)
    }

    /// Load the backend's salt secret from `storage`, generating and
    /// persisting a fresh random one on first use.
    ///
    /// Creation goes through [`Storage::create`], so when several processes
    /// start against the same empty storage only one secret is kept and every
    /// process salts with it.
    ///
    /// # Errors
    ///
    /// Storage failures propagate as [`VaultError::Storage`].
    pub async fn load_or_create(storage: &dyn Storage) -> Result<Self> {
        if let Some(entry) = storage.get(SALT_STORAGE_KEY).await? {
            tracing::debug!("loaded salt secret from storage");
            return Self::new(&entry.value);
        }

        let secret = generate_secret()?;
        if storage
            .create(StorageEntry::new(SALT_STORAGE_KEY, secret.to_vec()))
            .await?
        {
            tracing::info!("generated new salt secret");
            return Self::new(&secret);
        }

        // Another process created it between our read and our write.
        match storage.get(SALT_STORAGE_KEY).await? {
            Some(entry) => {
                tracing::debug!("adopted salt secret created concurrently");
                Self::new(&entry.value)
            }
            None => Err(VaultError::InvalidSalt {
                reason: "salt secret removed while being created".into(),
            }),
        }
    }

    /// Salt `id` into an opaque, storage-key-safe string.
    pub fn salt_id(&self, id: &str) -> String {
        let tag = hmac::sign(&self.key, id.as_bytes());
        URL_SAFE_NO_PAD.encode(tag.as_ref())
    }
}

impl std::fmt::Debug for Salter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Salter").finish_non_exhaustive()
    }
}

/// Generate a random salt secret from the system CSPRNG.
///
/// # Errors
///
/// Returns [`VaultError::Internal`] if the CSPRNG fails.
pub fn generate_secret() -> Result<[u8; SALT_SECRET_LEN]> {
    let mut secret = [0u8; SALT_SECRET_LEN];
    SystemRandom::new()
        .fill(&mut secret)
        .map_err(|_| VaultError::Internal("failed to generate salt secret".into()))?;
    Ok(secret)
}

/// Encode a secret in the configuration format accepted by
/// [`Salter::from_encoded`].
pub fn encode_secret(secret: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(secret)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
