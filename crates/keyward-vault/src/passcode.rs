//! Passcode entries and their storage adapter.
//!
//! A passcode entry binds a single-use passcode to the identity it was issued
//! for. It is stored as JSON at `otp/<salted passcode>`:
//!
//! ```json
//! { "username": "deploy", "ip": "10.0.0.7" }
//! ```
//!
//! The raw passcode is never written anywhere; [`PasscodeStore`] salts it
//! before every storage access.

use std::sync::Arc;

use keyward_store::{Storage, StorageEntry};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::salt::Salter;

/// Storage prefix for passcode entries.
pub const OTP_PREFIX: &str = "otp/";

/// Identity bound to an issued passcode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasscodeEntry {
    /// Account the passcode grants access to.
    pub username: String,

    /// Address the connection is expected from.
    #[serde(rename = "ip")]
    pub source_address: String,
}

impl PasscodeEntry {
    pub fn new(username: impl Into<String>, source_address: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            source_address: source_address.into(),
        }
    }
}

/// Result of looking up a salted key.
#[derive(Debug)]
pub enum StoredPasscode {
    /// Nothing is stored under the key.
    Absent,
    /// An entry exists and decodes.
    Pending(PasscodeEntry),
    /// An entry exists but is not a valid passcode record.
    Corrupt { reason: String },
}

/// Thin adapter over [`Storage`] for passcode entries.
#[derive(Clone)]
pub struct PasscodeStore {
    storage: Arc<dyn Storage>,
    salter: Arc<Salter>,
}

impl PasscodeStore {
    pub fn new(storage: Arc<dyn Storage>, salter: Arc<Salter>) -> Self {
        Self { storage, salter }
    }

    /// Salted key for `raw_passcode` (without the `otp/` prefix).
    pub fn salted_key(&self, raw_passcode: &str) -> String {
        self.salter.salt_id(raw_passcode)
    }

    /// Write an entry for a caller-chosen passcode, replacing any entry
    /// already stored for it. This is the issuance side of the contract.
    pub async fn insert(&self, raw_passcode: &str, entry: &PasscodeEntry) -> Result<()> {
        let path = storage_path(&self.salted_key(raw_passcode));
        self.storage.put(StorageEntry::json(path, entry)?).await?;
        Ok(())
    }

    /// Fetch and decode the entry stored under `salted_key`.
    ///
    /// Decode failures are reported as [`StoredPasscode::Corrupt`] rather than
    /// as errors; storage failures are errors.
    pub async fn fetch(&self, salted_key: &str) -> Result<StoredPasscode> {
        let Some(entry) = self.storage.get(&storage_path(salted_key)).await? else {
            return Ok(StoredPasscode::Absent);
        };

        Ok(match entry.decode_json::<PasscodeEntry>() {
            Ok(record) => StoredPasscode::Pending(record),
            Err(e) => StoredPasscode::Corrupt {
                reason: e.to_string(),
            },
        })
    }

    /// Remove the entry under `salted_key`. Returns `true` only if this
    /// call removed it.
    pub async fn remove(&self, salted_key: &str) -> Result<bool> {
        Ok(self.storage.delete(&storage_path(salted_key)).await?)
    }
}

fn storage_path(salted_key: &str) -> String {
    format!("{OTP_PREFIX}{salted_key}")
}
