//! Lease policy for credentials issued by the backend.
//!
//! The policy is a single record at [`LEASE_STORAGE_KEY`]:
//!
//! ```json
//! { "ttl": 3600, "max_ttl": 7200 }
//! ```
//!
//! `ttl` is how long an issued lease lasts before it must be renewed;
//! `max_ttl` is the age past which renewal is refused. A zero value means
//! "unset": the lease engine falls back to its system default.
//!
//! The store only persists the record. Revocation and renewal belong to the
//! lease engine, which can use [`LeasePolicy::effective_ttl`] and
//! [`LeasePolicy::renewal_allowed`] to apply it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use keyward_store::{Storage, StorageEntry};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VaultError};
use crate::events::{EventBus, VaultEvent};

/// Fixed storage key of the lease policy record.
pub const LEASE_STORAGE_KEY: &str = "config/lease";

/// Renewal and expiry policy for issued credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeasePolicy {
    /// Renewal interval.
    #[serde(with = "duration_secs")]
    pub ttl: Duration,

    /// Maximum lifetime.
    #[serde(with = "duration_secs")]
    pub max_ttl: Duration,
}

impl LeasePolicy {
    /// Build a policy, enforcing `ttl <= max_ttl` when `max_ttl` is set.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::MalformedRequest`] on `ttl > max_ttl`.
    pub fn new(ttl: Duration, max_ttl: Duration) -> Result<Self> {
        if !max_ttl.is_zero() && ttl > max_ttl {
            return Err(VaultError::malformed(
                "ttl",
                format!(
                    "ttl ({}s) must not exceed max_ttl ({}s)",
                    ttl.as_secs(),
                    max_ttl.as_secs()
                ),
            ));
        }
        Ok(Self { ttl, max_ttl })
    }

    /// Clamp a requested lease duration to the renewal interval.
    ///
    /// A zero `requested` asks for the policy value; a zero `ttl` imposes no
    /// clamp.
    pub fn effective_ttl(&self, requested: Duration) -> Duration {
        match (requested.is_zero(), self.ttl.is_zero()) {
            (true, _) => self.ttl,
            (false, true) => requested,
            (false, false) => requested.min(self.ttl),
        }
    }

    /// Whether a credential of the given age may still be renewed.
    pub fn renewal_allowed(&self, age: Duration) -> bool {
        self.max_ttl.is_zero() || age <= self.max_ttl
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Persists the single lease policy record.
#[derive(Clone)]
pub struct LeasePolicyStore {
    storage: Arc<dyn Storage>,
    events: EventBus,
}

impl LeasePolicyStore {
    pub fn new(storage: Arc<dyn Storage>, events: EventBus) -> Self {
        Self { storage, events }
    }

    /// Overwrite the policy with both fields.
    pub async fn update(&self, ttl: Duration, max_ttl: Duration) -> Result<LeasePolicy> {
        let policy = LeasePolicy::new(ttl, max_ttl)?;
        self.storage
            .put(StorageEntry::json(LEASE_STORAGE_KEY, &policy)?)
            .await?;

        self.events.publish(VaultEvent::LeasePolicyUpdated {
            ttl_secs: policy.ttl.as_secs(),
            max_ttl_secs: policy.max_ttl.as_secs(),
            timestamp: Utc::now(),
        });
        Ok(policy)
    }

    /// Current policy, or `None` if none has ever been written.
    ///
    /// # Errors
    ///
    /// Storage failures, and a stored record that does not decode.
    pub async fn read(&self) -> Result<Option<LeasePolicy>> {
        let Some(entry) = self.storage.get(LEASE_STORAGE_KEY).await? else {
            return Ok(None);
        };
        Ok(Some(entry.decode_json()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
