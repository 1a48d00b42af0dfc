//! Operation surface handed to the transport layer.
//!
//! [`Backend`] owns one verifier and one lease policy store over a shared
//! storage engine and translates request/response shapes:
//!
//! | operation          | request              | response                         |
//! |--------------------|----------------------|----------------------------------|
//! | verify             | `{ "otp" }`          | `{ username, ip, valid: "yes" }` or absent |
//! | read lease policy  | —                    | `{ ttl, max_ttl }` or absent     |
//! | write lease policy | `{ ttl?, max_ttl? }` | —                                |
//!
//! Absent responses are `None`. An absent verify response means "invalid"
//! whatever the underlying reason.

use std::sync::Arc;
use std::time::Duration;

use keyward_store::{InMemoryStorage, SqliteStorage, Storage};
use serde::{Deserialize, Serialize};

use crate::config::VaultConfig;
use crate::duration::DurationInput;
use crate::error::{Result, VaultError};
use crate::events::EventBus;
use crate::lease::{LeasePolicy, LeasePolicyStore};
use crate::passcode::PasscodeEntry;
use crate::salt::Salter;
use crate::verifier::{Verifier, VerifyOutcome};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Verify request body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub otp: Option<String>,
}

/// Successful verify response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub username: String,
    pub ip: String,
    /// Always `"yes"`.
    pub valid: String,
}

/// Lease policy write body. Missing fields mean zero ("unset").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaseWriteRequest {
    pub ttl: Option<DurationInput>,
    pub max_ttl: Option<DurationInput>,
}

/// Lease policy read response body, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseResponse {
    pub ttl: u64,
    pub max_ttl: u64,
}

impl From<LeasePolicy> for LeaseResponse {
    fn from(policy: LeasePolicy) -> Self {
        Self {
            ttl: policy.ttl.as_secs(),
            max_ttl: policy.max_ttl.as_secs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Verify and lease policy operations over one storage engine.
#[derive(Clone)]
pub struct Backend {
    storage: Arc<dyn Storage>,
    verifier: Verifier,
    leases: LeasePolicyStore,
    events: EventBus,
}

impl Backend {
    /// Wire a backend from its collaborators.
    pub fn new(storage: Arc<dyn Storage>, salter: Arc<Salter>, events: EventBus) -> Self {
        Self {
            verifier: Verifier::new(Arc::clone(&storage), salter, events.clone()),
            leases: LeasePolicyStore::new(Arc::clone(&storage), events.clone()),
            storage,
            events,
        }
    }

    /// Build a backend from configuration: open the configured storage and
    /// resolve the salt secret.
    pub async fn from_config(config: &VaultConfig) -> Result<Self> {
        config.validate()?;
        let storage: Arc<dyn Storage> = match &config.storage.path {
            Some(path) => Arc::new(SqliteStorage::open_async(path).await?),
            None => {
                tracing::warn!("no storage path configured, records are not durable");
                Arc::new(InMemoryStorage::new())
            }
        };

        let salter = match &config.salt.secret {
            Some(encoded) => Salter::from_encoded(encoded)?,
            None => Salter::load_or_create(storage.as_ref()).await?,
        };

        Ok(Self::new(
            storage,
            Arc::new(salter),
            EventBus::new(config.events.capacity),
        ))
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    pub fn leases(&self) -> &LeasePolicyStore {
        &self.leases
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Verify and consume a passcode.
    ///
    /// # Errors
    ///
    /// [`VaultError::MalformedRequest`] when `otp` is missing or empty;
    /// storage failures.
    pub async fn verify(&self, request: VerifyRequest) -> Result<Option<VerifyResponse>> {
        let otp = request
            .otp
            .ok_or_else(|| VaultError::malformed("otp", "missing field"))?;

        Ok(match self.verifier.verify(&otp).await? {
            VerifyOutcome::Verified(identity) => Some(VerifyResponse {
                username: identity.username,
                ip: identity.source_address,
                valid: "yes".into(),
            }),
            VerifyOutcome::Invalid => None,
        })
    }

    /// Store a passcode entry for a caller-chosen passcode.
    pub async fn insert_passcode(&self, otp: &str, entry: &PasscodeEntry) -> Result<()> {
        self.verifier.issue(otp, entry).await
    }

    /// Current lease policy, or `None` if never written.
    pub async fn read_lease(&self) -> Result<Option<LeaseResponse>> {
        Ok(self.leases.read().await?.map(LeaseResponse::from))
    }

    /// Overwrite the lease policy.
    pub async fn write_lease(&self, request: LeaseWriteRequest) -> Result<LeaseResponse> {
        let ttl = resolve_or_zero(request.ttl.as_ref(), "ttl")?;
        let max_ttl = resolve_or_zero(request.max_ttl.as_ref(), "max_ttl")?;

        let policy = self.leases.update(ttl, max_ttl).await?;
        Ok(policy.into())
    }
}

fn resolve_or_zero(input: Option<&DurationInput>, field: &'static str) -> Result<Duration> {
    input.map_or(Ok(Duration::ZERO), |input| input.resolve(field))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> Backend {
        Backend::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(Salter::new(b"backend-tests").unwrap()),
            EventBus::new(8),
        )
    }

    #[tokio::test]
    async fn verify_response_shape() {
        let backend = backend();
        backend
            .insert_passcode("654321", &PasscodeEntry::new("deploy", "10.0.0.7"))
            .await
            .unwrap();

        let response = backend
            .verify(VerifyRequest {
                otp: Some("654321".into()),
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            serde_json::json!({ "username": "deploy", "ip": "10.0.0.7", "valid": "yes" })
        );
    }

    #[tokio::test]
    async fn missing_otp_is_malformed() {
        let backend = backend();
        let result = backend.verify(VerifyRequest::default()).await;
        assert!(matches!(
            result,
            Err(VaultError::MalformedRequest { field: "otp", .. })
        ));
    }

    #[tokio::test]
    async fn lease_write_accepts_strings_and_numbers() {
        let backend = backend();
        let request: LeaseWriteRequest =
            serde_json::from_value(serde_json::json!({ "ttl": "1h", "max_ttl": 7200 })).unwrap();
        backend.write_lease(request).await.unwrap();

        assert_eq!(
            backend.read_lease().await.unwrap(),
            Some(LeaseResponse {
                ttl: 3600,
                max_ttl: 7200
            })
        );
    }

    #[tokio::test]
    async fn lease_write_missing_fields_are_zero() {
        let backend = backend();
        let written = backend
            .write_lease(LeaseWriteRequest {
                ttl: Some(DurationInput::Seconds(60)),
                max_ttl: None,
            })
            .await
            .unwrap();
        assert_eq!(written, LeaseResponse { ttl: 60, max_ttl: 0 });
    }

    #[tokio::test]
    async fn lease_write_rejects_bad_duration() {
        let backend = backend();
        let result = backend
            .write_lease(LeaseWriteRequest {
                ttl: Some(DurationInput::from("forever")),
                max_ttl: None,
            })
            .await;
        assert!(matches!(
            result,
            Err(VaultError::MalformedRequest { field: "ttl", .. })
        ));
        assert_eq!(backend.read_lease().await.unwrap(), None);
    }

    #[tokio::test]
    async fn from_config_in_memory_creates_salt() {
        let backend = Backend::from_config(&VaultConfig::default()).await.unwrap();
        let salt = backend.storage().get(crate::salt::SALT_STORAGE_KEY).await.unwrap();
        assert!(salt.is_some());
    }

    #[tokio::test]
    async fn from_config_rejects_oversized_event_capacity() {
        let mut config = VaultConfig::default();
        config.events.capacity = usize::MAX;
        let result = Backend::from_config(&config).await;
        assert!(matches!(result, Err(VaultError::Config { .. })));
    }

    #[tokio::test]
    async fn from_config_with_explicit_salt_stores_nothing() {
        let mut config = VaultConfig::default();
        config.salt.secret = Some(crate::salt::encode_secret(b"explicit"));

        let backend = Backend::from_config(&config).await.unwrap();
        let salt = backend.storage().get(crate::salt::SALT_STORAGE_KEY).await.unwrap();
        assert!(salt.is_none());
    }
}
