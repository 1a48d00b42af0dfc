//! Single-use passcode verification and lease policy core for Keyward.
//!
//! Two independent subsystems share a storage engine and nothing else:
//!
//! - **Passcode verification**: a remote agent submits a passcode; the
//!   [`Verifier`] salts it, looks up the bound identity, deletes the entry
//!   and returns the identity. A passcode verifies at most once, also under
//!   concurrent attempts.
//! - **Lease policy**: the [`LeasePolicyStore`] persists the `{ttl, max_ttl}`
//!   record consumed by the lease engine.
//!
//! # Modules
//!
//! - [`salt`] — HMAC-SHA256 salting of passcodes into storage keys.
//! - [`locks`] — per-key async lock table.
//! - [`passcode`] — passcode entry record and its storage adapter.
//! - [`verifier`] — the consume-once state machine.
//! - [`lease`] — lease policy record and store.
//! - [`duration`] — duration inputs (`3600`, `"1h30m"`).
//! - [`events`] — structured event bus.
//! - [`config`] — TOML configuration with environment overrides.
//! - [`backend`] — request/response surface for the transport layer.
//! - [`error`] — unified error type.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use keyward_store::InMemoryStorage;
//! use keyward_vault::{Backend, EventBus, PasscodeEntry, Salter, VerifyRequest};
//!
//! # async fn example() -> keyward_vault::Result<()> {
//! let backend = Backend::new(
//!     Arc::new(InMemoryStorage::new()),
//!     Arc::new(Salter::new(b"per-backend-secret")?),
//!     EventBus::default(),
//! );
//!
//! backend
//!     .insert_passcode("482913", &PasscodeEntry::new("deploy", "10.0.0.7"))
//!     .await?;
//!
//! let first = backend.verify(VerifyRequest { otp: Some("482913".into()) }).await?;
//! assert_eq!(first.map(|r| r.username), Some("deploy".to_string()));
//!
//! let second = backend.verify(VerifyRequest { otp: Some("482913".into()) }).await?;
//! assert!(second.is_none());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod duration;
pub mod error;
pub mod events;
pub mod lease;
pub mod locks;
pub mod passcode;
pub mod salt;
pub mod verifier;

// Re-export the most commonly used types at the crate root for convenience.
pub use backend::{Backend, LeaseResponse, LeaseWriteRequest, VerifyRequest, VerifyResponse};
pub use config::VaultConfig;
pub use duration::DurationInput;
pub use error::{Result, VaultError};
pub use events::{EventBus, RejectReason, VaultEvent};
pub use lease::{LeasePolicy, LeasePolicyStore};
pub use passcode::{PasscodeEntry, PasscodeStore};
pub use salt::Salter;
pub use verifier::{VerifiedIdentity, Verifier, VerifyOutcome};
