//! Single-use passcode verification.
//!
//! # State machine
//!
//! For one passcode value:
//!
//! ```text
//!   Unknown ──issue──▶ Pending ──verify──▶ Consumed (observed as Unknown)
//! ```
//!
//! `Unknown` covers both "never issued" and "already consumed". Callers
//! cannot tell them apart, nor tell them from a corrupt entry: every
//! failure is [`VerifyOutcome::Invalid`].
//!
//! # At-most-once
//!
//! Fetch and delete are two storage calls. Two guards keep them from
//! admitting the same passcode twice:
//!
//! 1. a per-salted-key lock ([`KeyLocks`]) serializes verifications of the
//!    same passcode within this process;
//! 2. success requires that *our* delete removed the entry, so a consumer in
//!    another process sharing the storage cannot also win.

use std::sync::Arc;

use chrono::Utc;
use keyward_store::Storage;

use crate::error::{Result, VaultError};
use crate::events::{EventBus, RejectReason, VaultEvent};
use crate::locks::KeyLocks;
use crate::passcode::{PasscodeEntry, PasscodeStore, StoredPasscode};
use crate::salt::Salter;

/// Identity returned by a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub username: String,
    pub source_address: String,
}

impl From<PasscodeEntry> for VerifiedIdentity {
    fn from(entry: PasscodeEntry) -> Self {
        Self {
            username: entry.username,
            source_address: entry.source_address,
        }
    }
}

/// Outcome of [`Verifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The passcode was pending and has now been consumed.
    Verified(VerifiedIdentity),
    /// Unknown, already used, or unreadable.
    Invalid,
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified(_))
    }
}

/// Consume-once passcode verifier.
///
/// Cheaply cloneable; clones share the lock table, so all clones together
/// uphold the at-most-once guarantee.
#[derive(Clone)]
pub struct Verifier {
    store: PasscodeStore,
    locks: KeyLocks,
    events: EventBus,
}

impl Verifier {
    /// Build a verifier over `storage`, salting with `salter` and reporting
    /// to `events`.
    pub fn new(storage: Arc<dyn Storage>, salter: Arc<Salter>, events: EventBus) -> Self {
        Self {
            store: PasscodeStore::new(storage, salter),
            locks: KeyLocks::new(),
            events,
        }
    }

    /// The passcode store this verifier consumes from.
    pub fn store(&self) -> &PasscodeStore {
        &self.store
    }

    /// Issue-side helper: store `entry` for a caller-chosen passcode.
    pub async fn issue(&self, raw_passcode: &str, entry: &PasscodeEntry) -> Result<()> {
        validate_passcode(raw_passcode)?;
        let salted_key = self.store.salted_key(raw_passcode);

        let _guard = self.locks.lock(&salted_key).await;
        self.store.insert(raw_passcode, entry).await?;

        self.events.publish(VaultEvent::PasscodeIssued {
            salted_key,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Verify `raw_passcode`, consuming it on success.
    ///
    /// # Errors
    ///
    /// - [`VaultError::MalformedRequest`] if the passcode is empty; no
    ///   storage access happens.
    /// - [`VaultError::Storage`] if fetching or deleting fails. Such failures
    ///   are never reported as `Invalid`.
    pub async fn verify(&self, raw_passcode: &str) -> Result<VerifyOutcome> {
        validate_passcode(raw_passcode)?;
        let salted_key = self.store.salted_key(raw_passcode);

        let _guard = self.locks.lock(&salted_key).await;

        let entry = match self.store.fetch(&salted_key).await? {
            StoredPasscode::Pending(entry) => entry,
            StoredPasscode::Absent => {
                self.reject(salted_key, RejectReason::NotFound, None);
                return Ok(VerifyOutcome::Invalid);
            }
            // Corrupt entries are not removed.
            StoredPasscode::Corrupt { reason } => {
                self.reject(salted_key, RejectReason::CorruptEntry, Some(reason));
                return Ok(VerifyOutcome::Invalid);
            }
        };

        if !self.store.remove(&salted_key).await? {
            self.reject(salted_key, RejectReason::LostRace, None);
            return Ok(VerifyOutcome::Invalid);
        }

        self.events.publish(VaultEvent::PasscodeVerified {
            salted_key,
            username: entry.username.clone(),
            timestamp: Utc::now(),
        });
        Ok(VerifyOutcome::Verified(entry.into()))
    }

    fn reject(&self, salted_key: String, reason: RejectReason, detail: Option<String>) {
        self.events.publish(VaultEvent::PasscodeRejected {
            salted_key,
            reason,
            detail,
            timestamp: Utc::now(),
        });
    }
}

fn validate_passcode(raw_passcode: &str) -> Result<()> {
    if raw_passcode.trim().is_empty() {
        return Err(VaultError::malformed("otp", "passcode must not be empty"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
