//! Structured event emission.
//!
//! The verifier and the lease policy store report what they did as
//! [`VaultEvent`]s on an [`EventBus`] instead of logging inline. Whoever
//! owns the process (the CLI, a server, a test) subscribes and decides what
//! to do with them.
//!
//! Events carry salted keys only. A raw passcode never leaves the request
//! that supplied it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity used when configuration does not set one.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Largest channel capacity a bus is created with.
pub const MAX_EVENT_CAPACITY: usize = 1 << 16;

/// Why a verification attempt did not succeed.
///
/// Only visible to event subscribers; callers of the verifier see the same
/// `Invalid` outcome for all of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// No entry under the salted key: never issued or already consumed.
    NotFound,
    /// The entry was removed by a concurrent consumer between fetch and
    /// delete.
    LostRace,
    /// The stored record could not be decoded.
    CorruptEntry,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::LostRace => write!(f, "lost_race"),
            Self::CorruptEntry => write!(f, "corrupt_entry"),
        }
    }
}

/// An event emitted by the vault core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VaultEvent {
    /// A passcode was verified and consumed.
    PasscodeVerified {
        salted_key: String,
        username: String,
        timestamp: DateTime<Utc>,
    },

    /// A verification attempt was rejected.
    PasscodeRejected {
        salted_key: String,
        reason: RejectReason,
        /// Decoder message for [`RejectReason::CorruptEntry`].
        detail: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A passcode entry was written by the issuance path.
    PasscodeIssued {
        salted_key: String,
        timestamp: DateTime<Utc>,
    },

    /// The lease policy record was overwritten.
    LeasePolicyUpdated {
        ttl_secs: u64,
        max_ttl_secs: u64,
        timestamp: DateTime<Utc>,
    },
}

impl VaultEvent {
    /// Short machine-readable kind, useful as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PasscodeVerified { .. } => "passcode_verified",
            Self::PasscodeRejected { .. } => "passcode_rejected",
            Self::PasscodeIssued { .. } => "passcode_issued",
            Self::LeasePolicyUpdated { .. } => "lease_policy_updated",
        }
    }
}

/// Publish/subscribe bus backed by [`tokio::sync::broadcast`].
///
/// Cheaply cloneable. Publishing never fails: with no subscribers the event
/// is dropped.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<VaultEvent>>,
}

impl EventBus {
    /// Create a bus whose subscribers may lag by up to `capacity` events
    /// before they start missing some. `capacity` is clamped to
    /// `1..=MAX_EVENT_CAPACITY`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.clamp(1, MAX_EVENT_CAPACITY));
        Self { sender }
    }

    /// Publish `event`; returns how many subscribers will see it.
    pub fn publish(&self, event: VaultEvent) -> usize {
        self.sender.send(Arc::new(event)).unwrap_or(0)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<VaultEvent>> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
