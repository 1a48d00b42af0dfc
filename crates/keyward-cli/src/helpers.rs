//! Shared helper functions used across CLI subcommands.

use keyward_vault::{EventBus, VaultEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Log every vault event until the bus is dropped.
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(missed)) => warn!(missed, "event logger lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &VaultEvent) {
    match event {
        VaultEvent::PasscodeVerified {
            salted_key,
            username,
            ..
        } => info!(kind = event.kind(), %salted_key, %username, "passcode verified"),
        VaultEvent::PasscodeRejected {
            salted_key,
            reason,
            detail,
            ..
        } => match detail {
            Some(detail) => {
                warn!(kind = event.kind(), %salted_key, %reason, %detail, "passcode rejected");
            }
            None => info!(kind = event.kind(), %salted_key, %reason, "passcode rejected"),
        },
        VaultEvent::PasscodeIssued { salted_key, .. } => {
            info!(kind = event.kind(), %salted_key, "passcode issued");
        }
        VaultEvent::LeasePolicyUpdated {
            ttl_secs,
            max_ttl_secs,
            ..
        } => info!(kind = event.kind(), ttl_secs, max_ttl_secs, "lease policy updated"),
    }
}
