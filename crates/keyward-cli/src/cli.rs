//! CLI argument definitions for Keyward.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Keyward -- single-use passcode verification and lease policy backend.
#[derive(Parser)]
#[command(
    name = "keyward",
    version,
    about = "Keyward -- single-use passcode verification and lease policy backend",
    long_about = "Verifies one-time passcodes exactly once and stores the lease policy \
                  applied to credentials issued by the backend."
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, short, env = "KEYWARD_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Verify a passcode, consuming it on success.
    Verify {
        /// The one-time passcode presented by the client.
        #[arg(long)]
        otp: String,
    },

    /// Store a passcode entry for a caller-chosen passcode.
    Issue {
        /// The one-time passcode to register.
        #[arg(long)]
        otp: String,

        /// Account the passcode grants access to.
        #[arg(long)]
        username: String,

        /// Address the connection is expected from.
        #[arg(long)]
        ip: String,
    },

    /// Read or write the lease policy.
    Lease {
        #[command(subcommand)]
        action: LeaseAction,
    },

    /// Print the salted storage key for an identifier.
    Salt {
        /// Identifier to salt.
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LeaseAction {
    /// Show the current lease policy.
    Read,

    /// Overwrite the lease policy.
    Write {
        /// Renewal interval: seconds or a duration such as "1h".
        #[arg(long)]
        ttl: Option<String>,

        /// Maximum lifetime: seconds or a duration such as "24h".
        #[arg(long)]
        max_ttl: Option<String>,
    },
}
