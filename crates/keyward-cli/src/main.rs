//! CLI entry point for Keyward.
//!
//! This binary wires configuration, logging and storage to the vault's
//! operation surface: verify a passcode, issue one, and read or write the
//! lease policy.

mod cli;
mod helpers;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use keyward_vault::{
    Backend, DurationInput, LeaseWriteRequest, PasscodeEntry, VaultConfig, VerifyRequest,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, LeaseAction};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    helpers::init_tracing(&config.log.level);

    let backend = Backend::from_config(&config)
        .await
        .context("failed to initialize backend")?;
    let logger = helpers::spawn_event_logger(backend.events());

    let code = match cli.command {
        Commands::Verify { otp } => cmd_verify(&backend, otp).await,
        Commands::Issue { otp, username, ip } => cmd_issue(&backend, &otp, username, ip).await,
        Commands::Lease { action } => cmd_lease(&backend, action).await,
        Commands::Salt { id } => cmd_salt(&backend, &id),
    };

    // Dropping the last sender closes the bus; the logger drains and exits.
    drop(backend);
    logger.await.ok();

    code
}

fn load_config(path: Option<&Path>) -> Result<VaultConfig> {
    let mut config = match path {
        Some(path) => VaultConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VaultConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

// ---------------------------------------------------------------------------
// Subcommands
// ---------------------------------------------------------------------------

async fn cmd_verify(backend: &Backend, otp: String) -> Result<ExitCode> {
    let response = backend
        .verify(VerifyRequest { otp: Some(otp) })
        .await
        .context("verification failed")?;

    match response {
        Some(response) => {
            print_json(&response)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("invalid");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn cmd_issue(
    backend: &Backend,
    otp: &str,
    username: String,
    ip: String,
) -> Result<ExitCode> {
    backend
        .insert_passcode(otp, &PasscodeEntry::new(username, ip))
        .await
        .context("failed to store passcode")?;
    info!("passcode stored");
    Ok(ExitCode::SUCCESS)
}

async fn cmd_lease(backend: &Backend, action: LeaseAction) -> Result<ExitCode> {
    match action {
        LeaseAction::Read => match backend
            .read_lease()
            .await
            .context("failed to read lease policy")?
        {
            Some(policy) => print_json(&policy)?,
            None => println!("no lease policy configured"),
        },
        LeaseAction::Write { ttl, max_ttl } => {
            let request = LeaseWriteRequest {
                ttl: ttl.map(DurationInput::Text),
                max_ttl: max_ttl.map(DurationInput::Text),
            };
            let written = backend
                .write_lease(request)
                .await
                .context("failed to write lease policy")?;
            print_json(&written)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_salt(backend: &Backend, id: &str) -> Result<ExitCode> {
    println!("{}", backend.verifier().store().salted_key(id));
    Ok(ExitCode::SUCCESS)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    debug!(bytes = rendered.len(), "printing response");
    println!("{rendered}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
