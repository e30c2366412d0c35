//! Truce command-line client entry point

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use truce_client::{IdentityStore, PeerIdentity, RelayConfig};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    setup_logging(cli.verbose);

    // Load configuration and identity
    let config = load_configuration(&cli)?;
    let identity = load_identity(&cli)?;
    info!(peer_id = %identity.peer_id, name = %identity.display_name, relay = %config.url, "starting");

    match cli.command {
        Commands::Listen { auto_vote } => {
            commands::listen(config, identity, auto_vote.map(Into::into)).await
        }
        Commands::Request {
            peer,
            kind,
            duration,
            title,
            timeout,
        } => commands::request(config, identity, peer, kind.into(), duration, title, timeout).await,
        Commands::Alert { peer, kind } => {
            commands::alert(config, identity, peer, kind.into()).await
        }
        Commands::Peers => commands::peers(config, identity).await,
    }
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults, with the relay URL flag
/// taking precedence over both
fn load_configuration(cli: &Cli) -> Result<RelayConfig> {
    let mut config = if let Some(config_path) = &cli.config {
        info!("loading configuration from {config_path}");
        RelayConfig::load_from_file(config_path)
            .with_context(|| format!("failed to load configuration from {config_path}"))?
    } else {
        RelayConfig::default()
    };

    if let Some(relay) = &cli.relay {
        config.url = relay.clone();
    }
    config.validate().context("invalid relay configuration")?;
    Ok(config)
}

/// Resolve the local identity, honoring the identity file and display name
/// overrides
fn load_identity(cli: &Cli) -> Result<PeerIdentity> {
    let store = match &cli.identity_file {
        Some(path) => IdentityStore::new(path),
        None => IdentityStore::default_location()?,
    };
    let mut identity = store
        .load_or_create()
        .context("failed to resolve local identity")?;

    if let Some(name) = &cli.name {
        identity.display_name = name.clone();
    }
    Ok(identity)
}
