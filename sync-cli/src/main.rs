//! # tripshare
//!
//! Command-line tripshare device.
//!
//! Each invocation works against a data directory holding the device
//! identity, the append-only event log and the peer book. Devices
//! exchange events directly: one side runs `serve`, the other runs
//! `sync`.
//!
//! ## Example
//!
//! ```bash
//! # Initialize this device
//! tripshare init --name "Maya's phone"
//!
//! # Record something that happened
//! tripshare share --kind trip-started "Leaving for the airport"
//!
//! # Tell this device about another one
//! tripshare peer add <device-id> laptop 192.168.1.20:7530
//!
//! # Exchange events with it
//! tripshare sync laptop
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{init, log, peer, serve, share, status, sync};

/// Command-line tripshare device.
#[derive(Parser, Debug)]
#[command(name = "tripshare")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the device identity, event log and peer book
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Engine config file (defaults to <data-dir>/engine.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize this device's identity
    Init {
        /// Device name, shown to peers during the handshake
        #[arg(long, short)]
        name: String,
    },

    /// Record a trip event in the local log
    Share {
        /// Event kind: location, trip-started, trip-ended, eta-updated, note
        #[arg(long, short, default_value = "note")]
        kind: String,

        /// Trip the event belongs to (a new trip is started when omitted)
        #[arg(long, short)]
        trip: Option<String>,

        /// Event payload
        message: String,
    },

    /// Print the local event log
    Log {
        /// Start after this sequence number
        #[arg(long, default_value = "0")]
        after: u64,

        /// Maximum number of events to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Manage the peer book
    Peer {
        #[command(subcommand)]
        action: peer::Action,
    },

    /// Exchange events with one peer, or with every peer that has an address
    Sync {
        /// Peer name, device id or id prefix; all peers when omitted
        peer: Option<String>,
    },

    /// Answer sync sessions from other devices
    Serve {
        /// Listen address (overrides the configured one)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Show device, log and peer state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Init { name } => {
            init::run(&data_dir, &name).await?;
        }
        Commands::Share {
            kind,
            trip,
            message,
        } => {
            share::run(
                &data_dir,
                cli.config.as_deref(),
                &kind,
                trip.as_deref(),
                &message,
            )
            .await?;
        }
        Commands::Log { after, limit } => {
            log::run(&data_dir, cli.config.as_deref(), after, limit).await?;
        }
        Commands::Peer { action } => {
            peer::run(&data_dir, cli.config.as_deref(), action).await?;
        }
        Commands::Sync { peer } => {
            sync::run(&data_dir, cli.config.as_deref(), peer.as_deref()).await?;
        }
        Commands::Serve { bind } => {
            serve::run(&data_dir, cli.config.as_deref(), bind.as_deref()).await?;
        }
        Commands::Status => {
            status::run(&data_dir, cli.config.as_deref()).await?;
        }
    }

    Ok(())
}

/// Get the default data directory for tripshare.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("app", "tripshare", "tripshare")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
