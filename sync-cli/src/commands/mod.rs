//! CLI command implementations.

pub mod init;
pub mod log;
pub mod peer;
pub mod serve;
pub mod share;
pub mod status;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sync_engine::{EngineConfig, PeerService};
use sync_store::{EventLog, PeerBook};
use sync_types::DeviceId;

use crate::config::DeviceConfig;

/// An opened device: identity, engine config and the service wrapping
/// the event log and peer book.
#[derive(Debug)]
pub(crate) struct Device {
    pub config: DeviceConfig,
    pub engine: EngineConfig,
    pub service: Arc<PeerService>,
}

/// Opens everything a command needs from the data directory.
///
/// The engine config comes from `config_path` when given, from
/// `<data-dir>/engine.toml` when that file exists, and from defaults
/// otherwise.
pub(crate) async fn open_device(data_dir: &Path, config_path: Option<&Path>) -> Result<Device> {
    let config = DeviceConfig::load(data_dir).await?;
    let device = config.device_id()?;

    let engine = load_engine_config(data_dir, config_path)?;
    let log = Arc::new(
        EventLog::open(data_dir.join("events.log")).context("Failed to open the event log")?,
    );
    let peers = Arc::new(
        PeerBook::open(data_dir.join("peers.json")).context("Failed to open the peer book")?,
    );
    let service = Arc::new(PeerService::new(
        device,
        config.device_name.clone(),
        log,
        peers,
        engine.batch_limits(),
    ));

    Ok(Device {
        config,
        engine,
        service,
    })
}

fn load_engine_config(data_dir: &Path, config_path: Option<&Path>) -> Result<EngineConfig> {
    if let Some(path) = config_path {
        return Ok(EngineConfig::from_file(path)?);
    }
    let default_path = data_dir.join("engine.toml");
    if default_path.exists() {
        return Ok(EngineConfig::from_file(&default_path)?);
    }
    Ok(EngineConfig::default())
}

/// Resolves a peer given a full device id, an id prefix or a name.
pub(crate) fn resolve_peer(service: &PeerService, needle: &str) -> Result<DeviceId> {
    if let Some(id) = DeviceId::parse_str(needle) {
        return Ok(id);
    }
    let matches: Vec<_> = service
        .peers()
        .all()
        .into_iter()
        .filter(|peer| peer.name == needle || peer.device.to_string().starts_with(needle))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("No peer matches '{needle}'"),
        1 => Ok(matches[0].device),
        n => anyhow::bail!("'{needle}' is ambiguous: {n} peers match"),
    }
}

/// Renders a unix timestamp as a relative age for display.
pub(crate) fn format_timestamp(timestamp: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    let elapsed = now.saturating_sub(timestamp);
    if elapsed < 60 {
        "just now".to_string()
    } else if elapsed < 3600 {
        format!("{} minute(s) ago", elapsed / 60)
    } else if elapsed < 86400 {
        format!("{} hour(s) ago", elapsed / 3600)
    } else {
        format!("{} day(s) ago", elapsed / 86400)
    }
}
