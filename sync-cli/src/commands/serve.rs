//! Answer sync sessions from other devices.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use sync_engine::PeerListener;

use super::open_device;

/// Run the serve command.
pub async fn run(data_dir: &Path, config_path: Option<&Path>, bind: Option<&str>) -> Result<()> {
    let device = open_device(data_dir, config_path).await?;

    let mut config = device.engine.clone();
    if let Some(address) = bind {
        config.listen.bind_address = address.to_string();
    }

    let listener = PeerListener::bind(Arc::clone(&device.service), &config)
        .await
        .with_context(|| format!("Failed to listen on {}", config.listen.bind_address))?;

    println!("Answering sync sessions on {}.", listener.local_addr()?);
    println!();
    println!("  Device: {} ({})", device.config.device_name, device.service.device());
    println!("  Peers dial this address with 'tripshare peer add'.");
    println!();
    println!("Press Ctrl+C to stop.");

    tokio::select! {
        outcome = listener.run() => outcome?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            println!("Stopped.");
        }
    }

    Ok(())
}
