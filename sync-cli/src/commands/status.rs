//! Show device, log and peer state.

use anyhow::Result;
use std::path::Path;

use crate::config::DeviceConfig;

use super::{format_timestamp, open_device};

/// Run the status command.
pub async fn run(data_dir: &Path, config_path: Option<&Path>) -> Result<()> {
    println!("=== tripshare status ===");
    println!();

    if !DeviceConfig::exists(data_dir).await {
        println!("Device: NOT INITIALIZED");
        println!();
        println!("Run 'tripshare init --name <name>' to initialize.");
        return Ok(());
    }

    let device = open_device(data_dir, config_path).await?;

    println!("Device:");
    println!("  ID:   {}", device.service.device());
    println!("  Name: {}", device.config.device_name);
    println!("  Init: {}", format_timestamp(device.config.created_at));
    println!();

    let log = device.service.log();
    println!("Log:");
    println!("  Retained: {} event(s)", log.len());
    println!("  Head:     seq {}", log.head());
    if log.oldest().value() > 0 {
        println!(
            "  Oldest:   seq {} (earlier events compacted)",
            log.oldest()
        );
    }
    println!();

    let peers = device.service.peers().all();
    if peers.is_empty() {
        println!("Peers: none. Add one with 'tripshare peer add'.");
        return Ok(());
    }

    println!("Peers:");
    for peer in peers {
        let name = if peer.name.is_empty() {
            "(unnamed)"
        } else {
            &peer.name
        };
        let address = peer.address.as_deref().unwrap_or("(dials us)");
        let synced = peer
            .last_synced_at
            .map_or_else(|| "never synced".to_string(), format_timestamp);
        println!("  {:<12} {:<22} {}", name, address, synced);
        println!(
            "  {:<12} received up to {}, they acked {}",
            "", peer.received, peer.acked
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_store::PeerState;
    use sync_types::DeviceId;
    use tempfile::tempdir;

    #[tokio::test]
    async fn status_without_init() {
        let dir = tempdir().unwrap();
        run(dir.path(), None).await.unwrap();
    }

    #[tokio::test]
    async fn status_with_device() {
        let dir = tempdir().unwrap();
        DeviceConfig::new("Test Device")
            .save(dir.path())
            .await
            .unwrap();
        run(dir.path(), None).await.unwrap();
    }

    #[tokio::test]
    async fn status_with_peers_and_events() {
        let dir = tempdir().unwrap();
        DeviceConfig::new("Test Device")
            .save(dir.path())
            .await
            .unwrap();
        crate::commands::share::run(dir.path(), None, "note", None, "hi")
            .await
            .unwrap();

        let device = open_device(dir.path(), None).await.unwrap();
        device
            .service
            .peers()
            .upsert(PeerState::new(
                DeviceId::from_bytes(&[5; 32]).unwrap(),
                "laptop",
                "10.0.0.2:7530",
            ))
            .unwrap();
        drop(device);

        run(dir.path(), None).await.unwrap();
    }
}
