//! Manage the peer book.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::Path;

use sync_store::PeerState;
use sync_types::DeviceId;

use super::{format_timestamp, open_device, resolve_peer};

/// Peer book actions.
#[derive(Subcommand, Debug)]
pub enum Action {
    /// Add a peer, or update its name and address
    Add {
        /// The peer's device id, as printed by its `init`
        device: String,
        /// Name to remember the peer by
        name: String,
        /// Dial address: `host:port` on the LAN, or a relay endpoint
        address: String,
    },
    /// List known peers
    List,
    /// Forget a peer
    Remove {
        /// Peer name, device id or id prefix
        device: String,
    },
}

/// Run a peer command.
pub async fn run(data_dir: &Path, config_path: Option<&Path>, action: Action) -> Result<()> {
    let device = open_device(data_dir, config_path).await?;

    match action {
        Action::Add {
            device: id,
            name,
            address,
        } => {
            let id = DeviceId::parse_str(&id).context("Invalid device id")?;
            anyhow::ensure!(
                id != device.service.device(),
                "That is this device's own id"
            );

            // Re-adding keeps the sync cursors so history is not resent.
            let state = match device.service.peers().get(id) {
                Some(mut existing) => {
                    existing.name = name.clone();
                    existing.address = Some(address.clone());
                    existing
                }
                None => PeerState::new(id, name.clone(), address.clone()),
            };
            device.service.peers().upsert(state)?;
            println!("Peer '{}' now dials {}.", name, address);
        }
        Action::List => {
            let peers = device.service.peers().all();
            if peers.is_empty() {
                println!("No peers. Add one with 'tripshare peer add'.");
                return Ok(());
            }
            println!("{} peer(s):", peers.len());
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
                println!("  {:<12} {}  {}", name, peer.device, synced);
                println!("  {:<12} {}", "", address);
            }
        }
        Action::Remove { device: needle } => {
            let id = resolve_peer(&device.service, &needle)?;
            if device.service.peers().remove(id)? {
                println!("Removed peer {}.", id);
            } else {
                println!("No such peer.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use sync_types::Cursor;
    use tempfile::tempdir;

    fn peer_id(byte: u8) -> DeviceId {
        DeviceId::from_bytes(&[byte; 32]).unwrap()
    }

    #[tokio::test]
    async fn add_list_remove_cycle() {
        let dir = tempdir().unwrap();
        DeviceConfig::new("owner").save(dir.path()).await.unwrap();
        let laptop = peer_id(9);

        run(
            dir.path(),
            None,
            Action::Add {
                device: laptop.to_string(),
                name: "laptop".into(),
                address: "10.0.0.2:7530".into(),
            },
        )
        .await
        .unwrap();
        run(dir.path(), None, Action::List).await.unwrap();

        let device = open_device(dir.path(), None).await.unwrap();
        let stored = device.service.peers().get(laptop).unwrap();
        assert_eq!(stored.name, "laptop");
        assert_eq!(stored.address.as_deref(), Some("10.0.0.2:7530"));

        run(
            dir.path(),
            None,
            Action::Remove {
                device: "laptop".into(),
            },
        )
        .await
        .unwrap();
        let device = open_device(dir.path(), None).await.unwrap();
        assert!(device.service.peers().get(laptop).is_none());
    }

    #[tokio::test]
    async fn re_adding_keeps_cursors() {
        let dir = tempdir().unwrap();
        DeviceConfig::new("owner").save(dir.path()).await.unwrap();
        let laptop = peer_id(9);

        let device = open_device(dir.path(), None).await.unwrap();
        let mut state = PeerState::new(laptop, "laptop", "10.0.0.2:7530");
        state.received = Cursor::new(12);
        state.acked = Cursor::new(8);
        device.service.peers().upsert(state).unwrap();
        drop(device);

        run(
            dir.path(),
            None,
            Action::Add {
                device: laptop.to_string(),
                name: "work laptop".into(),
                address: "10.0.0.99:7530".into(),
            },
        )
        .await
        .unwrap();

        let device = open_device(dir.path(), None).await.unwrap();
        let stored = device.service.peers().get(laptop).unwrap();
        assert_eq!(stored.name, "work laptop");
        assert_eq!(stored.address.as_deref(), Some("10.0.0.99:7530"));
        assert_eq!(stored.received, Cursor::new(12));
        assert_eq!(stored.acked, Cursor::new(8));
    }

    #[tokio::test]
    async fn own_id_is_rejected() {
        let dir = tempdir().unwrap();
        DeviceConfig::new("owner").save(dir.path()).await.unwrap();
        let own = open_device(dir.path(), None).await.unwrap().service.device();

        let err = run(
            dir.path(),
            None,
            Action::Add {
                device: own.to_string(),
                name: "me".into(),
                address: "127.0.0.1:7530".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("own id"));
    }
}
