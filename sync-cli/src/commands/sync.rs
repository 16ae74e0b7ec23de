//! Exchange events with peers.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use sync_engine::{PeerService, SyncCoordinator, SyncReport, TcpTransport};
use sync_types::DeviceId;

use super::{open_device, resolve_peer};

/// Run the sync command.
pub async fn run(data_dir: &Path, config_path: Option<&Path>, peer: Option<&str>) -> Result<()> {
    let device = open_device(data_dir, config_path).await?;
    let coordinator = SyncCoordinator::new(
        Arc::clone(&device.service),
        TcpTransport::new(),
        device.engine.clone(),
    );

    let mut failures = 0;
    match peer {
        Some(needle) => {
            let id = resolve_peer(&device.service, needle)?;
            let report = coordinator.sync_with(id).await?;
            print_report(&device.service, id, &report);
        }
        None => {
            let outcomes = coordinator.sync_all().await;
            anyhow::ensure!(
                !outcomes.is_empty(),
                "No peers with addresses. Add one with 'tripshare peer add'."
            );
            for (id, outcome) in outcomes {
                match outcome {
                    Ok(report) => print_report(&device.service, id, &report),
                    Err(err) => {
                        failures += 1;
                        println!("Sync with {} failed: {}", peer_label(&device.service, id), err);
                    }
                }
            }
        }
    }

    // Everything every peer has acknowledged can leave the local log.
    let removed = device.service.compact()?;
    if removed > 0 {
        println!("Compacted {} fully acknowledged event(s).", removed);
    }

    anyhow::ensure!(failures == 0, "{failures} sync(s) failed");
    Ok(())
}

fn print_report(service: &PeerService, peer: DeviceId, report: &SyncReport) {
    println!(
        "Synced with {}: sent {}, received {}, resolved {} conflict(s).",
        peer_label(service, peer),
        report.sent,
        report.received,
        report.conflicts
    );
}

fn peer_label(service: &PeerService, peer: DeviceId) -> String {
    match service.peers().get(peer) {
        Some(state) if !state.name.is_empty() => state.name,
        _ => peer.to_string(),
    }
}
