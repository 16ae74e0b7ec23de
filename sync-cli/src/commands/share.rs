//! Record a trip event in the local log.

use anyhow::{Context, Result};
use std::path::Path;

use sync_types::{EventKind, ResourceId};

use super::open_device;

/// Run the share command.
pub async fn run(
    data_dir: &Path,
    config_path: Option<&Path>,
    kind: &str,
    trip: Option<&str>,
    message: &str,
) -> Result<()> {
    let kind = EventKind::parse(kind).with_context(|| {
        format!(
            "Unknown event kind '{kind}'. \
             One of: location, trip-started, trip-ended, eta-updated, note"
        )
    })?;

    let device = open_device(data_dir, config_path).await?;

    let (resource, fresh_trip) = match trip {
        Some(text) => {
            let id = ResourceId::parse_str(text).context("Invalid trip id")?;
            (id, false)
        }
        None => (ResourceId::new(), true),
    };

    let cursor = device
        .service
        .record(resource, kind, message.as_bytes().to_vec())?;

    println!("Recorded a {} event.", kind.as_str());
    if fresh_trip {
        println!("  Trip: {} (new)", resource);
    } else {
        println!("  Trip: {}", resource);
    }
    println!("  Seq:  {}", cursor);
    println!();
    println!("It will reach other devices on the next sync.");

    Ok(())
}
