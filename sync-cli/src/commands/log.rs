//! Print the local event log.

use anyhow::Result;
use std::path::Path;

use sync_types::Cursor;

use super::{format_timestamp, open_device};

/// Run the log command.
pub async fn run(
    data_dir: &Path,
    config_path: Option<&Path>,
    after: u64,
    limit: usize,
) -> Result<()> {
    let device = open_device(data_dir, config_path).await?;
    let log = device.service.log();

    if log.is_empty() {
        println!("No events recorded. Try 'tripshare share \"hello\"'.");
        return Ok(());
    }

    let oldest = log.oldest().value();
    if after < oldest {
        println!(
            "Events up to seq {} were compacted away; starting from there.",
            oldest
        );
    }
    let start = Cursor::new(after.max(oldest));

    let mut shown = 0;
    for record in log.since(start)?.take(limit) {
        let event = &record.event;
        println!(
            "[{:>5}] {:<12} trip {}  from {}#{:<4} {:>5}B  {}",
            record.seq,
            event.kind.as_str(),
            short(&event.resource.to_string()),
            short(&event.device().to_string()),
            event.counter(),
            event.payload.len(),
            format_timestamp(event.recorded_at),
        );
        shown += 1;
    }

    println!();
    println!(
        "{} of {} retained event(s), head at seq {}.",
        shown,
        log.len(),
        log.head()
    );
    Ok(())
}

fn short(id: &str) -> String {
    id.chars().take(8).collect()
}
