//! Initialize the device identity.

use anyhow::Result;
use std::path::Path;

use crate::config::{set_dir_permissions_0700, DeviceConfig};

/// Run the init command.
pub async fn run(data_dir: &Path, name: &str) -> Result<()> {
    if DeviceConfig::exists(data_dir).await {
        anyhow::bail!(
            "Device already initialized. Delete {} to reinitialize.",
            data_dir.join("device.json").display()
        );
    }

    let config = DeviceConfig::new(name);
    config.save(data_dir).await?;
    set_dir_permissions_0700(data_dir).await?;

    println!("Device initialized.");
    println!();
    println!("  Device ID: {}", config.device_id);
    println!("  Name:      {}", config.device_name);
    println!("  Data dir:  {}", data_dir.display());
    println!();
    println!("Next steps:");
    println!("  1. Record an event:       tripshare share \"On my way\"");
    println!("  2. Add another device:    tripshare peer add <device-id> <name> <address>");
    println!("  3. Answer syncs from it:  tripshare serve");

    Ok(())
}
