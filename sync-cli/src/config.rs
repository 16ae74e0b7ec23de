//! Device identity stored in the data directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use sync_types::DeviceId;

/// Identity of this device, stored as `device.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier.
    pub device_id: String,
    /// Human-readable device name.
    pub device_name: String,
    /// When the device was initialized (unix seconds).
    pub created_at: u64,
}

impl DeviceConfig {
    /// Create a fresh identity with a random device id.
    pub fn new(name: &str) -> Self {
        Self {
            device_id: DeviceId::random().to_string(),
            device_name: name.to_string(),
            created_at: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0),
        }
    }

    /// The parsed device id.
    pub fn device_id(&self) -> Result<DeviceId> {
        DeviceId::parse_str(&self.device_id).context("Invalid device id in device.json")
    }

    /// Load the identity from a data directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("device.json");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Device not initialized. Run 'tripshare init' first.")?;
        serde_json::from_str(&contents).context("Invalid device configuration")
    }

    /// Save the identity into a data directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join("device.json");
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save device configuration")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Check if the device is initialized.
    pub async fn exists(data_dir: &Path) -> bool {
        tokio::fs::try_exists(data_dir.join("device.json"))
            .await
            .unwrap_or(false)
    }
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
