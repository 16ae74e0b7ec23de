//! Engine configuration loaded from a TOML file.
//!
//! Every field has a default, so a missing file, an empty file, and a
//! file that only overrides one value all produce a working config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use sync_core::RetryPolicy;

use crate::service::BatchLimits;

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Sync round behavior.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Retry backoff for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Inbound listener settings.
    #[serde(default)]
    pub listen: ListenConfig,
}

/// Settings for outbound sync rounds.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Deadline for a whole sync round, retries included.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Most events sent in one batch.
    #[serde(default = "default_batch_events")]
    pub batch_events: u32,
    /// Soft byte budget for one batch.
    #[serde(default = "default_batch_bytes")]
    pub batch_bytes: usize,
}

/// Settings for the retry backoff schedule.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// First retry delay in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub base_ms: u64,
    /// Ceiling on any retry delay in milliseconds.
    #[serde(default = "default_retry_cap_ms")]
    pub cap_ms: u64,
    /// Attempts allowed before giving up.
    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,
}

/// Settings for the inbound peer listener.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address the listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// How long an inbound session may take to say hello.
    #[serde(default = "default_hello_timeout_secs")]
    pub hello_timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_events() -> u32 {
    64
}

fn default_batch_bytes() -> usize {
    512 * 1024
}

fn default_retry_base_ms() -> u64 {
    1_000
}

fn default_retry_cap_ms() -> u64 {
    60_000
}

fn default_retry_max_attempts() -> u32 {
    5
}

fn default_bind_address() -> String {
    "0.0.0.0:7530".to_string()
}

fn default_hello_timeout_secs() -> u64 {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            timeout_secs: default_timeout_secs(),
            batch_events: default_batch_events(),
            batch_bytes: default_batch_bytes(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            base_ms: default_retry_base_ms(),
            cap_ms: default_retry_cap_ms(),
            max_attempts: default_retry_max_attempts(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        ListenConfig {
            bind_address: default_bind_address(),
            hello_timeout_secs: default_hello_timeout_secs(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sync: SyncConfig::default(),
            retry: RetryConfig::default(),
            listen: ListenConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Deadline for one full sync round.
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.timeout_secs)
    }

    /// Deadline for an inbound session to introduce itself.
    pub fn hello_timeout(&self) -> Duration {
        Duration::from_secs(self.listen.hello_timeout_secs)
    }

    /// Backoff schedule built from the retry section.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.retry.base_ms),
            Duration::from_millis(self.retry.cap_ms),
            self.retry.max_attempts,
        )
    }

    /// Batch limits built from the sync section.
    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_events: self.sync.batch_events,
            byte_budget: self.sync.batch_bytes,
        }
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },
}
