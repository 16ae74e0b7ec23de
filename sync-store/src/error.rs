//! Error types for the storage layer.

use sync_types::{Cursor, DeviceId};

/// Errors from the event log or the peer sidecar.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An append carried a counter at or below the device's last
    /// recorded one.
    #[error("stale clock for {device}: counter {counter} is not above {last}")]
    StaleClock {
        /// Device whose ordering was violated.
        device: DeviceId,
        /// Counter carried by the rejected event.
        counter: u64,
        /// Highest counter already recorded for the device.
        last: u64,
    },

    /// A read asked for events older than the compaction watermark.
    #[error("cursor {requested} predates the compaction watermark {oldest}")]
    CursorCompacted {
        /// Cursor the caller asked to resume from.
        requested: Cursor,
        /// Oldest cursor the log can still serve.
        oldest: Cursor,
    },

    /// The log file failed validation before its final record.
    #[error("log file corrupt at byte {offset}: {reason}")]
    Corrupt {
        /// Byte offset of the offending frame.
        offset: u64,
        /// What went wrong.
        reason: String,
    },

    /// The log file was written by an incompatible version.
    #[error("unsupported log version: {0}")]
    UnsupportedVersion(u8),

    /// An event payload exceeds the storable maximum.
    #[error("payload of {size} bytes exceeds limit of {max}")]
    PayloadTooLarge {
        /// Size of the rejected payload.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MessagePack encoding failed.
    #[error("encoding failed: {0}")]
    Encode(#[source] rmp_serde::encode::Error),

    /// JSON sidecar encoding or decoding failed.
    #[error("sidecar error: {0}")]
    Sidecar(#[from] serde_json::Error),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
