//! Wire-level error types.

use thiserror::Error;

/// Errors from encoding, decoding, or framing protocol messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Invalid protocol version
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Framed message exceeds the size limit
    #[error("message of {size} bytes exceeds limit of {max}")]
    MessageTooLarge {
        /// Declared size of the offending message
        size: usize,
        /// Configured maximum
        max: usize,
    },
}
