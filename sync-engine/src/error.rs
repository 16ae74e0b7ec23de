//! Error types for the sync engine.

use sync_core::ResolveError;
use sync_store::StoreError;
use sync_types::{DeviceId, WireError};

use crate::transport::TransportError;

/// Errors from sync rounds, the peer listener, or the protocol.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Storage failed beneath the engine.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The transport could not move bytes.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A message failed to encode or decode.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Conflict resolution was handed an unusable set.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Socket-level I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer broke the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The peer is not in the peer book.
    #[error("unknown peer {peer}")]
    UnknownPeer {
        /// Device that was requested.
        peer: DeviceId,
    },

    /// The peer has no dial address on record.
    #[error("no address on record for peer {peer}")]
    NoAddress {
        /// Peer that cannot be dialed.
        peer: DeviceId,
    },

    /// Every allowed attempt against this peer failed.
    #[error("sync with {peer} failed after {attempts} attempts: {last}")]
    SyncFailed {
        /// Peer the engine was syncing with.
        peer: DeviceId,
        /// Attempts made before giving up.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        last: Box<EngineError>,
    },

    /// The whole sync round exceeded its deadline.
    #[error("sync with {peer} timed out")]
    SyncTimeout {
        /// Peer the engine was syncing with.
        peer: DeviceId,
    },
}

impl EngineError {
    /// Whether retrying could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Transport(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;

    #[test]
    fn transport_failures_are_transient() {
        let err = EngineError::Transport(TransportError::ConnectionFailed("refused".into()));
        assert!(err.is_transient());

        let err = EngineError::Transport(TransportError::Timeout);
        assert!(err.is_transient());
    }

    #[test]
    fn protocol_and_store_failures_are_not() {
        assert!(!EngineError::Protocol("bad handshake".into()).is_transient());

        let stale = StoreError::StaleClock {
            device: DeviceId::random(),
            counter: 1,
            last: 5,
        };
        assert!(!EngineError::Store(stale).is_transient());
    }

    #[test]
    fn sync_failed_reports_attempt_count() {
        let peer = DeviceId::random();
        let err = EngineError::SyncFailed {
            peer,
            attempts: 5,
            last: Box::new(EngineError::Transport(TransportError::Timeout)),
        };
        let text = err.to_string();
        assert!(text.contains("5 attempts"));
        assert!(text.contains("timeout"));
    }
}
