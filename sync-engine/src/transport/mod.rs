//! Pluggable byte transport between devices.
//!
//! A transport moves whole encoded protocol messages; sockets and
//! framing are its business. The engine speaks one protocol over
//! every implementation, so a LAN peer and a cloud relay differ only
//! in the address string handed to [`Transport::connect`].

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Not connected.
    #[error("not connected")]
    NotConnected,

    /// Connection closed by the remote side.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// Connection timeout.
    #[error("connection timeout")]
    Timeout,
}

impl TransportError {
    /// Whether retrying against the same address could succeed.
    ///
    /// `NotConnected` means the caller skipped `connect`, which no
    /// amount of waiting fixes.
    pub fn is_transient(&self) -> bool {
        !matches!(self, TransportError::NotConnected)
    }
}

/// Moves encoded protocol messages to and from one remote device.
///
/// Implementations handle the underlying connection mechanism
/// (TCP, relay, mock for tests).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection to the given address.
    ///
    /// An address is whatever the implementation dials: `host:port`
    /// for TCP, a relay endpoint for the cloud path.
    async fn connect(&self, address: &str) -> Result<(), TransportError>;

    /// Sends one encoded message.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Receives one encoded message, waiting until the peer sends.
    async fn recv(&self) -> Result<Vec<u8>, TransportError>;

    /// Closes the connection gracefully.
    async fn close(&self) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_missing_connect_is_permanent() {
        assert!(!TransportError::NotConnected.is_transient());

        assert!(TransportError::ConnectionFailed("refused".into()).is_transient());
        assert!(TransportError::ConnectionClosed.is_transient());
        assert!(TransportError::SendFailed("pipe".into()).is_transient());
        assert!(TransportError::ReceiveFailed("pipe".into()).is_transient());
        assert!(TransportError::Timeout.is_transient());
    }
}
