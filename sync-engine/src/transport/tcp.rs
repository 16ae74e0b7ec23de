//! TCP transport.
//!
//! Frames messages over a plain TCP stream. Works for peers on the
//! local network and for a cloud relay alike; only the address the
//! caller dials changes.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::wire;

use super::{Transport, TransportError};

/// How long a dial may take before it counts as failed.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport over one TCP connection at a time.
///
/// A second `connect` drops the previous connection.
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Mutex<Option<TcpStream>>,
}

impl TcpTransport {
    /// Creates a transport with no open connection.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let dial = TcpStream::connect(address);
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, dial).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(TransportError::ConnectionFailed(e.to_string())),
            Err(_) => return Err(TransportError::Timeout),
        };
        *self.stream.lock().await = Some(stream);
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        wire::write_frame(stream, data)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(TransportError::NotConnected)?;
        match wire::read_frame(stream).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(TransportError::ConnectionClosed)
            }
            Err(e) => Err(TransportError::ReceiveFailed(e.to_string())),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Some(mut stream) = self.stream.lock().await.take() {
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            while let Ok(frame) = wire::read_frame(&mut socket).await {
                wire::write_frame(&mut socket, &frame).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn echoes_over_loopback() {
        let addr = echo_server().await;

        let transport = TcpTransport::new();
        transport.connect(&addr.to_string()).await.unwrap();

        transport.send(b"over the wire").await.unwrap();
        let reply = transport.recv().await.unwrap();
        assert_eq!(reply, b"over the wire");

        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn send_without_connect_fails() {
        let transport = TcpTransport::new();
        let err = transport.send(b"data").await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn refused_dial_is_a_connection_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpTransport::new();
        let err = transport.connect(&addr.to_string()).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn remote_hangup_reads_as_closed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            drop(socket);
        });

        let transport = TcpTransport::new();
        transport.connect(&addr.to_string()).await.unwrap();

        let err = transport.recv().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectionClosed));
    }

    #[tokio::test]
    async fn reconnect_replaces_the_stream() {
        let first = echo_server().await;
        let second = echo_server().await;

        let transport = TcpTransport::new();
        transport.connect(&first.to_string()).await.unwrap();
        transport.connect(&second.to_string()).await.unwrap();

        transport.send(b"ping").await.unwrap();
        assert_eq!(transport.recv().await.unwrap(), b"ping");
    }
}
