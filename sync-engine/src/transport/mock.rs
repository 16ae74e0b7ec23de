//! Mock transport for tests.
//!
//! Responses are queued ahead of time and everything sent is captured
//! for inspection. Clones share state, so a test can keep one handle
//! while the code under test owns another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Transport, TransportError};

/// In-memory transport that replays scripted responses.
#[derive(Debug, Default, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    connected: bool,
    connected_address: Option<String>,
    sent: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    fail_next_connect: Option<String>,
    fail_next_send: Option<String>,
    fail_next_recv: Option<String>,
}

impl MockTransport {
    /// Creates a disconnected mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues data for a later `recv()` call.
    pub fn queue_response(&self, data: Vec<u8>) {
        self.lock().responses.push_back(data);
    }

    /// Everything sent so far, oldest first.
    pub fn sent_messages(&self) -> Vec<Vec<u8>> {
        self.lock().sent.clone()
    }

    /// The most recently sent data, if anything was sent.
    pub fn last_sent(&self) -> Option<Vec<u8>> {
        self.lock().sent.last().cloned()
    }

    /// The address the last `connect()` dialed.
    pub fn connected_address(&self) -> Option<String> {
        self.lock().connected_address.clone()
    }

    /// Whether a `connect()` succeeded and no `close()` followed.
    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    /// Makes the next `connect()` fail with the given error text.
    pub fn fail_next_connect(&self, error: &str) {
        self.lock().fail_next_connect = Some(error.to_string());
    }

    /// Makes the next `send()` fail with the given error text.
    pub fn fail_next_send(&self, error: &str) {
        self.lock().fail_next_send = Some(error.to_string());
    }

    /// Makes the next `recv()` fail with the given error text.
    pub fn fail_next_recv(&self, error: &str) {
        self.lock().fail_next_recv = Some(error.to_string());
    }

    /// Drops all captured and queued state.
    pub fn reset(&self) {
        *self.lock() = Inner::default();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, address: &str) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_connect.take() {
            return Err(TransportError::ConnectionFailed(error));
        }
        inner.connected = true;
        inner.connected_address = Some(address.to_string());
        Ok(())
    }

    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(TransportError::SendFailed(error));
        }
        inner.sent.push(data.to_vec());
        Ok(())
    }

    async fn recv(&self) -> Result<Vec<u8>, TransportError> {
        let mut inner = self.lock();
        if !inner.connected {
            return Err(TransportError::NotConnected);
        }
        if let Some(error) = inner.fail_next_recv.take() {
            return Err(TransportError::ReceiveFailed(error));
        }
        inner
            .responses
            .pop_front()
            .ok_or(TransportError::ConnectionClosed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.lock().connected = false;
        Ok(())
    }
}
