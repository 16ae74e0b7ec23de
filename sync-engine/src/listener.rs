//! Inbound peer sessions.
//!
//! The listener accepts TCP connections and answers the sync protocol
//! from the same [`PeerService`] the coordinator dials out with, so a
//! device converges no matter which side placed the call.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::net::{TcpListener, TcpStream};

use sync_types::{Bye, DeviceId, Message, PutAck};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::service::{unix_now, PeerService};
use crate::wire::{message_name, read_message, write_message};

/// Accepts connections and serves sync sessions.
pub struct PeerListener {
    listener: TcpListener,
    service: Arc<PeerService>,
    hello_timeout: Duration,
    sessions: Arc<DashMap<DeviceId, SocketAddr>>,
}

impl PeerListener {
    /// Binds to the configured listen address.
    pub async fn bind(service: Arc<PeerService>, config: &EngineConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen.bind_address).await?;
        Ok(PeerListener {
            listener,
            service,
            hello_timeout: config.hello_timeout(),
            sessions: Arc::new(DashMap::new()),
        })
    }

    /// The address the listener actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Live view of connected peers, keyed by device.
    pub fn sessions(&self) -> Arc<DashMap<DeviceId, SocketAddr>> {
        Arc::clone(&self.sessions)
    }

    /// Accepts sessions until the task is dropped.
    ///
    /// Each connection runs on its own task; a misbehaving peer takes
    /// down its session, not the listener.
    pub async fn run(self) -> Result<()> {
        tracing::info!(address = %self.listener.local_addr()?, "listening for peers");
        let shared = Arc::new(self);
        loop {
            match shared.listener.accept().await {
                Ok((socket, remote)) => {
                    let this = Arc::clone(&shared);
                    tokio::spawn(async move {
                        if let Err(e) = this.run_session(socket, remote).await {
                            tracing::warn!(%remote, error = %e, "session ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn run_session(&self, mut socket: TcpStream, remote: SocketAddr) -> Result<()> {
        let hello = match tokio::time::timeout(self.hello_timeout, read_message(&mut socket)).await
        {
            Ok(Ok(Message::Hello(hello))) => hello,
            Ok(Ok(other)) => {
                let reason = format!("expected hello, got {}", message_name(&other));
                let bye = Message::Bye(Bye {
                    reason: Some(reason),
                });
                write_message(&mut socket, &bye).await?;
                return Ok(());
            }
            Ok(Err(EngineError::Io(e))) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                tracing::debug!(%remote, "peer never said hello");
                return Ok(());
            }
        };

        let peer = hello.device;
        let welcome = match self.service.welcome_for(&hello) {
            Ok(welcome) => welcome,
            Err(e) => {
                let bye = Message::Bye(Bye {
                    reason: Some(e.to_string()),
                });
                write_message(&mut socket, &bye).await?;
                return Err(e);
            }
        };
        self.sessions.insert(peer, remote);
        tracing::info!(peer = %peer, name = %hello.device_name, %remote, "peer connected");
        let outcome = async {
            write_message(&mut socket, &Message::Welcome(welcome)).await?;
            self.serve(&mut socket, peer).await
        }
        .await;
        self.sessions.remove(&peer);
        tracing::debug!(peer = %peer, "peer disconnected");
        outcome
    }

    async fn serve(&self, socket: &mut TcpStream, peer: DeviceId) -> Result<()> {
        loop {
            let message = match read_message(socket).await {
                Ok(message) => message,
                Err(EngineError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    tracing::debug!(peer = %peer, "peer went away without a bye");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match message {
                Message::GetEvents(get) => {
                    if get.from != peer {
                        return self.say_bye(socket, "get-events for a different device").await;
                    }
                    let batch = self.service.events_after(peer, get.since, get.limit)?;
                    write_message(socket, &Message::EventBatch(batch)).await?;
                }
                Message::PutEvents(put) => {
                    if put.from != peer {
                        return self.say_bye(socket, "put-events for a different device").await;
                    }
                    let absorbed = self.service.absorb(peer, put.events, put.up_to)?;
                    let ack = PutAck {
                        accepted: absorbed.accepted as u32,
                        cursor: absorbed.cursor,
                    };
                    write_message(socket, &Message::PutAck(ack)).await?;
                }
                Message::Bye(_) => {
                    self.service.peers().mark_synced(peer, unix_now())?;
                    return Ok(());
                }
                other => {
                    let reason = format!("unexpected {}", message_name(&other));
                    return self.say_bye(socket, &reason).await;
                }
            }
        }
    }

    /// Tells the peer why the session is over, then fails the session.
    async fn say_bye(&self, socket: &mut TcpStream, reason: &str) -> Result<()> {
        let bye = Message::Bye(Bye {
            reason: Some(reason.to_string()),
        });
        write_message(socket, &bye).await?;
        Err(EngineError::Protocol(reason.to_string()))
    }
}
