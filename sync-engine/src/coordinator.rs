//! Outbound sync rounds.
//!
//! The coordinator dials one peer at a time, pushes local events the
//! peer has not seen, pulls the peer's events back, and reports what
//! moved. Transient failures retry with exponential backoff; a whole
//! round runs under one deadline.

use std::sync::Arc;

use sync_types::{
    Bye, Cursor, DeviceId, Event, GetEvents, Message, PutEvents, WireError, PROTOCOL_VERSION,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::service::{unix_now, PeerService};
use crate::transport::Transport;
use crate::wire::message_name;

/// What one sync round moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Events delivered to the peer.
    pub sent: usize,
    /// Events newly absorbed from the peer.
    pub received: usize,
    /// Concurrent-edit conflicts resolved while absorbing.
    pub conflicts: usize,
}

/// Dials peers and runs the sync protocol with them.
pub struct SyncCoordinator<T: Transport> {
    service: Arc<PeerService>,
    transport: T,
    config: EngineConfig,
}

impl<T: Transport> SyncCoordinator<T> {
    /// Builds a coordinator over a service and a transport.
    pub fn new(service: Arc<PeerService>, transport: T, config: EngineConfig) -> Self {
        SyncCoordinator {
            service,
            transport,
            config,
        }
    }

    /// The service this coordinator syncs for.
    pub fn service(&self) -> &Arc<PeerService> {
        &self.service
    }

    /// Syncs with one peer, retrying transient failures.
    ///
    /// The configured deadline covers the whole call, backoff sleeps
    /// included. Non-transient errors surface immediately; transient
    /// ones come back as [`EngineError::SyncFailed`] once attempts run
    /// out.
    pub async fn sync_with(&self, peer: DeviceId) -> Result<SyncReport> {
        match tokio::time::timeout(self.config.sync_timeout(), self.sync_with_retries(peer)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(EngineError::SyncTimeout { peer }),
        }
    }

    /// Syncs with every peer that has an address, one at a time.
    ///
    /// One failing peer does not stop the rest; each outcome is
    /// reported alongside its peer.
    pub async fn sync_all(&self) -> Vec<(DeviceId, Result<SyncReport>)> {
        let mut outcomes = Vec::new();
        for peer in self.service.peers().all() {
            if peer.address.is_none() {
                tracing::debug!(peer = %peer.device, "skipping peer without an address");
                continue;
            }
            let outcome = self.sync_with(peer.device).await;
            if let Err(e) = &outcome {
                tracing::warn!(peer = %peer.device, error = %e, "sync failed");
            }
            outcomes.push((peer.device, outcome));
        }
        outcomes
    }

    async fn sync_with_retries(&self, peer: DeviceId) -> Result<SyncReport> {
        let policy = self.config.retry_policy();
        let mut attempt = 1u32;
        loop {
            match self.sync_round(peer).await {
                Ok(report) => {
                    tracing::info!(
                        peer = %peer,
                        sent = report.sent,
                        received = report.received,
                        conflicts = report.conflicts,
                        "sync complete"
                    );
                    return Ok(report);
                }
                Err(e) if e.is_transient() && !policy.is_exhausted(attempt) => {
                    let delay = policy.delay(attempt);
                    tracing::warn!(
                        peer = %peer,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "sync attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.is_transient() => {
                    return Err(EngineError::SyncFailed {
                        peer,
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One connect-converse-close cycle.
    async fn sync_round(&self, peer: DeviceId) -> Result<SyncReport> {
        let state = self
            .service
            .peers()
            .get(peer)
            .ok_or(EngineError::UnknownPeer { peer })?;
        let address = state.address.ok_or(EngineError::NoAddress { peer })?;

        self.transport.connect(&address).await?;
        let outcome = self.converse(peer).await;
        if let Err(e) = self.transport.close().await {
            tracing::debug!(peer = %peer, error = %e, "close after sync failed");
        }
        outcome
    }

    async fn converse(&self, peer: DeviceId) -> Result<SyncReport> {
        self.send(&Message::Hello(self.service.hello())).await?;
        let welcome = match self.recv().await? {
            Message::Welcome(welcome) => welcome,
            Message::Bye(bye) => {
                return Err(EngineError::Protocol(format!(
                    "peer hung up during handshake: {}",
                    bye.reason.as_deref().unwrap_or("no reason given")
                )))
            }
            other => return Err(unexpected("welcome", &other)),
        };
        if welcome.version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(welcome.version).into());
        }

        let sent = self.push_events(peer, welcome.cursor).await?;
        let (received, conflicts) = self.pull_events(peer).await?;

        self.send(&Message::Bye(Bye { reason: None })).await?;
        self.service.peers().mark_synced(peer, unix_now())?;

        Ok(SyncReport {
            sent,
            received,
            conflicts,
        })
    }

    /// Delivers local events the peer has not seen, batch by batch.
    ///
    /// A delivery can be empty when the cursor only advanced past
    /// events the peer authored; it still moves the peer's watermark.
    async fn push_events(&self, peer: DeviceId, start: Cursor) -> Result<usize> {
        let mut from = start;
        let mut sent = 0usize;
        loop {
            let batch = self
                .service
                .events_after(peer, from, self.config.sync.batch_events)?;
            let max_cursor = batch.max_cursor;
            let has_more = batch.has_more;
            if batch.events.is_empty() && max_cursor == from {
                return Ok(sent);
            }

            let events: Vec<Event> = batch.events.into_iter().map(|r| r.event).collect();
            let delivered = events.len();
            self.send(&Message::PutEvents(PutEvents {
                from: self.service.device(),
                events,
                up_to: max_cursor,
            }))
            .await?;

            let ack = match self.recv().await? {
                Message::PutAck(ack) => ack,
                other => return Err(unexpected("put-ack", &other)),
            };
            self.service.peers().record_acked(peer, ack.cursor)?;

            sent += delivered;
            from = max_cursor;
            if !has_more {
                return Ok(sent);
            }
        }
    }

    /// Pulls the peer's events until the peer reports none remain.
    async fn pull_events(&self, peer: DeviceId) -> Result<(usize, usize)> {
        let mut since = self
            .service
            .peers()
            .get(peer)
            .map_or(Cursor::zero(), |state| state.received);
        let mut received = 0usize;
        let mut conflicts = 0usize;
        loop {
            self.send(&Message::GetEvents(GetEvents {
                from: self.service.device(),
                since,
                limit: self.config.sync.batch_events,
            }))
            .await?;

            let batch = match self.recv().await? {
                Message::EventBatch(batch) => batch,
                other => return Err(unexpected("event-batch", &other)),
            };
            let has_more = batch.has_more;
            let max_cursor = batch.max_cursor;
            let events: Vec<Event> = batch.events.into_iter().map(|r| r.event).collect();

            let absorbed = self.service.absorb(peer, events, max_cursor)?;
            received += absorbed.accepted;
            conflicts += absorbed.conflicts;

            // The cursor guard stops a peer that claims more while
            // standing still from looping us forever.
            if !has_more || max_cursor <= since {
                return Ok((received, conflicts));
            }
            since = max_cursor;
        }
    }

    async fn send(&self, message: &Message) -> Result<()> {
        tracing::trace!(message = message_name(message), "send");
        self.transport.send(&message.to_bytes()?).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Message> {
        let bytes = self.transport.recv().await?;
        let message = Message::from_bytes(&bytes)?;
        tracing::trace!(message = message_name(&message), "recv");
        Ok(message)
    }
}

fn unexpected(expected: &str, got: &Message) -> EngineError {
    EngineError::Protocol(format!("expected {expected}, got {}", message_name(got)))
}
