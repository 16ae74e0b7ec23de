//! Shared sync state and protocol answers.
//!
//! A [`PeerService`] owns the device's log, peer book and Lamport
//! clock. The coordinator uses it when dialing out and the listener
//! uses it when answering, so both sides of the protocol give the
//! same answers from the same state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use sync_core::{plan_ingest, resolve, LamportClock};
use sync_store::{EventLog, PeerBook, StoreError};
use sync_types::{
    Cursor, DeviceId, Event, EventBatch, EventKind, Hello, ResourceId, SequencedEvent, Welcome,
    WireError, PROTOCOL_VERSION,
};

use crate::error::Result;

/// Rough per-event framing cost used in batch budget accounting,
/// covering ids, stamp and MessagePack structure around the payload.
pub(crate) const EVENT_OVERHEAD: usize = 128;

/// Caps on how much one batch may carry.
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    /// Most events in one batch.
    pub max_events: u32,
    /// Soft byte ceiling per batch. The first event is always allowed
    /// so one large payload cannot wedge a sync.
    pub byte_budget: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        BatchLimits {
            max_events: 64,
            byte_budget: 512 * 1024,
        }
    }
}

/// Outcome of absorbing one delivery of remote events.
#[derive(Debug, Clone, Copy)]
pub struct Absorbed {
    /// Events newly appended to the local log.
    pub accepted: usize,
    /// Events dropped because the log already covered them.
    pub duplicates: usize,
    /// Concurrent-edit conflicts found and resolved.
    pub conflicts: usize,
    /// Cursor into the sender's log after this delivery.
    pub cursor: Cursor,
}

/// The sync brain of one device.
#[derive(Debug)]
pub struct PeerService {
    device: DeviceId,
    device_name: String,
    log: Arc<EventLog>,
    peers: Arc<PeerBook>,
    clock: Mutex<LamportClock>,
    limits: BatchLimits,
}

impl PeerService {
    /// Builds a service over an opened log and peer book.
    ///
    /// The clock resumes past the highest counter the log has seen
    /// from any device, so local events recorded after a restart
    /// still order after everything already absorbed.
    pub fn new(
        device: DeviceId,
        device_name: impl Into<String>,
        log: Arc<EventLog>,
        peers: Arc<PeerBook>,
        limits: BatchLimits,
    ) -> Self {
        let seen = log.clock_table().values().copied().max().unwrap_or(0);
        PeerService {
            device,
            device_name: device_name.into(),
            log,
            peers,
            clock: Mutex::new(LamportClock::resume(device, seen)),
            limits,
        }
    }

    /// This device's id.
    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// This device's human-readable name.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// The underlying event log.
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// The underlying peer book.
    pub fn peers(&self) -> &PeerBook {
        &self.peers
    }

    /// Records a local change as a new event.
    ///
    /// The clock lock is held across the append so concurrent callers
    /// cannot land counters out of order. A failed append leaves a gap
    /// in the counter sequence, which is harmless.
    pub fn record(&self, resource: ResourceId, kind: EventKind, payload: Vec<u8>) -> Result<Cursor> {
        let mut clock = self.lock_clock();
        let stamp = clock.tick();
        let seq = self.log.append(Event::new(resource, stamp, kind, payload))?;
        Ok(seq)
    }

    /// The handshake this device opens with.
    pub fn hello(&self) -> Hello {
        Hello {
            version: PROTOCOL_VERSION,
            device: self.device,
            device_name: self.device_name.clone(),
        }
    }

    /// Answers a peer's handshake.
    ///
    /// Notes the peer in the book so inbound contacts become syncable
    /// without manual setup, and tells the caller how far this device
    /// has already read its log.
    pub fn welcome_for(&self, hello: &Hello) -> Result<Welcome> {
        if hello.version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(hello.version).into());
        }
        self.peers.note_contact(hello.device, &hello.device_name)?;
        let cursor = self
            .peers
            .get(hello.device)
            .map_or(Cursor::zero(), |peer| peer.received);
        Ok(Welcome {
            version: PROTOCOL_VERSION,
            cursor,
            head: self.log.head(),
        })
    }

    /// Serves one batch of events after `since` for a peer.
    ///
    /// A request starting at `since` proves the peer holds everything
    /// up to it, so `since` doubles as an acknowledgement. Events the
    /// peer authored are skipped; `max_cursor` still advances past
    /// them so the next request resumes beyond the skip.
    pub fn events_after(&self, peer: DeviceId, since: Cursor, limit: u32) -> Result<EventBatch> {
        self.peers.record_acked(peer, since)?;

        let stream = match self.log.since(since) {
            Ok(stream) => stream,
            Err(StoreError::CursorCompacted { requested, oldest }) => {
                tracing::debug!(peer = %peer, %requested, %oldest, "cursor compacted, serving snapshot");
                return self.snapshot_batch(peer);
            }
            Err(e) => return Err(e.into()),
        };

        let limit = limit.min(self.limits.max_events).max(1) as usize;
        let mut events: Vec<SequencedEvent> = Vec::new();
        let mut spent = 0usize;
        let mut max_cursor = since;
        let mut has_more = false;

        for record in stream {
            if record.event.device() == peer {
                max_cursor = record.seq;
                continue;
            }
            let cost = EVENT_OVERHEAD + record.event.payload.len();
            if events.len() >= limit
                || (!events.is_empty() && spent + cost > self.limits.byte_budget)
            {
                has_more = true;
                break;
            }
            spent += cost;
            max_cursor = record.seq;
            events.push(record);
        }

        Ok(EventBatch {
            events,
            has_more,
            max_cursor,
        })
    }

    /// Absorbs a delivery of remote events into the local log.
    ///
    /// Every stamp is observed before planning so local events
    /// recorded afterwards order past the whole delivery, even the
    /// parts the log already covered.
    pub fn absorb(&self, peer: DeviceId, events: Vec<Event>, up_to: Cursor) -> Result<Absorbed> {
        {
            let mut clock = self.lock_clock();
            for event in &events {
                clock.observe(&event.stamp);
            }
        }

        let plan = plan_ingest(events, &self.log.clock_table(), &self.log.heads());
        for set in &plan.conflicts {
            let winner = resolve(set)?;
            tracing::debug!(
                resource = %set.resource(),
                winner = %winner.device(),
                counter = winner.counter(),
                "resolved concurrent edits"
            );
        }
        let conflicts = plan.conflicts.len();
        let duplicates = plan.duplicates;

        let receipt = self.log.ingest(plan.fresh)?;
        let cursor = self.peers.record_received(peer, up_to)?;

        Ok(Absorbed {
            accepted: receipt.accepted,
            duplicates: duplicates + receipt.duplicates,
            conflicts,
            cursor,
        })
    }

    /// Compacts the log up to the slowest peer's acknowledgement.
    ///
    /// With no peers on record nothing is dropped; history may still
    /// be needed by whoever pairs first. Returns the number of
    /// records removed.
    pub fn compact(&self) -> Result<u64> {
        match self.peers.min_acked() {
            Some(watermark) => Ok(self.log.compact(watermark)?),
            None => Ok(0),
        }
    }

    /// Serves the canonical heads when a peer's cursor predates the
    /// compaction watermark.
    ///
    /// Every head is stamped with the watermark itself, so the peer's
    /// next request lands on the normal path and walks the retained
    /// records. A head can therefore arrive twice; absorb drops the
    /// second copy as a duplicate.
    fn snapshot_batch(&self, peer: DeviceId) -> Result<EventBatch> {
        let oldest = self.log.oldest();
        let mut heads: Vec<Event> = self
            .log
            .heads()
            .into_values()
            .filter(|event| event.device() != peer)
            .collect();
        heads.sort_by_key(|event| event.resource);

        let events = heads
            .into_iter()
            .map(|event| SequencedEvent { seq: oldest, event })
            .collect();

        Ok(EventBatch {
            events,
            has_more: oldest < self.log.head(),
            max_cursor: oldest,
        })
    }

    fn lock_clock(&self) -> MutexGuard<'_, LamportClock> {
        // Recover from a poisoned lock; the clock is a pair of
        // integers and cannot be left half-updated.
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Seconds since the Unix epoch, 0 when the system clock predates it.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use sync_types::LamportStamp;
    use tempfile::TempDir;

    fn device(byte: u8) -> DeviceId {
        DeviceId::from_bytes(&[byte; 32]).unwrap()
    }

    fn service_in(dir: &TempDir, id: DeviceId, limits: BatchLimits) -> PeerService {
        let log = Arc::new(EventLog::open(dir.path().join("events.log")).unwrap());
        let peers = Arc::new(PeerBook::open(dir.path().join("peers.json")).unwrap());
        PeerService::new(id, "unit", log, peers, limits)
    }

    fn remote_event(resource: ResourceId, from: DeviceId, counter: u64) -> Event {
        Event::new(
            resource,
            LamportStamp {
                counter,
                device: from,
            },
            EventKind::Note,
            vec![0xab],
        )
    }

    #[test]
    fn record_assigns_increasing_counters() {
        let dir = TempDir::new().unwrap();
        let me = device(1);
        let service = service_in(&dir, me, BatchLimits::default());

        let first = service.record(ResourceId::new(), EventKind::Note, vec![1]).unwrap();
        let second = service.record(ResourceId::new(), EventKind::Note, vec![2]).unwrap();

        assert_eq!(first, Cursor::new(1));
        assert_eq!(second, Cursor::new(2));
        assert_eq!(service.log().device_clock(me), 2);
    }

    #[test]
    fn clock_resumes_past_absorbed_counters() {
        let dir = TempDir::new().unwrap();
        let me = device(1);
        let log = Arc::new(EventLog::open(dir.path().join("events.log")).unwrap());
        log.ingest(vec![remote_event(ResourceId::new(), device(2), 7)])
            .unwrap();
        let peers = Arc::new(PeerBook::open(dir.path().join("peers.json")).unwrap());

        let service = PeerService::new(me, "unit", log, peers, BatchLimits::default());
        service.record(ResourceId::new(), EventKind::Note, vec![]).unwrap();

        assert_eq!(service.log().device_clock(me), 8);
    }

    #[test]
    fn welcome_rejects_version_mismatch() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, device(1), BatchLimits::default());

        let hello = Hello {
            version: 99,
            device: device(2),
            device_name: "future".into(),
        };
        let err = service.welcome_for(&hello).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Wire(WireError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn welcome_notes_the_caller_and_reports_progress() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, device(1), BatchLimits::default());
        let caller = device(2);

        service
            .peers()
            .record_received(caller, Cursor::new(4))
            .unwrap();

        let welcome = service
            .welcome_for(&Hello {
                version: PROTOCOL_VERSION,
                device: caller,
                device_name: "tablet".into(),
            })
            .unwrap();

        assert_eq!(welcome.cursor, Cursor::new(4));
        assert_eq!(welcome.head, service.log().head());
        let noted = service.peers().get(caller).unwrap();
        assert_eq!(noted.name, "tablet");
    }

    #[test]
    fn events_after_skips_the_callers_own_events() {
        let dir = TempDir::new().unwrap();
        let me = device(1);
        let caller = device(2);
        let service = service_in(&dir, me, BatchLimits::default());

        service.record(ResourceId::new(), EventKind::Note, vec![1]).unwrap();
        service
            .absorb(caller, vec![remote_event(ResourceId::new(), caller, 1)], Cursor::new(1))
            .unwrap();
        service.record(ResourceId::new(), EventKind::Note, vec![3]).unwrap();

        let batch = service.events_after(caller, Cursor::zero(), 64).unwrap();

        let devices: Vec<DeviceId> = batch.events.iter().map(|r| r.event.device()).collect();
        assert_eq!(devices, vec![me, me]);
        assert_eq!(batch.max_cursor, Cursor::new(3));
        assert!(!batch.has_more);
    }

    #[test]
    fn events_after_acknowledges_the_cursor() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, device(1), BatchLimits::default());
        let caller = device(2);

        service.events_after(caller, Cursor::new(5), 64).unwrap();

        assert_eq!(service.peers().get(caller).unwrap().acked, Cursor::new(5));
    }

    #[test]
    fn event_limit_leaves_the_rest_for_later() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, device(1), BatchLimits::default());
        for n in 0..3 {
            service.record(ResourceId::new(), EventKind::Note, vec![n]).unwrap();
        }

        let first = service.events_after(device(2), Cursor::zero(), 2).unwrap();
        assert_eq!(first.events.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.max_cursor, Cursor::new(2));

        let rest = service.events_after(device(2), first.max_cursor, 2).unwrap();
        assert_eq!(rest.events.len(), 1);
        assert!(!rest.has_more);
    }

    #[test]
    fn byte_budget_still_ships_one_event() {
        let dir = TempDir::new().unwrap();
        let limits = BatchLimits {
            max_events: 100,
            byte_budget: 300,
        };
        let service = service_in(&dir, device(1), limits);
        service
            .record(ResourceId::new(), EventKind::Note, vec![0; 200])
            .unwrap();
        service
            .record(ResourceId::new(), EventKind::Note, vec![0; 200])
            .unwrap();

        let first = service.events_after(device(2), Cursor::zero(), 100).unwrap();
        assert_eq!(first.events.len(), 1);
        assert!(first.has_more);

        let rest = service.events_after(device(2), first.max_cursor, 100).unwrap();
        assert_eq!(rest.events.len(), 1);
        assert!(!rest.has_more);
    }

    #[test]
    fn absorb_resolves_concurrent_edits() {
        let dir = TempDir::new().unwrap();
        let me = device(1);
        let rival = device(2);
        let service = service_in(&dir, me, BatchLimits::default());

        let contested = ResourceId::new();
        service.record(contested, EventKind::Note, vec![1]).unwrap();

        let absorbed = service
            .absorb(rival, vec![remote_event(contested, rival, 1)], Cursor::new(1))
            .unwrap();

        assert_eq!(absorbed.accepted, 1);
        assert_eq!(absorbed.conflicts, 1);
        assert_eq!(absorbed.cursor, Cursor::new(1));

        // Equal counters; the smaller device id stays canonical.
        assert_eq!(service.log().canonical(contested).unwrap().device(), me);
    }

    #[test]
    fn absorb_drops_redelivered_events() {
        let dir = TempDir::new().unwrap();
        let service = service_in(&dir, device(1), BatchLimits::default());
        let sender = device(2);
        let event = remote_event(ResourceId::new(), sender, 1);

        let first = service.absorb(sender, vec![event.clone()], Cursor::new(1)).unwrap();
        assert_eq!(first.accepted, 1);

        let again = service.absorb(sender, vec![event], Cursor::new(1)).unwrap();
        assert_eq!(again.accepted, 0);
        assert_eq!(again.duplicates, 1);
        assert_eq!(again.cursor, Cursor::new(1));
    }

    #[test]
    fn compacted_cursor_gets_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let me = device(1);
        let service = service_in(&dir, me, BatchLimits::default());

        let kept = ResourceId::new();
        let overwritten = ResourceId::new();
        service.record(overwritten, EventKind::Note, vec![1]).unwrap();
        service.record(kept, EventKind::Note, vec![2]).unwrap();
        service.record(overwritten, EventKind::EtaUpdated, vec![3]).unwrap();
        service.log().compact(Cursor::new(3)).unwrap();

        let stranger = device(9);
        let batch = service.events_after(stranger, Cursor::zero(), 64).unwrap();

        assert_eq!(batch.events.len(), 2);
        assert!(batch.events.iter().all(|r| r.seq == Cursor::new(3)));
        assert_eq!(batch.max_cursor, Cursor::new(3));
        assert!(!batch.has_more);

        let kinds: Vec<EventKind> = batch.events.iter().map(|r| r.event.kind).collect();
        assert!(kinds.contains(&EventKind::Note));
        assert!(kinds.contains(&EventKind::EtaUpdated));
    }
}
