//! The append-only event log.
//!
//! One log file per device. The file opens with a checkpoint frame
//! carrying the compaction watermark plus the clock table and canonical
//! heads accumulated by compacted-away records; every frame after it is
//! one event with its assigned sequence. A frame is a 4-byte big-endian
//! length prefix followed by a MessagePack body.
//!
//! Appends are serialized by an exclusive lock and flushed before they
//! are acknowledged. Reads copy a snapshot under a shared lock and
//! iterate without holding it. A torn trailing frame from a crash
//! mid-append is truncated at open; damage anywhere earlier is reported
//! as corruption.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use sync_core::supersedes;
use sync_types::{Cursor, DeviceId, Event, ResourceId, SequencedEvent, MAX_EVENT_PAYLOAD};

use crate::error::{Result, StoreError};

/// Current log file format version.
const LOG_VERSION: u8 = 1;

/// Checkpoint frame at the start of the log file.
///
/// Carries what replay cannot recover from the retained events: the
/// watermark of compacted-away sequences and the clock and head state
/// those records contributed.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Checkpoint {
    version: u8,
    base: u64,
    clocks: Vec<(DeviceId, u64)>,
    heads: Vec<Event>,
}

impl Checkpoint {
    fn empty() -> Self {
        Self {
            version: LOG_VERSION,
            base: 0,
            clocks: Vec::new(),
            heads: Vec::new(),
        }
    }
}

/// Receipt from a batch ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReceipt {
    /// Events newly appended.
    pub accepted: usize,
    /// Events skipped because the log already covered them.
    pub duplicates: usize,
}

#[derive(Debug)]
struct LogInner {
    file: File,
    records: Vec<SequencedEvent>,
    base: u64,
    clocks: HashMap<DeviceId, u64>,
    heads: HashMap<ResourceId, Event>,
}

impl LogInner {
    fn head_seq(&self) -> u64 {
        self.base + self.records.len() as u64
    }

    /// Register an already-written record in the in-memory mirror.
    fn commit(&mut self, record: SequencedEvent) {
        let event = &record.event;
        self.clocks.insert(event.device(), event.counter());
        match self.heads.get(&event.resource) {
            Some(current) if !supersedes(event, current) => {}
            _ => {
                self.heads.insert(event.resource, event.clone());
            }
        }
        self.records.push(record);
    }
}

/// The durable, append-only event log.
///
/// One instance owns the file; opening a second instance on the same
/// path is not supported.
#[derive(Debug)]
pub struct EventLog {
    path: PathBuf,
    inner: RwLock<LogInner>,
}

impl EventLog {
    /// Open or create the log at `path`, replaying its contents.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)?;

        let data = fs::read(&path)?;
        let replayed = replay(&data)?;

        let had_checkpoint = replayed.checkpoint.is_some();
        let checkpoint = match replayed.checkpoint {
            Some(checkpoint) => checkpoint,
            None => {
                // Brand new file, or a crash before the first checkpoint
                // landed. Nothing was ever acknowledged, so start fresh.
                if !data.is_empty() {
                    file.set_len(0)?;
                }
                let checkpoint = Checkpoint::empty();
                write_frame(&mut file, &encode(&checkpoint)?)?;
                file.sync_data()?;
                checkpoint
            }
        };

        if replayed.valid_len < data.len() as u64 && had_checkpoint {
            tracing::warn!(
                path = %path.display(),
                kept = replayed.valid_len,
                dropped = data.len() as u64 - replayed.valid_len,
                "truncating torn tail of event log"
            );
            file.set_len(replayed.valid_len)?;
            file.sync_data()?;
        }

        let mut inner = LogInner {
            file,
            records: Vec::with_capacity(replayed.records.len()),
            base: checkpoint.base,
            clocks: checkpoint.clocks.iter().copied().collect(),
            heads: checkpoint
                .heads
                .iter()
                .map(|event| (event.resource, event.clone()))
                .collect(),
        };
        for record in replayed.records {
            inner.commit(record);
        }

        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    /// Append a locally created event.
    ///
    /// The event's counter must be strictly greater than the last one
    /// recorded for its device, otherwise the append is rejected with
    /// [`StoreError::StaleClock`] and the log is unchanged. The record
    /// is flushed before the assigned cursor is returned; if the flush
    /// fails the record may still survive a restart, so callers must
    /// treat an error as "unacknowledged", never "absent".
    pub fn append(&self, event: Event) -> Result<Cursor> {
        check_payload(&event)?;
        let mut inner = self.write_inner();

        let last = inner.clocks.get(&event.device()).copied().unwrap_or(0);
        if event.counter() <= last {
            return Err(StoreError::StaleClock {
                device: event.device(),
                counter: event.counter(),
                last,
            });
        }

        let seq = inner.head_seq().saturating_add(1);
        let record = SequencedEvent {
            seq: Cursor::new(seq),
            event,
        };
        let frame = encode(&record)?;
        write_frame(&mut inner.file, &frame)?;
        inner.commit(record);
        inner.file.sync_data()?;

        Ok(Cursor::new(seq))
    }

    /// Append a batch of events learned from a peer.
    ///
    /// Events already covered by the clock table are skipped, so
    /// re-delivery after an interrupted sync is harmless. Freshness is
    /// re-checked under the write lock; plans computed outside it are
    /// advisory. One flush covers the whole batch.
    pub fn ingest(&self, events: Vec<Event>) -> Result<IngestReceipt> {
        for event in &events {
            check_payload(event)?;
        }
        let mut inner = self.write_inner();

        let mut accepted = 0usize;
        let mut duplicates = 0usize;
        for event in events {
            let last = inner.clocks.get(&event.device()).copied().unwrap_or(0);
            if event.counter() <= last {
                duplicates += 1;
                continue;
            }
            let seq = inner.head_seq().saturating_add(1);
            let record = SequencedEvent {
                seq: Cursor::new(seq),
                event,
            };
            let frame = encode(&record)?;
            write_frame(&mut inner.file, &frame)?;
            inner.commit(record);
            accepted += 1;
        }
        if accepted > 0 {
            inner.file.sync_data()?;
        }

        Ok(IngestReceipt {
            accepted,
            duplicates,
        })
    }

    /// Events with sequence greater than `cursor`, in append order.
    ///
    /// The stream iterates a snapshot; appends during iteration are not
    /// reflected. Iteration can restart from any cursor at any time.
    /// Cursors below the compaction watermark error with
    /// [`StoreError::CursorCompacted`].
    pub fn since(&self, cursor: Cursor) -> Result<EventStream> {
        let inner = self.read_inner();
        if cursor.value() < inner.base {
            return Err(StoreError::CursorCompacted {
                requested: cursor,
                oldest: Cursor::new(inner.base),
            });
        }
        let skip = (cursor.value() - inner.base) as usize;
        let records = if skip >= inner.records.len() {
            Vec::new()
        } else {
            inner.records[skip..].to_vec()
        };
        Ok(EventStream {
            records: records.into_iter(),
        })
    }

    /// Sequence of the most recent record.
    pub fn head(&self) -> Cursor {
        Cursor::new(self.read_inner().head_seq())
    }

    /// Oldest cursor [`since`](Self::since) can serve.
    pub fn oldest(&self) -> Cursor {
        Cursor::new(self.read_inner().base)
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.read_inner().records.len()
    }

    /// Whether the log retains no records.
    pub fn is_empty(&self) -> bool {
        self.read_inner().records.is_empty()
    }

    /// Highest counter recorded for a device, 0 when unknown.
    pub fn device_clock(&self, device: DeviceId) -> u64 {
        self.read_inner().clocks.get(&device).copied().unwrap_or(0)
    }

    /// Snapshot of every device's highest recorded counter.
    pub fn clock_table(&self) -> HashMap<DeviceId, u64> {
        self.read_inner().clocks.clone()
    }

    /// Snapshot of the canonical event per resource.
    pub fn heads(&self) -> HashMap<ResourceId, Event> {
        self.read_inner().heads.clone()
    }

    /// Canonical event for one resource.
    pub fn canonical(&self, resource: ResourceId) -> Option<Event> {
        self.read_inner().heads.get(&resource).cloned()
    }

    /// Drop records with sequence at or below `up_to`.
    ///
    /// The file is rewritten through a temp file and renamed into place,
    /// with the clock table and heads carried forward in the checkpoint.
    /// Callers only pass watermarks every known peer has acknowledged.
    /// Returns the number of records removed.
    pub fn compact(&self, up_to: Cursor) -> Result<u64> {
        let mut inner = self.write_inner();
        let cut = up_to.value().min(inner.head_seq());
        if cut <= inner.base {
            return Ok(0);
        }
        let drop_n = (cut - inner.base) as usize;

        let mut clocks: Vec<(DeviceId, u64)> =
            inner.clocks.iter().map(|(d, n)| (*d, *n)).collect();
        clocks.sort_by_key(|(device, _)| *device);
        let mut heads: Vec<Event> = inner.heads.values().cloned().collect();
        heads.sort_by_key(|event| event.resource);
        let checkpoint = Checkpoint {
            version: LOG_VERSION,
            base: cut,
            clocks,
            heads,
        };

        let tmp_path = {
            let mut p = self.path.clone().into_os_string();
            p.push(".tmp");
            PathBuf::from(p)
        };
        let mut tmp = File::create(&tmp_path)?;
        write_frame(&mut tmp, &encode(&checkpoint)?)?;
        for record in &inner.records[drop_n..] {
            write_frame(&mut tmp, &encode(record)?)?;
        }
        tmp.sync_all()?;
        drop(tmp);
        fs::rename(&tmp_path, &self.path)?;

        inner.file = OpenOptions::new().append(true).open(&self.path)?;
        inner.records.drain(..drop_n);
        inner.base = cut;

        tracing::info!(removed = drop_n, watermark = cut, "compacted event log");
        Ok(drop_n as u64)
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, LogInner> {
        // A poisoned lock only means another thread panicked while
        // holding it; recover the data rather than cascading.
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, LogInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Finite snapshot of log records, yielded in append order.
#[derive(Debug)]
pub struct EventStream {
    records: std::vec::IntoIter<SequencedEvent>,
}

impl Iterator for EventStream {
    type Item = SequencedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.records.size_hint()
    }
}

impl ExactSizeIterator for EventStream {}

struct Replayed {
    checkpoint: Option<Checkpoint>,
    records: Vec<SequencedEvent>,
    valid_len: u64,
}

fn replay(data: &[u8]) -> Result<Replayed> {
    let mut offset = 0usize;

    let Some(first) = next_frame(data, &mut offset) else {
        return Ok(Replayed {
            checkpoint: None,
            records: Vec::new(),
            valid_len: 0,
        });
    };
    let checkpoint: Checkpoint = rmp_serde::from_slice(first).map_err(|e| StoreError::Corrupt {
        offset: 0,
        reason: format!("checkpoint frame: {e}"),
    })?;
    if checkpoint.version != LOG_VERSION {
        return Err(StoreError::UnsupportedVersion(checkpoint.version));
    }

    let mut records = Vec::new();
    let mut expected = checkpoint.base.saturating_add(1);
    let mut valid_len = offset as u64;
    while let Some(frame) = {
        let frame_start = offset as u64;
        let frame = next_frame(data, &mut offset);
        frame.map(|f| (f, frame_start))
    } {
        let (frame, frame_start) = frame;
        let record: SequencedEvent =
            rmp_serde::from_slice(frame).map_err(|e| StoreError::Corrupt {
                offset: frame_start,
                reason: format!("event frame: {e}"),
            })?;
        if record.seq.value() != expected {
            return Err(StoreError::Corrupt {
                offset: frame_start,
                reason: format!("sequence {} where {} expected", record.seq, expected),
            });
        }
        expected = expected.saturating_add(1);
        records.push(record);
        valid_len = offset as u64;
    }

    Ok(Replayed {
        checkpoint: Some(checkpoint),
        records,
        valid_len,
    })
}

fn next_frame<'a>(data: &'a [u8], offset: &mut usize) -> Option<&'a [u8]> {
    let start = *offset;
    if data.len().saturating_sub(start) < 4 {
        return None;
    }
    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&data[start..start + 4]);
    let len = u32::from_be_bytes(len_bytes) as usize;
    let end = (start + 4).checked_add(len)?;
    if end > data.len() {
        return None;
    }
    *offset = end;
    Some(&data[start + 4..end])
}

fn write_frame(file: &mut File, payload: &[u8]) -> Result<()> {
    let len = payload.len() as u32;
    file.write_all(&len.to_be_bytes())?;
    file.write_all(payload)?;
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(StoreError::Encode)
}

fn check_payload(event: &Event) -> Result<()> {
    if event.payload.len() > MAX_EVENT_PAYLOAD {
        return Err(StoreError::PayloadTooLarge {
            size: event.payload.len(),
            max: MAX_EVENT_PAYLOAD,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{EventKind, LamportStamp};
    use tempfile::tempdir;

    fn device(byte: u8) -> DeviceId {
        DeviceId::from_bytes(&[byte; 32]).unwrap()
    }

    fn event_on(resource: ResourceId, device: DeviceId, counter: u64) -> Event {
        Event::new(
            resource,
            LamportStamp { counter, device },
            EventKind::LocationPing,
            format!("ping-{counter}").into_bytes(),
        )
    }

    #[test]
    fn appends_assign_sequential_cursors() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let dev = device(1);
        let resource = ResourceId::new();

        assert_eq!(log.append(event_on(resource, dev, 1)).unwrap().value(), 1);
        assert_eq!(log.append(event_on(resource, dev, 2)).unwrap().value(), 2);
        assert_eq!(log.append(event_on(resource, dev, 3)).unwrap().value(), 3);
        assert_eq!(log.head().value(), 3);
    }

    #[test]
    fn since_zero_returns_events_in_append_order() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let dev = device(1);
        let resource = ResourceId::new();

        let mut appended = Vec::new();
        for counter in 1..=5 {
            let event = event_on(resource, dev, counter);
            appended.push(event.id);
            log.append(event).unwrap();
        }

        let replayed: Vec<_> = log
            .since(Cursor::zero())
            .unwrap()
            .map(|r| r.event.id)
            .collect();
        assert_eq!(replayed, appended);
    }

    #[test]
    fn since_is_restartable_and_resumes_midway() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let dev = device(1);
        let resource = ResourceId::new();
        for counter in 1..=4 {
            log.append(event_on(resource, dev, counter)).unwrap();
        }

        let first: Vec<_> = log.since(Cursor::new(2)).unwrap().collect();
        let second: Vec<_> = log.since(Cursor::new(2)).unwrap().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].seq.value(), 3);
    }

    #[test]
    fn stale_clock_is_rejected_and_log_unchanged() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let dev = device(1);
        let resource = ResourceId::new();
        log.append(event_on(resource, dev, 5)).unwrap();

        let err = log.append(event_on(resource, dev, 5)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::StaleClock {
                counter: 5,
                last: 5,
                ..
            }
        ));
        let err = log.append(event_on(resource, dev, 4)).unwrap_err();
        assert!(matches!(err, StoreError::StaleClock { .. }));

        assert_eq!(log.len(), 1);
        assert_eq!(log.device_clock(dev), 5);
    }

    #[test]
    fn reopen_restores_events_clocks_and_heads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let resource = ResourceId::new();
        let (a, b) = (device(1), device(2));

        {
            let log = EventLog::open(&path).unwrap();
            log.append(event_on(resource, a, 1)).unwrap();
            log.append(event_on(resource, a, 2)).unwrap();
            log.ingest(vec![event_on(resource, b, 7)]).unwrap();
        }

        let log = EventLog::open(&path).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.head().value(), 3);
        assert_eq!(log.device_clock(a), 2);
        assert_eq!(log.device_clock(b), 7);
        assert_eq!(log.canonical(resource).unwrap().counter(), 7);
    }

    #[test]
    fn torn_tail_is_truncated_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let dev = device(1);
        let resource = ResourceId::new();

        {
            let log = EventLog::open(&path).unwrap();
            log.append(event_on(resource, dev, 1)).unwrap();
            log.append(event_on(resource, dev, 2)).unwrap();
        }

        // A crash mid-append leaves a frame that claims more bytes than
        // the file holds.
        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0, 0, 0, 50, 1, 2, 3]).unwrap();
        }

        let log = EventLog::open(&path).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.device_clock(dev), 2);

        // The log keeps accepting appends after recovery.
        assert_eq!(log.append(event_on(resource, dev, 3)).unwrap().value(), 3);
    }

    fn frame_ranges(data: &[u8]) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut at = 0usize;
        while at + 4 <= data.len() {
            let len = u32::from_be_bytes(data[at..at + 4].try_into().unwrap()) as usize;
            ranges.push((at, at + 4 + len));
            at += 4 + len;
        }
        ranges
    }

    #[test]
    fn undecodable_checkpoint_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        {
            let log = EventLog::open(&path).unwrap();
            log.append(event_on(ResourceId::new(), device(1), 1))
                .unwrap();
        }

        // 0xC1 is never a valid MessagePack marker.
        let mut data = fs::read(&path).unwrap();
        data[4] = 0xC1;
        fs::write(&path, &data).unwrap();

        assert!(matches!(
            EventLog::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn checkpoint_from_a_newer_format_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        {
            EventLog::open(&path).unwrap();
        }

        // Checkpoint body is [version, base, clocks, heads]; bump the
        // version fixint that follows the array header.
        let mut data = fs::read(&path).unwrap();
        assert_eq!(data[5], LOG_VERSION);
        data[5] = 9;
        fs::write(&path, &data).unwrap();

        assert!(matches!(
            EventLog::open(&path),
            Err(StoreError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn out_of_sequence_interior_frame_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let dev = device(1);
        let resource = ResourceId::new();
        {
            let log = EventLog::open(&path).unwrap();
            log.append(event_on(resource, dev, 1)).unwrap();
            log.append(event_on(resource, dev, 2)).unwrap();
        }

        // Swap the two event frames; replay must refuse seq 2 first.
        let data = fs::read(&path).unwrap();
        let ranges = frame_ranges(&data);
        assert_eq!(ranges.len(), 3);
        let (s1, e1) = ranges[1];
        let (s2, e2) = ranges[2];
        let mut swapped = data[..s1].to_vec();
        swapped.extend_from_slice(&data[s2..e2]);
        swapped.extend_from_slice(&data[s1..e1]);
        fs::write(&path, &swapped).unwrap();

        assert!(matches!(
            EventLog::open(&path),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn ingest_skips_covered_events() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let peer = device(2);
        let resource = ResourceId::new();

        let batch = vec![
            event_on(resource, peer, 1),
            event_on(resource, peer, 2),
            event_on(resource, peer, 3),
        ];
        let receipt = log.ingest(batch.clone()).unwrap();
        assert_eq!(receipt.accepted, 3);
        assert_eq!(receipt.duplicates, 0);

        // Re-delivery after an interrupted sync changes nothing.
        let receipt = log.ingest(batch).unwrap();
        assert_eq!(receipt.accepted, 0);
        assert_eq!(receipt.duplicates, 3);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn canonical_head_follows_the_winner() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let resource = ResourceId::new();
        let (a, b) = (device(1), device(9));

        log.append(event_on(resource, a, 1)).unwrap();
        assert_eq!(log.canonical(resource).unwrap().device(), a);

        // Higher counter from another device takes the head.
        log.ingest(vec![event_on(resource, b, 2)]).unwrap();
        assert_eq!(log.canonical(resource).unwrap().device(), b);

        // An equal-counter rival goes to the smaller device id.
        log.append(event_on(resource, a, 2)).unwrap();
        assert_eq!(log.canonical(resource).unwrap().device(), a);
    }

    #[test]
    fn compact_drops_acknowledged_prefix() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let dev = device(1);
        let resource = ResourceId::new();
        for counter in 1..=5 {
            log.append(event_on(resource, dev, counter)).unwrap();
        }

        assert_eq!(log.compact(Cursor::new(3)).unwrap(), 3);
        assert_eq!(log.len(), 2);
        assert_eq!(log.head().value(), 5);
        assert_eq!(log.oldest().value(), 3);

        let remaining: Vec<_> = log
            .since(Cursor::new(3))
            .unwrap()
            .map(|r| r.seq.value())
            .collect();
        assert_eq!(remaining, vec![4, 5]);

        assert!(matches!(
            log.since(Cursor::zero()),
            Err(StoreError::CursorCompacted { .. })
        ));

        // Compacting below the watermark is a no-op.
        assert_eq!(log.compact(Cursor::new(2)).unwrap(), 0);
    }

    #[test]
    fn compaction_preserves_clock_table_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.log");
        let dev = device(4);
        let resource = ResourceId::new();

        {
            let log = EventLog::open(&path).unwrap();
            for counter in 1..=3 {
                log.append(event_on(resource, dev, counter)).unwrap();
            }
            log.compact(Cursor::new(3)).unwrap();
            assert!(log.is_empty());
        }

        let log = EventLog::open(&path).unwrap();
        assert_eq!(log.device_clock(dev), 3);
        assert_eq!(log.head().value(), 3);
        assert_eq!(log.canonical(resource).unwrap().counter(), 3);

        // Old events re-delivered by a slow peer stay duplicates.
        let receipt = log.ingest(vec![event_on(resource, dev, 2)]).unwrap();
        assert_eq!(receipt.accepted, 0);
        assert_eq!(receipt.duplicates, 1);

        // New appends continue the sequence rather than restarting.
        assert_eq!(log.append(event_on(resource, dev, 4)).unwrap().value(), 4);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        let mut event = event_on(ResourceId::new(), device(1), 1);
        event.payload = vec![0u8; MAX_EVENT_PAYLOAD + 1];

        assert!(matches!(
            log.append(event.clone()),
            Err(StoreError::PayloadTooLarge { .. })
        ));
        assert!(matches!(
            log.ingest(vec![event]),
            Err(StoreError::PayloadTooLarge { .. })
        ));
        assert!(log.is_empty());
    }

    #[test]
    fn fresh_log_is_empty_with_zero_head() {
        let dir = tempdir().unwrap();
        let log = EventLog::open(dir.path().join("events.log")).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.head(), Cursor::zero());
        assert_eq!(log.since(Cursor::zero()).unwrap().count(), 0);
    }
}
