//! Event records and their logical-clock stamps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Cursor, DeviceId, EventId, ResourceId};

/// The kind of a transport-sharing event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A live position report for a vehicle or traveller.
    LocationPing,
    /// A trip began.
    TripStarted,
    /// A trip ended.
    TripEnded,
    /// Estimated arrival changed.
    EtaUpdated,
    /// Free-form rider note.
    Note,
}

impl EventKind {
    /// Stable lowercase name, used in CLI output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LocationPing => "location",
            EventKind::TripStarted => "trip-started",
            EventKind::TripEnded => "trip-ended",
            EventKind::EtaUpdated => "eta-updated",
            EventKind::Note => "note",
        }
    }

    /// Parse the name produced by [`EventKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "location" => Some(EventKind::LocationPing),
            "trip-started" => Some(EventKind::TripStarted),
            "trip-ended" => Some(EventKind::TripEnded),
            "eta-updated" => Some(EventKind::EtaUpdated),
            "note" => Some(EventKind::Note),
            _ => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Lamport stamp: per-device logical counter plus the device that
/// issued it.
///
/// Counters from one device are strictly increasing. Counters from
/// different devices may collide; conflict resolution breaks those ties
/// with the device-id ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LamportStamp {
    /// Logical counter value.
    pub counter: u64,
    /// Device that issued the stamp.
    pub device: DeviceId,
}

impl fmt::Display for LamportStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, &self.device.to_string()[..8])
    }
}

/// A single immutable record in the event log.
///
/// Events are created once and never mutated. Ordering and conflict
/// resolution use only the stamp; `recorded_at` is informational
/// wall-clock time and must not influence either.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique event id.
    pub id: EventId,
    /// Resource this event updates.
    pub resource: ResourceId,
    /// Logical-clock stamp assigned at creation.
    pub stamp: LamportStamp,
    /// What happened.
    pub kind: EventKind,
    /// Application payload, opaque to the sync layer.
    pub payload: Vec<u8>,
    /// Wall-clock seconds since the Unix epoch when the event was
    /// created. Informational only.
    pub recorded_at: u64,
}

impl Event {
    /// Create a new event with a fresh id and the current wall-clock
    /// time.
    pub fn new(resource: ResourceId, stamp: LamportStamp, kind: EventKind, payload: Vec<u8>) -> Self {
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            id: EventId::new(),
            resource,
            stamp,
            kind,
            payload,
            recorded_at,
        }
    }

    /// Device that created this event.
    pub fn device(&self) -> DeviceId {
        self.stamp.device
    }

    /// Logical counter of this event's stamp.
    pub fn counter(&self) -> u64 {
        self.stamp.counter
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payloads carry rider locations; keep them out of logs.
        f.debug_struct("Event")
            .field("id", &self.id)
            .field("resource", &self.resource)
            .field("stamp", &self.stamp)
            .field("kind", &self.kind)
            .field("payload", &format!("[{} bytes]", self.payload.len()))
            .field("recorded_at", &self.recorded_at)
            .finish()
    }
}

/// An event paired with its local log sequence number.
///
/// This is both the on-disk record format and the item shape servers
/// return from event queries, so receivers can resume from `seq`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEvent {
    /// Position in the serving device's log.
    pub seq: Cursor,
    /// The event itself.
    pub event: Event,
}
