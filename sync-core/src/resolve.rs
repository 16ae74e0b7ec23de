//! Deterministic conflict resolution.
//!
//! When two devices update the same resource concurrently, every device
//! must pick the same winner without coordination. The rule is fixed:
//! the higher Lamport counter wins, and an exact counter tie goes to the
//! lexicographically smaller device id. Resolution selects one of the
//! conflicting events; it never synthesizes a merged event.

use std::cmp::Ordering;

use sync_types::{Event, LamportStamp, ResourceId};
use thiserror::Error;

/// Errors from conflict-set construction or resolution.
///
/// These indicate a bug in the calling layer, not a recoverable sync
/// condition.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Resolution was asked to pick from nothing
    #[error("conflict set is empty")]
    EmptySet,

    /// A conflict set may only span one resource
    #[error("conflict set for {expected} was offered an event for {found}")]
    MixedResources {
        /// Resource the set was created for
        expected: ResourceId,
        /// Resource of the rejected event
        found: ResourceId,
    },
}

/// Stamp precedence: `Greater` means the left stamp wins.
///
/// Higher counter first, then the reversed device ordering so the
/// smaller device id takes equal counters.
pub fn precedence(a: &LamportStamp, b: &LamportStamp) -> Ordering {
    a.counter
        .cmp(&b.counter)
        .then_with(|| b.device.cmp(&a.device))
}

/// Whether `challenger` replaces `incumbent` as the canonical event.
///
/// Distinct events never share a stamp when logs enforce per-device
/// counter ordering; the event-id comparison keeps the relation total
/// even for malformed input.
pub fn supersedes(challenger: &Event, incumbent: &Event) -> bool {
    match precedence(&challenger.stamp, &incumbent.stamp) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => challenger.id.as_bytes() < incumbent.id.as_bytes(),
    }
}

/// A group of events touching one resource with concurrent stamps.
#[derive(Debug, Clone)]
pub struct ConflictSet {
    resource: ResourceId,
    events: Vec<Event>,
}

impl ConflictSet {
    /// Create an empty set for a resource.
    pub fn new(resource: ResourceId) -> Self {
        Self {
            resource,
            events: Vec::new(),
        }
    }

    /// Build a set from events, all of which must share one resource.
    pub fn from_events<I: IntoIterator<Item = Event>>(events: I) -> Result<Self, ResolveError> {
        let mut iter = events.into_iter();
        let first = iter.next().ok_or(ResolveError::EmptySet)?;
        let mut set = Self::new(first.resource);
        set.push(first)?;
        for event in iter {
            set.push(event)?;
        }
        Ok(set)
    }

    pub(crate) fn from_parts(resource: ResourceId, events: Vec<Event>) -> Self {
        Self { resource, events }
    }

    /// Add an event, rejecting one for a different resource.
    pub fn push(&mut self, event: Event) -> Result<(), ResolveError> {
        if event.resource != self.resource {
            return Err(ResolveError::MixedResources {
                expected: self.resource,
                found: event.resource,
            });
        }
        self.events.push(event);
        Ok(())
    }

    /// Resource the set belongs to.
    pub fn resource(&self) -> ResourceId {
        self.resource
    }

    /// The conflicting events, in insertion order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Number of events in the set.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the set holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Pick the canonical event from a conflict set.
///
/// Pure and insertion-order independent: every device resolving the
/// same set gets the same winner.
pub fn resolve(set: &ConflictSet) -> Result<&Event, ResolveError> {
    let mut winner = set.events.first().ok_or(ResolveError::EmptySet)?;
    for event in &set.events[1..] {
        if supersedes(event, winner) {
            winner = event;
        }
    }
    Ok(winner)
}
