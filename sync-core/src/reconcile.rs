//! Planning remote-event ingestion.
//!
//! Given a batch of events arriving from a peer, the plan splits them
//! into fresh events to append and duplicates to drop, and surfaces the
//! conflict sets the batch creates against the local canonical heads.
//! Planning is pure; the event log applies the plan.

use std::collections::{BTreeMap, HashMap};

use sync_types::{DeviceId, Event, ResourceId};

use crate::resolve::{supersedes, ConflictSet};

/// Outcome of planning one incoming batch.
#[derive(Debug, Clone)]
pub struct IngestPlan {
    /// Events not yet covered by the local clock table, in arrival order.
    pub fresh: Vec<Event>,
    /// Events dropped because the log already covers them.
    pub duplicates: usize,
    /// Conflicts the fresh events open against local canonical heads,
    /// ordered by resource for determinism.
    pub conflicts: Vec<ConflictSet>,
}

impl IngestPlan {
    /// Whether the batch contained anything new.
    pub fn has_fresh(&self) -> bool {
        !self.fresh.is_empty()
    }
}

/// Split an incoming batch into fresh events, duplicates, and conflicts.
///
/// An event is fresh when its counter exceeds the clock-table entry for
/// its device; peers deliver each device's events in counter order, so
/// anything at or below the recorded counter has been seen before. The
/// scratch table also catches duplicates within the batch itself.
///
/// A resource develops a conflict when a fresh event and the current
/// local head come from different devices and the fresh counter does not
/// exceed the head's. Equal counters are the genuinely concurrent case;
/// lower counters are late arrivals that lost before they landed.
pub fn plan_ingest(
    incoming: Vec<Event>,
    clock_table: &HashMap<DeviceId, u64>,
    heads: &HashMap<ResourceId, Event>,
) -> IngestPlan {
    let mut seen = clock_table.clone();
    let mut fresh = Vec::with_capacity(incoming.len());
    let mut duplicates = 0;

    for event in incoming {
        let last = seen.get(&event.device()).copied().unwrap_or(0);
        if event.counter() > last {
            seen.insert(event.device(), event.counter());
            fresh.push(event);
        } else {
            duplicates += 1;
        }
    }

    let mut contested: BTreeMap<ResourceId, Vec<Event>> = BTreeMap::new();
    for event in &fresh {
        let Some(head) = heads.get(&event.resource) else {
            continue;
        };
        if event.device() != head.device() && event.counter() <= head.counter() {
            contested
                .entry(event.resource)
                .or_default()
                .push(event.clone());
        }
    }

    let conflicts = contested
        .into_iter()
        .map(|(resource, challengers)| {
            let mut members = Vec::with_capacity(challengers.len() + 1);
            if let Some(head) = heads.get(&resource) {
                members.push(head.clone());
            }
            members.extend(challengers);
            ConflictSet::from_parts(resource, members)
        })
        .collect();

    IngestPlan {
        fresh,
        duplicates,
        conflicts,
    }
}

/// Fold the canonical head out of a resource's events.
///
/// Pure and order-independent, so replicas holding the same event set
/// agree on the head without coordination.
pub fn canonical_head<'a, I>(events: I) -> Option<&'a Event>
where
    I: IntoIterator<Item = &'a Event>,
{
    let mut head: Option<&Event> = None;
    for event in events {
        head = match head {
            Some(current) if !supersedes(event, current) => Some(current),
            _ => Some(event),
        };
    }
    head
}
