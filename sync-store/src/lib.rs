//! # sync-store
//!
//! Durable storage for a tripshare device: the append-only event log
//! and the JSON sidecar of per-peer cursors.
//!
//! ## Design Philosophy
//!
//! Storage is synchronous and lock-based. Every operation is a short
//! critical section over in-memory state mirrored from disk, so async
//! callers can wrap calls in `spawn_blocking` if they ever contend.
//! Durability is explicit: an append is not acknowledged until the
//! bytes are flushed, and an error after the write means
//! "unacknowledged", never "absent".
//!
//! - [`EventLog`] - the log file, replayed fully at open
//! - [`PeerBook`] - per-peer sync state, rewritten atomically
//! - [`StoreError`] - everything that can go wrong below the sync layer

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod log;
mod peers;

pub use error::{Result, StoreError};
pub use log::{EventLog, EventStream, IngestReceipt};
pub use peers::{PeerBook, PeerState};
