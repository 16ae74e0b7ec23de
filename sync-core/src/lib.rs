//! # sync-core
//!
//! Pure sync logic for tripshare (no I/O, instant tests).
//!
//! This crate implements the clocks and algorithms for sync without any
//! network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce
//! output without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about convergence
//!
//! The actual I/O (network, disk) is performed by `sync-store` and
//! `sync-engine`, which apply the plans and policies produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod reconcile;
pub mod resolve;
pub mod retry;

pub use clock::LamportClock;
pub use reconcile::{canonical_head, plan_ingest, IngestPlan};
pub use resolve::{precedence, resolve, supersedes, ConflictSet, ResolveError};
pub use retry::RetryPolicy;
