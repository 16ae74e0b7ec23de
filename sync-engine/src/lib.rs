//! # sync-engine
//!
//! The sync layer of tripshare: dialing peers, answering peers, and
//! deciding when to do either.
//!
//! ## Pieces
//!
//! - [`PeerService`] - one device's sync brain: log, peer book and
//!   Lamport clock behind a single handle
//! - [`SyncCoordinator`] - dials a peer, pushes and pulls events,
//!   retries transient failures with backoff under a deadline
//! - [`PeerListener`] - answers inbound sessions from the same state
//! - [`ConnectivityMonitor`] - online/offline state; coming back
//!   online syncs every peer
//! - [`Transport`] - pluggable byte transport; TCP for real peers, a
//!   scripted mock for tests
//!
//! Both ends of a session run the same protocol over the same service
//! type, so two devices converge regardless of which one dialed.
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{EngineConfig, PeerService, SyncCoordinator, TcpTransport};
//!
//! let service = Arc::new(PeerService::new(device, "phone", log, peers, limits));
//! let coordinator = SyncCoordinator::new(service, TcpTransport::new(), config);
//! let report = coordinator.sync_with(peer).await?;
//! println!("sent {} received {}", report.sent, report.received);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod listener;
pub mod service;
pub mod transport;

mod wire;

pub use config::{ConfigError, EngineConfig};
pub use connectivity::{spawn_autosync, Connectivity, ConnectivityMonitor};
pub use coordinator::{SyncCoordinator, SyncReport};
pub use error::{EngineError, Result};
pub use listener::PeerListener;
pub use service::{Absorbed, BatchLimits, PeerService};
pub use transport::{MockTransport, TcpTransport, Transport, TransportError};
