//! # sync-types
//!
//! Wire format types for the tripshare local-first sync protocol.
//!
//! This crate provides the foundational types used across all tripshare
//! crates:
//! - [`DeviceId`], [`EventId`], [`ResourceId`], [`Cursor`] - Identity and ordering types
//! - [`Event`], [`LamportStamp`], [`SequencedEvent`] - Log records and their clocks
//! - [`Message`] - Protocol messages (Hello, GetEvents, PutEvents, etc.)
//! - [`WireError`] - Codec error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod event;
mod ids;
mod messages;

pub use error::WireError;
pub use event::{Event, EventKind, LamportStamp, SequencedEvent};
pub use ids::{Cursor, DeviceId, EventId, ResourceId};
pub use messages::{
    Bye, EventBatch, GetEvents, Hello, Message, PutAck, PutEvents, Welcome, MAX_EVENT_PAYLOAD,
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
