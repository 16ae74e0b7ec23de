//! Protocol messages exchanged between peers.
//!
//! Every device speaks the same protocol whether it is dialing out or
//! answering: a `Hello`/`Welcome` handshake, then any number of
//! `GetEvents`/`PutEvents` exchanges, then `Bye`.

use serde::{Deserialize, Serialize};

use crate::{Cursor, DeviceId, Event, SequencedEvent, WireError};

/// Protocol version spoken by this build.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum size of a single framed message (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Maximum size of one event payload (64 KiB).
///
/// Kept well under [`MAX_MESSAGE_SIZE`] so a batch of events always
/// fits in a frame.
pub const MAX_EVENT_PAYLOAD: usize = 64 * 1024;

/// All possible protocol messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Initial handshake
    Hello(Hello),
    /// Response to Hello
    Welcome(Welcome),
    /// Request events after a cursor
    GetEvents(GetEvents),
    /// Response to GetEvents
    EventBatch(EventBatch),
    /// Deliver events to the peer
    PutEvents(PutEvents),
    /// Acknowledge a PutEvents
    PutAck(PutAck),
    /// Graceful disconnect
    Bye(Bye),
}

impl Message {
    /// Serialize to MessagePack bytes.
    ///
    /// Messages larger than [`MAX_MESSAGE_SIZE`] fail to encode, so no
    /// transport ever has to carry a frame the other side will refuse.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        let bytes = rmp_serde::to_vec(self).map_err(WireError::Serialization)?;
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(WireError::MessageTooLarge {
                size: bytes.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        Ok(bytes)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }
}

/// Initial handshake message sent by the dialing device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Protocol version (currently 1)
    pub version: u8,
    /// Dialing device
    pub device: DeviceId,
    /// Human-readable device name
    pub device_name: String,
}

/// Response to the Hello handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    /// Protocol version supported by the answering device
    pub version: u8,
    /// How far the answering device has read the caller's log; the
    /// caller should send events after this position
    pub cursor: Cursor,
    /// Head of the answering device's own log
    pub head: Cursor,
}

/// Request events with sequence greater than `since`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEvents {
    /// Requesting device
    pub from: DeviceId,
    /// Return events with seq > this value
    pub since: Cursor,
    /// Maximum number of events to return
    pub limit: u32,
}

/// Response to a GetEvents request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBatch {
    /// Events in append order
    pub events: Vec<SequencedEvent>,
    /// Whether more events remain past this batch
    pub has_more: bool,
    /// Highest sequence scanned for this batch; pass as `since` to
    /// continue (advances past echo-suppressed events too)
    pub max_cursor: Cursor,
}

/// Deliver events from the sender's log to the receiving peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutEvents {
    /// Sending device
    pub from: DeviceId,
    /// The events themselves, in the sender's append order
    pub events: Vec<Event>,
    /// Sender log position covered by this delivery; acknowledged as
    /// the receiver's cursor into the sender's log
    pub up_to: Cursor,
}

/// Acknowledgement that a PutEvents was durably stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutAck {
    /// Events newly stored (duplicates excluded)
    pub accepted: u32,
    /// Receiver's cursor into the sender's log after this delivery
    pub cursor: Cursor,
}

/// Graceful disconnect message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bye {
    /// Optional reason for disconnect
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, LamportStamp, ResourceId};

    fn sample_event(counter: u64) -> Event {
        Event::new(
            ResourceId::new(),
            LamportStamp {
                counter,
                device: DeviceId::random(),
            },
            EventKind::Note,
            vec![1, 2, 3],
        )
    }

    #[test]
    fn hello_roundtrip() {
        let hello = Hello {
            version: PROTOCOL_VERSION,
            device: DeviceId::random(),
            device_name: "Pixel 8".into(),
        };

        let bytes = rmp_serde::to_vec(&hello).unwrap();
        let restored: Hello = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(hello, restored);
    }

    #[test]
    fn event_batch_roundtrip() {
        let batch = EventBatch {
            events: vec![
                SequencedEvent {
                    seq: Cursor::new(1),
                    event: sample_event(1),
                },
                SequencedEvent {
                    seq: Cursor::new(2),
                    event: sample_event(2),
                },
            ],
            has_more: true,
            max_cursor: Cursor::new(2),
        };

        let bytes = rmp_serde::to_vec(&batch).unwrap();
        let restored: EventBatch = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(batch.events.len(), restored.events.len());
        assert_eq!(batch.has_more, restored.has_more);
        assert_eq!(batch.max_cursor, restored.max_cursor);
    }

    #[test]
    fn put_events_carries_watermark() {
        let put = PutEvents {
            from: DeviceId::random(),
            events: vec![sample_event(5)],
            up_to: Cursor::new(17),
        };

        let bytes = rmp_serde::to_vec(&put).unwrap();
        let restored: PutEvents = rmp_serde::from_slice(&bytes).unwrap();

        assert_eq!(restored.up_to, Cursor::new(17));
        assert_eq!(restored.events.len(), 1);
    }

    #[test]
    fn message_enum_roundtrip() {
        let msg = Message::PutAck(PutAck {
            accepted: 3,
            cursor: Cursor::new(40),
        });

        let bytes = msg.to_bytes().unwrap();
        let restored = Message::from_bytes(&bytes).unwrap();

        assert_eq!(msg, restored);
    }

    #[test]
    fn bye_without_reason() {
        let bye = Bye { reason: None };

        let bytes = rmp_serde::to_vec(&bye).unwrap();
        let restored: Bye = rmp_serde::from_slice(&bytes).unwrap();

        assert!(restored.reason.is_none());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(Message::from_bytes(&[0xFF, 0x00, 0x13, 0x37]).is_err());
    }

    #[test]
    fn oversized_message_fails_to_encode() {
        let mut event = sample_event(1);
        event.payload = vec![0u8; MAX_MESSAGE_SIZE + 1];
        let msg = Message::PutEvents(PutEvents {
            from: DeviceId::random(),
            events: vec![event],
            up_to: Cursor::new(1),
        });

        match msg.to_bytes() {
            Err(WireError::MessageTooLarge { size, max }) => {
                assert!(size > max);
                assert_eq!(max, MAX_MESSAGE_SIZE);
            }
            other => panic!("expected MessageTooLarge, got {other:?}"),
        }
    }
}
