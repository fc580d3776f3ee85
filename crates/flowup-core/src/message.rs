//! Message envelope exchanged between peers
//!
//! Every message carries an explicit [`MessageTag`] so the dispatcher can
//! tell averaging traffic apart from diagnostic queries without inspecting
//! payload structure.
//!
//! The codec below is a compact little-endian layout:
//!
//! ```text
//! [tag:1][sender:8][payload...]
//! FlowUpdating   payload = [flow:f64][estimate:f64]
//! QueryLastAvg   payload = (none)
//! LastAvgReport  payload = [last_avg:f64]
//! ```
//!
//! It exists for transport accounting and for channel transports that move
//! opaque frames; it is not a stable interchange format.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::{FlowError, FlowResult, PeerId};

/// Tag byte plus sender id
pub const HEADER_SIZE: usize = 9;

/// Message type discriminant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageTag {
    /// Flow/estimate update for one edge
    FlowUpdating = 0x01,
    /// Diagnostic request for a peer's current average
    QueryLastAvg = 0x02,
    /// Answer to [`MessageTag::QueryLastAvg`]
    LastAvgReport = 0x03,
}

impl MessageTag {
    /// Parse from wire byte
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MessageTag::FlowUpdating),
            0x02 => Some(MessageTag::QueryLastAvg),
            0x03 => Some(MessageTag::LastAvgReport),
            _ => None,
        }
    }

    /// Convert to wire byte
    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Total encoded length of a message with this tag
    pub fn encoded_len(self) -> usize {
        match self {
            MessageTag::FlowUpdating => HEADER_SIZE + 16,
            MessageTag::QueryLastAvg => HEADER_SIZE,
            MessageTag::LastAvgReport => HEADER_SIZE + 8,
        }
    }
}

/// Flow Updating payload. `flow` is expressed from the sender's side of
/// the edge; the receiver stores its negation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowUpdatingMessage {
    pub sender: PeerId,
    pub flow: f64,
    pub estimate: f64,
}

impl FlowUpdatingMessage {
    pub fn new(sender: PeerId, flow: f64, estimate: f64) -> Self {
        Self {
            sender,
            flow,
            estimate,
        }
    }
}

/// Tagged message envelope
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Message {
    FlowUpdating(FlowUpdatingMessage),
    QueryLastAvg { requester: PeerId },
    LastAvgReport { sender: PeerId, last_avg: f64 },
}

impl Message {
    pub fn tag(&self) -> MessageTag {
        match self {
            Message::FlowUpdating(_) => MessageTag::FlowUpdating,
            Message::QueryLastAvg { .. } => MessageTag::QueryLastAvg,
            Message::LastAvgReport { .. } => MessageTag::LastAvgReport,
        }
    }

    /// Originating peer
    pub fn sender(&self) -> PeerId {
        match self {
            Message::FlowUpdating(msg) => msg.sender,
            Message::QueryLastAvg { requester } => *requester,
            Message::LastAvgReport { sender, .. } => *sender,
        }
    }

    /// Logical payload size reported to the transport
    pub fn size_hint(&self) -> usize {
        self.tag().encoded_len()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size_hint());
        buf.put_u8(self.tag().to_byte());
        buf.put_u64_le(self.sender().raw());

        match self {
            Message::FlowUpdating(msg) => {
                buf.put_f64_le(msg.flow);
                buf.put_f64_le(msg.estimate);
            }
            Message::QueryLastAvg { .. } => {}
            Message::LastAvgReport { last_avg, .. } => buf.put_f64_le(*last_avg),
        }

        buf.freeze()
    }

    pub fn decode(buf: &[u8]) -> FlowResult<Message> {
        let Some(&first) = buf.first() else {
            return Err(FlowError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: 0,
            });
        };

        let tag = MessageTag::from_byte(first).ok_or(FlowError::UnknownMessageTag(first))?;
        let expected = tag.encoded_len();
        if buf.len() < expected {
            return Err(FlowError::BufferTooShort {
                expected,
                actual: buf.len(),
            });
        }
        if buf.len() > expected {
            return Err(FlowError::InvalidWireFormat(format!(
                "{} trailing bytes after {:?}",
                buf.len() - expected,
                tag
            )));
        }

        let mut cursor = &buf[1..];
        let sender = PeerId::new(cursor.get_u64_le());

        let message = match tag {
            MessageTag::FlowUpdating => {
                let flow = cursor.get_f64_le();
                let estimate = cursor.get_f64_le();
                Message::FlowUpdating(FlowUpdatingMessage::new(sender, flow, estimate))
            }
            MessageTag::QueryLastAvg => Message::QueryLastAvg { requester: sender },
            MessageTag::LastAvgReport => Message::LastAvgReport {
                sender,
                last_avg: cursor.get_f64_le(),
            },
        };

        Ok(message)
    }
}

impl From<FlowUpdatingMessage> for Message {
    fn from(msg: FlowUpdatingMessage) -> Self {
        Message::FlowUpdating(msg)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::FlowUpdating(msg) => write!(
                f,
                "FlowUpdating(from={}, flow={}, estimate={})",
                msg.sender, msg.flow, msg.estimate
            ),
            Message::QueryLastAvg { requester } => write!(f, "QueryLastAvg(from={})", requester),
            Message::LastAvgReport { sender, last_avg } => {
                write!(f, "LastAvgReport(from={}, last_avg={})", sender, last_avg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_flow_message_roundtrip() {
        let msg = Message::from(FlowUpdatingMessage::new(PeerId::new(9), -2.5, 15.0));
        let bytes = msg.encode();

        assert_eq!(bytes.len(), msg.size_hint());
        assert_eq!(bytes[0], MessageTag::FlowUpdating.to_byte());
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_query_is_header_only() {
        let msg = Message::QueryLastAvg {
            requester: PeerId::new(1),
        };
        assert_eq!(msg.size_hint(), HEADER_SIZE);
        assert_eq!(msg.sender(), PeerId::new(1));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut frame = vec![0xEEu8];
        frame.extend_from_slice(&PeerId::new(1).to_bytes());

        assert_eq!(
            Message::decode(&frame),
            Err(FlowError::UnknownMessageTag(0xEE))
        );
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let bytes = Message::LastAvgReport {
            sender: PeerId::new(2),
            last_avg: 1.0,
        }
        .encode();

        let err = Message::decode(&bytes[..10]).unwrap_err();
        assert_eq!(
            err,
            FlowError::BufferTooShort {
                expected: 17,
                actual: 10
            }
        );
        assert!(Message::decode(&[]).is_err());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut frame = Message::QueryLastAvg {
            requester: PeerId::new(3),
        }
        .encode()
        .to_vec();
        frame.push(0);

        assert!(matches!(
            Message::decode(&frame),
            Err(FlowError::InvalidWireFormat(_))
        ));
    }

    proptest! {
        #[test]
        fn decode_never_panics(frame in proptest::collection::vec(any::<u8>(), 0..40)) {
            let _ = Message::decode(&frame);
        }
    }
}
