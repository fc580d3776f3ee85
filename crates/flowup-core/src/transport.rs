//! Transport port consumed by peer loops
//!
//! Mailbox semantics: every peer owns one inbound mailbox addressed by its
//! [`PeerId`]. Implementations must accept concurrent sends to the same
//! destination; peers never lock anything themselves.

use crate::{FlowResult, Message, PeerId};

/// Non-blocking mailbox transport
pub trait Transport: Send + Sync {
    /// Take at most one pending message for `peer`, never waiting.
    fn try_receive(&self, peer: PeerId) -> FlowResult<Option<Message>>;

    /// Fire-and-forget delivery. No acknowledgment and no ordering
    /// guarantee between messages.
    fn send(&self, dest: PeerId, message: Message, size_hint: usize) -> FlowResult<()>;
}

/// An outgoing message with its destination
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Envelope {
    pub to: PeerId,
    pub message: Message,
}

impl Envelope {
    pub fn new(to: PeerId, message: Message) -> Self {
        Self { to, message }
    }

    pub fn size_hint(&self) -> usize {
        self.message.size_hint()
    }

    /// Hand this envelope to a transport
    pub fn deliver<T: Transport + ?Sized>(self, transport: &T) -> FlowResult<()> {
        transport.send(self.to, self.message, self.size_hint())
    }
}
