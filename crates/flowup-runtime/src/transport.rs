//! In-process channel transport
//!
//! One unbounded tokio mailbox per registered peer. Frames travel encoded,
//! so the receiving side decodes them and can reject unknown tags. Senders
//! only take the registry read lock; mpsc handles concurrent delivery to
//! the same destination.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{self, error::TryRecvError};

use flowup_core::{FlowError, FlowResult, Message, PeerId, Transport};

struct Mailbox {
    tx: mpsc::UnboundedSender<Bytes>,
    /// Only the owning peer loop polls this
    rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl Mailbox {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Mailbox {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

/// Transport counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub messages_sent: u64,
    /// Sum of the size hints of sent messages
    pub bytes_sent: u64,
    pub messages_received: u64,
    pub decode_failures: u64,
}

#[derive(Default)]
struct Counters {
    messages_sent: AtomicU64,
    bytes_sent: AtomicU64,
    messages_received: AtomicU64,
    decode_failures: AtomicU64,
}

/// Mailbox transport over tokio channels
#[derive(Default)]
pub struct ChannelTransport {
    mailboxes: RwLock<HashMap<PeerId, Mailbox>>,
    counters: Counters,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mailbox for `peer`. Returns `false` if one already exists.
    pub fn register(&self, peer: PeerId) -> bool {
        let mut mailboxes = self.mailboxes.write();
        if mailboxes.contains_key(&peer) {
            return false;
        }
        mailboxes.insert(peer, Mailbox::new());
        true
    }

    pub fn is_registered(&self, peer: PeerId) -> bool {
        self.mailboxes.read().contains_key(&peer)
    }

    /// Push an arbitrary frame into a mailbox, bypassing the encoder
    pub fn inject_raw(&self, dest: PeerId, frame: Bytes) -> FlowResult<()> {
        self.push(dest, frame)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            messages_sent: self.counters.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            messages_received: self.counters.messages_received.load(Ordering::Relaxed),
            decode_failures: self.counters.decode_failures.load(Ordering::Relaxed),
        }
    }

    fn push(&self, dest: PeerId, frame: Bytes) -> FlowResult<()> {
        let mailboxes = self.mailboxes.read();
        let mailbox = mailboxes.get(&dest).ok_or(FlowError::UnknownPeer(dest))?;
        mailbox
            .tx
            .send(frame)
            .map_err(|_| FlowError::MailboxClosed(dest))
    }
}

impl Transport for ChannelTransport {
    fn try_receive(&self, peer: PeerId) -> FlowResult<Option<Message>> {
        let frame = {
            let mailboxes = self.mailboxes.read();
            let mailbox = mailboxes.get(&peer).ok_or(FlowError::UnknownPeer(peer))?;
            let mut rx = mailbox.rx.lock();
            match rx.try_recv() {
                Ok(frame) => frame,
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(FlowError::MailboxClosed(peer)),
            }
        };

        self.counters.messages_received.fetch_add(1, Ordering::Relaxed);
        match Message::decode(&frame) {
            Ok(message) => Ok(Some(message)),
            Err(e) => {
                self.counters.decode_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    fn send(&self, dest: PeerId, message: Message, size_hint: usize) -> FlowResult<()> {
        self.push(dest, message.encode())?;
        self.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_sent
            .fetch_add(size_hint as u64, Ordering::Relaxed);
        Ok(())
    }
}
