//! Simulated network - a tick-driven, seeded [`Transport`]
//!
//! Time is an explicit tick counter advanced by the driver. A message sent
//! at tick `t` becomes deliverable at `t + latency`; `try_receive` returns
//! the first deliverable message in queue order, so a reordered message
//! can overtake older ones but nothing is delivered early.

use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;

use flowup_core::{FlowError, FlowResult, Message, PeerId, Transport};

use crate::{ChaosConfig, ChaosStats};

#[derive(Clone, Copy, Debug)]
struct InFlight {
    message: Message,
    sent_at: u64,
    deliver_at: u64,
}

struct Inner {
    config: ChaosConfig,
    rng: StdRng,
    now: u64,
    mailboxes: BTreeMap<PeerId, VecDeque<InFlight>>,
    stats: ChaosStats,
}

pub struct SimNetwork {
    inner: Mutex<Inner>,
}

impl SimNetwork {
    pub fn new(config: ChaosConfig, seed: u64) -> Self {
        SimNetwork {
            inner: Mutex::new(Inner {
                config,
                rng: StdRng::seed_from_u64(seed),
                now: 0,
                mailboxes: BTreeMap::new(),
                stats: ChaosStats::default(),
            }),
        }
    }

    pub fn reliable() -> Self {
        Self::new(ChaosConfig::reliable(), 0)
    }

    /// Create a mailbox. Returns `false` if `peer` already has one.
    pub fn register(&self, peer: PeerId) -> bool {
        let mut inner = self.inner.lock();
        if inner.mailboxes.contains_key(&peer) {
            return false;
        }
        inner.mailboxes.insert(peer, VecDeque::new());
        true
    }

    pub fn now(&self) -> u64 {
        self.inner.lock().now
    }

    /// Move the clock forward; never backwards
    pub fn advance_to(&self, tick: u64) {
        let mut inner = self.inner.lock();
        inner.now = inner.now.max(tick);
    }

    /// Messages queued for `peer`, deliverable or not
    pub fn pending(&self, peer: PeerId) -> usize {
        self.inner
            .lock()
            .mailboxes
            .get(&peer)
            .map_or(0, VecDeque::len)
    }

    pub fn stats(&self) -> ChaosStats {
        self.inner.lock().stats
    }
}

impl Transport for SimNetwork {
    fn try_receive(&self, peer: PeerId) -> FlowResult<Option<Message>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = inner.now;

        let queue = inner
            .mailboxes
            .get_mut(&peer)
            .ok_or(FlowError::UnknownPeer(peer))?;
        let Some(item) = queue
            .iter()
            .position(|m| m.deliver_at <= now)
            .and_then(|pos| queue.remove(pos))
        else {
            return Ok(None);
        };

        inner.stats.messages_delivered += 1;
        inner.stats.total_latency_ticks += now - item.sent_at;
        Ok(Some(item.message))
    }

    fn send(&self, dest: PeerId, message: Message, _size_hint: usize) -> FlowResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let queue = inner
            .mailboxes
            .get_mut(&dest)
            .ok_or(FlowError::UnknownPeer(dest))?;
        inner.stats.messages_sent += 1;

        if let Message::FlowUpdating(update) = message {
            let older = queue.iter().position(|m| {
                matches!(m.message, Message::FlowUpdating(old) if old.sender == update.sender)
            });
            if let Some(pos) = older {
                if inner.config.should_drop_superseded(&mut inner.rng) {
                    queue.remove(pos);
                    inner.stats.messages_superseded += 1;
                }
            }
        }

        let latency = inner.config.sample_latency(&mut inner.rng);
        let jump = inner.config.sample_reorder(&mut inner.rng, queue.len());
        if jump > 0 {
            inner.stats.messages_reordered += 1;
        }
        let at = queue.len() - jump;
        queue.insert(
            at,
            InFlight {
                message,
                sent_at: inner.now,
                deliver_at: inner.now + latency,
            },
        );
        inner.stats.max_backlog = inner.stats.max_backlog.max(queue.len());
        Ok(())
    }
}
