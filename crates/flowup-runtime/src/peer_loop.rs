//! Peer loop - drives one peer against a transport and a clock
//!
//! Each iteration:
//! 1. Read the clock
//! 2. Take at most one message from the mailbox and dispatch it
//! 3. Run the strategy's timer check
//! 4. Send everything produced by 2 and 3
//! 5. Publish a snapshot
//! 6. Sleep one tick interval

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use flowup_core::{PeerId, Transport};
use flowup_peer::{Peer, PeerSnapshot};

use crate::Clock;

/// Read side of a peer's published snapshots
#[derive(Clone, Debug)]
pub struct SnapshotHandle {
    rx: watch::Receiver<PeerSnapshot>,
}

impl SnapshotHandle {
    pub fn peer(&self) -> PeerId {
        self.rx.borrow().id
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> PeerSnapshot {
        *self.rx.borrow()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub messages_in: u64,
    pub messages_out: u64,
    pub receive_errors: u64,
    pub send_errors: u64,
}

pub struct PeerLoop<T, C> {
    peer: Peer,
    transport: Arc<T>,
    clock: Arc<C>,
    tick_interval: Duration,
    publisher: watch::Sender<PeerSnapshot>,
    stats: LoopStats,
}

impl<T, C> PeerLoop<T, C>
where
    T: Transport + 'static,
    C: Clock,
{
    pub fn new(
        peer: Peer,
        tick_interval: Duration,
        transport: Arc<T>,
        clock: Arc<C>,
    ) -> (Self, SnapshotHandle) {
        let (publisher, rx) = watch::channel(peer.snapshot());
        let peer_loop = PeerLoop {
            peer,
            transport,
            clock,
            tick_interval,
            publisher,
            stats: LoopStats::default(),
        };
        (peer_loop, SnapshotHandle { rx })
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// One iteration without the trailing sleep
    pub fn step(&mut self) {
        let now = self.clock.now();
        let id = self.peer.id();
        self.stats.ticks += 1;

        let mut outgoing = match self.transport.try_receive(id) {
            Ok(Some(message)) => {
                self.stats.messages_in += 1;
                self.peer.handle(message, now)
            }
            Ok(None) => Vec::new(),
            Err(e) => {
                self.stats.receive_errors += 1;
                tracing::warn!(peer = %id, error = %e, "dropping undeliverable message");
                Vec::new()
            }
        };
        outgoing.extend(self.peer.tick(now));

        for envelope in outgoing {
            match envelope.deliver(self.transport.as_ref()) {
                Ok(()) => self.stats.messages_out += 1,
                Err(e) => {
                    self.stats.send_errors += 1;
                    tracing::warn!(peer = %id, to = %envelope.to, error = %e, "send failed");
                }
            }
        }

        self.publisher.send_replace(self.peer.snapshot());
    }

    /// Run until the task is dropped or aborted
    pub async fn run(mut self) {
        tracing::info!(
            peer = %self.peer.id(),
            value = self.peer.state().value(),
            neighbors = self.peer.state().neighbors().len(),
            strategy = %self.peer.strategy_kind(),
            "peer started"
        );

        loop {
            self.step();
            self.clock.sleep(self.tick_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelTransport, TokioClock};
    use bytes::Bytes;
    use flowup_core::{Message, PeerConfig};

    fn id(n: u64) -> PeerId {
        PeerId::new(n)
    }

    fn spawn_pair(transport: &Arc<ChannelTransport>, clock: &Arc<TokioClock>) -> Vec<PeerLoop<ChannelTransport, TokioClock>> {
        [(0, 10.0, 1), (1, 20.0, 0)]
            .into_iter()
            .map(|(me, value, other)| {
                transport.register(id(me));
                let config = PeerConfig::new(value)
                    .with_neighbors([id(other)])
                    .with_tick_timeout(3);
                let peer = Peer::new(id(me), &config).unwrap();
                PeerLoop::new(peer, config.tick_interval, Arc::clone(transport), Arc::clone(clock)).0
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_step_publishes_snapshot() {
        let transport = Arc::new(ChannelTransport::new());
        let clock = Arc::new(TokioClock::new());
        transport.register(id(0));

        let config = PeerConfig::new(8.0).with_tick_timeout(1);
        let peer = Peer::new(id(0), &config).unwrap();
        let (mut peer_loop, handle) = PeerLoop::new(peer, config.tick_interval, transport, clock);

        assert_eq!(handle.peer(), id(0));
        assert_eq!(handle.latest().last_avg, 0.0);

        peer_loop.step();
        assert_eq!(handle.latest().last_avg, 8.0);
        assert_eq!(handle.latest().rounds, 1);
        assert_eq!(peer_loop.stats().ticks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_error_does_not_stop_loop() {
        let transport = Arc::new(ChannelTransport::new());
        let clock = Arc::new(TokioClock::new());
        let mut loops = spawn_pair(&transport, &clock);

        transport
            .inject_raw(id(0), Bytes::from_static(&[0x7F]))
            .unwrap();
        loops[0].step();
        assert_eq!(loops[0].stats().receive_errors, 1);

        transport
            .send(id(0), Message::QueryLastAvg { requester: id(1) }, 9)
            .unwrap();
        loops[0].step();
        assert_eq!(loops[0].stats().messages_in, 1);
        assert_eq!(
            transport.try_receive(id(1)).unwrap(),
            Some(Message::LastAvgReport {
                sender: id(0),
                last_avg: 0.0
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pair_converges_under_virtual_time() {
        let transport = Arc::new(ChannelTransport::new());
        let clock = Arc::new(TokioClock::new());
        let loops = spawn_pair(&transport, &clock);
        let handles: Vec<SnapshotHandle> = loops
            .iter()
            .map(|l| SnapshotHandle {
                rx: l.publisher.subscribe(),
            })
            .collect();

        let tasks: Vec<_> = loops.into_iter().map(|l| tokio::spawn(l.run())).collect();
        tokio::time::sleep(Duration::from_secs(60)).await;

        for handle in &handles {
            assert!((handle.latest().last_avg - 15.0).abs() < 1e-6);
        }
        for task in tasks {
            task.abort();
        }
    }
}
