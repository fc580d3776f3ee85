//! Pairwise strategy: independent per-edge timers, no barrier
//!
//! Every incoming update immediately triggers a round over that single
//! edge, which both answers the sender and refreshes the edge. On each
//! tick, any edge not refreshed within the staleness horizon gets its own
//! round. A silent neighbor therefore never delays other edges.

use std::collections::HashMap;
use std::time::Duration;

use flowup_core::{Envelope, PeerId, StrategyKind};

use crate::{recompute_and_send, PeerState, Scope, Strategy};

/// Per-edge scheduling
#[derive(Debug, Clone)]
pub struct Pairwise {
    staleness: Duration,
    /// Last round per edge; edges never refreshed read as time zero
    last_refresh: HashMap<PeerId, Duration>,
}

impl Pairwise {
    pub fn new(staleness: Duration) -> Self {
        Pairwise {
            staleness,
            last_refresh: HashMap::new(),
        }
    }

    pub fn last_refresh(&self, peer: PeerId) -> Duration {
        self.last_refresh
            .get(&peer)
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    fn refresh(&mut self, state: &mut PeerState, peer: PeerId, now: Duration) -> Vec<Envelope> {
        let outgoing = recompute_and_send(state, Scope::Edge(peer));
        self.last_refresh.insert(peer, now);
        outgoing
    }
}

impl Strategy for Pairwise {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Pairwise
    }

    fn on_receive(&mut self, state: &mut PeerState, sender: PeerId, now: Duration) -> Vec<Envelope> {
        self.refresh(state, sender, now)
    }

    fn on_tick(&mut self, state: &mut PeerState, now: Duration) -> Vec<Envelope> {
        // Nothing can be stale before one full horizon has elapsed
        let Some(threshold) = now.checked_sub(self.staleness) else {
            return Vec::new();
        };

        let stale: Vec<PeerId> = state
            .neighbors()
            .iter()
            .copied()
            .filter(|n| self.last_refresh(*n) < threshold)
            .collect();

        let mut outgoing = Vec::with_capacity(stale.len());
        for peer in stale {
            tracing::debug!(peer = %state.id(), edge = %peer, "edge stale, refreshing");
            outgoing.extend(self.refresh(state, peer, now));
        }
        outgoing
    }
}
