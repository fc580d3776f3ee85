//! Collect-all strategy: a barrier over the neighbor set
//!
//! The peer waits until every neighbor has answered since the last round,
//! then recomputes over all edges at once. A tick counter releases the
//! barrier after `tick_timeout` ticks, so a round completes within
//! `tick_timeout * tick_interval` even if some neighbors stay silent.

use std::collections::HashSet;
use std::time::Duration;

use flowup_core::{Envelope, PeerId, StrategyKind};

use crate::{recompute_and_send, PeerState, Scope, Strategy};

/// Barrier-based scheduling
#[derive(Debug, Clone)]
pub struct CollectAll {
    tick_timeout: u32,
    /// Neighbors heard from since the last round
    responded: HashSet<PeerId>,
    ticks_since_round: u32,
    forced_rounds: u64,
}

impl CollectAll {
    pub fn new(tick_timeout: u32) -> Self {
        CollectAll {
            tick_timeout,
            responded: HashSet::new(),
            ticks_since_round: 0,
            forced_rounds: 0,
        }
    }

    pub fn ticks_since_round(&self) -> u32 {
        self.ticks_since_round
    }

    pub fn has_responded(&self, peer: PeerId) -> bool {
        self.responded.contains(&peer)
    }

    /// Rounds released by the timeout rather than by the barrier
    pub fn forced_rounds(&self) -> u64 {
        self.forced_rounds
    }

    fn barrier_complete(&self, state: &PeerState) -> bool {
        state.neighbors().iter().all(|n| self.responded.contains(n))
    }

    fn fire(&mut self, state: &mut PeerState) -> Vec<Envelope> {
        let outgoing = recompute_and_send(state, Scope::AllNeighbors);
        self.responded.clear();
        self.ticks_since_round = 0;
        outgoing
    }
}

impl Strategy for CollectAll {
    fn kind(&self) -> StrategyKind {
        StrategyKind::CollectAll
    }

    fn on_receive(
        &mut self,
        state: &mut PeerState,
        sender: PeerId,
        _now: Duration,
    ) -> Vec<Envelope> {
        self.responded.insert(sender);

        if self.barrier_complete(state) {
            self.fire(state)
        } else {
            Vec::new()
        }
    }

    fn on_tick(&mut self, state: &mut PeerState, _now: Duration) -> Vec<Envelope> {
        self.ticks_since_round += 1;
        if self.ticks_since_round < self.tick_timeout {
            return Vec::new();
        }

        self.forced_rounds += 1;
        tracing::debug!(
            peer = %state.id(),
            responded = self.responded.len(),
            neighbors = state.neighbors().len(),
            "barrier timed out, forcing round"
        );
        self.fire(state)
    }
}
