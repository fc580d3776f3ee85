//! Per-peer Flow Updating state
//!
//! Each peer keeps, per neighbor edge, the flow it believes it has sent
//! over that edge and the last estimate it holds for the neighbor. Unknown
//! edges read as `0.0` until first touched.
//!
//! INVARIANT: `value` is set once at construction and never written again,
//! so the network-wide sum of values is fixed for the whole run.

use std::collections::HashMap;

use flowup_core::{FlowUpdatingMessage, PeerId};

/// Point-in-time view of a peer, safe to hand to diagnostics
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct PeerSnapshot {
    pub id: PeerId,
    pub value: f64,
    pub last_avg: f64,
    pub neighbors: usize,
    pub rounds: u64,
}

/// Value, neighbor set and per-edge bookkeeping of one peer
#[derive(Clone, Debug)]
pub struct PeerState {
    id: PeerId,
    value: f64,
    /// Insertion-ordered set
    neighbors: Vec<PeerId>,
    flows: HashMap<PeerId, f64>,
    estimates: HashMap<PeerId, f64>,
    last_avg: f64,
    rounds: u64,
}

impl PeerState {
    /// Create a peer. Duplicate neighbors collapse and a self-edge is dropped.
    pub fn new(id: PeerId, value: f64, neighbors: impl IntoIterator<Item = PeerId>) -> Self {
        let mut state = PeerState {
            id,
            value,
            neighbors: Vec::new(),
            flows: HashMap::new(),
            estimates: HashMap::new(),
            last_avg: 0.0,
            rounds: 0,
        };
        for neighbor in neighbors {
            if neighbor == id {
                tracing::warn!(peer = %id, "ignoring self in neighbor list");
                continue;
            }
            state.add_neighbor(neighbor);
        }
        state
    }

    #[inline]
    pub fn id(&self) -> PeerId {
        self.id
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn last_avg(&self) -> f64 {
        self.last_avg
    }

    /// Completed recompute rounds
    #[inline]
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn neighbors(&self) -> &[PeerId] {
        &self.neighbors
    }

    pub fn is_neighbor(&self, peer: PeerId) -> bool {
        self.neighbors.contains(&peer)
    }

    /// Add a neighbor. Returns `false` if it was already known.
    pub fn add_neighbor(&mut self, peer: PeerId) -> bool {
        if self.is_neighbor(peer) {
            return false;
        }
        self.neighbors.push(peer);
        true
    }

    /// Flow over the edge to `peer`, from this peer's side
    pub fn flow(&self, peer: PeerId) -> f64 {
        self.flows.get(&peer).copied().unwrap_or(0.0)
    }

    /// Last estimate held for `peer`
    pub fn estimate(&self, peer: PeerId) -> f64 {
        self.estimates.get(&peer).copied().unwrap_or(0.0)
    }

    /// Sum of flows over the whole neighbor set, in neighbor order
    pub fn flows_sum(&self) -> f64 {
        self.neighbors.iter().map(|n| self.flow(*n)).sum()
    }

    /// Sum of neighbor estimates, in neighbor order
    pub fn estimates_sum(&self) -> f64 {
        self.neighbors.iter().map(|n| self.estimate(*n)).sum()
    }

    /// `value - flows_sum`
    pub fn local_estimate(&self) -> f64 {
        self.value - self.flows_sum()
    }

    /// Integrate an incoming update.
    ///
    /// Unknown senders are adopted as neighbors rather than rejected.
    /// Returns `true` when the sender was newly discovered.
    pub fn absorb(&mut self, msg: &FlowUpdatingMessage) -> bool {
        let discovered = self.add_neighbor(msg.sender);
        if discovered {
            tracing::warn!(
                peer = %self.id,
                sender = %msg.sender,
                "message from unknown sender, adding it as a neighbor"
            );
        }

        self.estimates.insert(msg.sender, msg.estimate);
        self.flows.insert(msg.sender, -msg.flow);
        discovered
    }

    pub(crate) fn set_edge(&mut self, peer: PeerId, flow: f64, estimate: f64) {
        self.flows.insert(peer, flow);
        self.estimates.insert(peer, estimate);
    }

    pub(crate) fn finish_round(&mut self, avg: f64) {
        self.last_avg = avg;
        self.rounds += 1;
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            id: self.id,
            value: self.value,
            last_avg: self.last_avg,
            neighbors: self.neighbors.len(),
            rounds: self.rounds,
        }
    }
}
