//! Topology - undirected neighbor graph used to seed peer configs
//!
//! Neighbor lists keep insertion order so that the summation order each
//! peer uses is reproducible run to run.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::PeerId;

/// Undirected peer graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    adjacency: BTreeMap<PeerId, Vec<PeerId>>,
}

impl Topology {
    /// Create an empty topology
    pub fn new() -> Self {
        Self::default()
    }

    /// `0 - 1 - ... - (n-1)`
    pub fn line(n: u64) -> Self {
        let mut topology = Self::new();
        for i in 0..n {
            topology.add_peer(PeerId::new(i));
        }
        for i in 1..n {
            topology.add_edge(PeerId::new(i - 1), PeerId::new(i));
        }
        topology
    }

    /// A line with its ends joined; needs at least three peers to differ
    /// from a line.
    pub fn ring(n: u64) -> Self {
        let mut topology = Self::line(n);
        if n > 2 {
            topology.add_edge(PeerId::new(n - 1), PeerId::new(0));
        }
        topology
    }

    /// Add an isolated peer (no-op if present)
    pub fn add_peer(&mut self, peer: PeerId) {
        self.adjacency.entry(peer).or_default();
    }

    /// Add an undirected edge. Self-loops and duplicates are ignored.
    pub fn add_edge(&mut self, a: PeerId, b: PeerId) {
        if a == b {
            return;
        }
        let left = self.adjacency.entry(a).or_default();
        if !left.contains(&b) {
            left.push(b);
        }
        let right = self.adjacency.entry(b).or_default();
        if !right.contains(&a) {
            right.push(a);
        }
    }

    pub fn neighbors(&self, peer: PeerId) -> &[PeerId] {
        self.adjacency
            .get(&peer)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All peers in ascending id order
    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn peer_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Each undirected edge once, as `(lower, higher)`
    pub fn edges(&self) -> Vec<(PeerId, PeerId)> {
        self.adjacency
            .iter()
            .flat_map(|(a, ns)| ns.iter().filter(move |b| a < *b).map(move |b| (*a, *b)))
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        let Some(start) = self.adjacency.keys().next().copied() else {
            return true;
        };

        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(peer) = queue.pop_front() {
            for next in self.neighbors(peer) {
                if seen.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }

        seen.len() == self.adjacency.len()
    }
}
