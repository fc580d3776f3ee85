//! Watcher - passive observer of peer snapshots
//!
//! Reads the snapshots each peer loop publishes; never sends to a peer and
//! never influences the protocol.

use std::collections::BTreeMap;
use std::time::Duration;

use flowup_core::{FlowError, FlowResult, PeerId};
use flowup_peer::PeerSnapshot;

use crate::{Clock, SnapshotHandle};

/// Point-in-time view of the whole network
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkSnapshot {
    pub value: BTreeMap<PeerId, f64>,
    pub last_avg: BTreeMap<PeerId, f64>,
}

impl NetworkSnapshot {
    pub fn from_peers(peers: impl IntoIterator<Item = PeerSnapshot>) -> Self {
        let mut snapshot = NetworkSnapshot::default();
        for peer in peers {
            snapshot.value.insert(peer.id, peer.value);
            snapshot.last_avg.insert(peer.id, peer.last_avg);
        }
        snapshot
    }

    pub fn peer_count(&self) -> usize {
        self.value.len()
    }

    pub fn value_sum(&self) -> f64 {
        self.value.values().sum()
    }

    /// Average of the private values; `None` for an empty network
    pub fn true_mean(&self) -> Option<f64> {
        if self.value.is_empty() {
            return None;
        }
        Some(self.value_sum() / self.value.len() as f64)
    }

    /// Largest `|last_avg - true_mean|` over all peers
    pub fn max_deviation(&self) -> Option<f64> {
        let mean = self.true_mean()?;
        self.last_avg
            .values()
            .map(|avg| (avg - mean).abs())
            .reduce(f64::max)
    }

    /// `{"value": {"<id>": v, ..}, "last_avg": {"<id>": a, ..}}`
    pub fn to_json(&self) -> FlowResult<String> {
        let keyed = |map: &BTreeMap<PeerId, f64>| -> BTreeMap<String, f64> {
            map.iter().map(|(id, v)| (id.raw().to_string(), *v)).collect()
        };
        let report = serde_json::json!({
            "value": keyed(&self.value),
            "last_avg": keyed(&self.last_avg),
        });
        serde_json::to_string(&report).map_err(|e| FlowError::InvalidWireFormat(e.to_string()))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Watcher {
    peers: Vec<SnapshotHandle>,
}

impl Watcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch(&mut self, handle: SnapshotHandle) {
        self.peers.push(handle);
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot::from_peers(self.peers.iter().map(SnapshotHandle::latest))
    }

    /// Report every `interval` until the clock reaches `until`, then return
    /// the final snapshot.
    pub async fn run<C: Clock>(&self, clock: &C, interval: Duration, until: Duration) -> NetworkSnapshot {
        tracing::info!(peers = self.len(), ?interval, ?until, "watcher started");

        loop {
            let now = clock.now();
            let Some(remaining) = until.checked_sub(now).filter(|r| !r.is_zero()) else {
                break;
            };
            let wait = if interval.is_zero() {
                remaining
            } else {
                interval.min(remaining)
            };
            clock.sleep(wait).await;
            self.report(clock.now());
        }

        self.snapshot()
    }

    fn report(&self, now: Duration) {
        let snapshot = self.snapshot();
        tracing::info!(
            elapsed = ?now,
            peers = snapshot.peer_count(),
            true_mean = snapshot.true_mean().unwrap_or(f64::NAN),
            max_deviation = snapshot.max_deviation().unwrap_or(f64::NAN),
            "network report"
        );
        match snapshot.to_json() {
            Ok(json) => tracing::debug!(report = %json, "network snapshot"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize snapshot"),
        }
    }
}
