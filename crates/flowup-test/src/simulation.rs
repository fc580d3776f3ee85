//! Deterministic simulation driver
//!
//! Every tick the driver advances the network clock, then visits peers in
//! ascending id order. Each visited peer takes at most one deliverable
//! message, runs its timer check, and sends the results. Given a seed the
//! whole run is reproducible.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use flowup_core::{
    FlowError, FlowResult, PeerConfig, PeerId, StrategyKind, Topology, Transport,
};
use flowup_peer::{Peer, PeerSnapshot};

use crate::{ChaosConfig, SimNetwork};

pub struct Simulation {
    network: SimNetwork,
    peers: BTreeMap<PeerId, Peer>,
    silenced: HashSet<PeerId>,
    tick: u64,
    tick_interval: Duration,
    send_errors: u64,
}

impl Simulation {
    pub fn new(chaos: ChaosConfig, seed: u64) -> Self {
        Simulation {
            network: SimNetwork::new(chaos, seed),
            peers: BTreeMap::new(),
            silenced: HashSet::new(),
            tick: 0,
            tick_interval: Duration::from_secs(1),
            send_errors: 0,
        }
    }

    pub fn reliable() -> Self {
        Self::new(ChaosConfig::reliable(), 0)
    }

    /// Wall-clock length of one tick as seen by peers. Keep it equal to
    /// the peers' configured `tick_interval`.
    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn add_peer(&mut self, id: PeerId, config: &PeerConfig) -> FlowResult<()> {
        if self.peers.contains_key(&id) {
            return Err(FlowError::InvalidConfig(format!("duplicate peer {id}")));
        }
        let peer = Peer::new(id, config)?;
        self.network.register(id);
        self.peers.insert(id, peer);
        Ok(())
    }

    /// Stop stepping `id`. Its mailbox stays open, so others can still
    /// send to it, but it never answers.
    pub fn silence(&mut self, id: PeerId) {
        self.silenced.insert(id);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now(&self) -> Duration {
        self.time_at(self.tick)
    }

    fn time_at(&self, tick: u64) -> Duration {
        self.tick_interval
            .saturating_mul(u32::try_from(tick).unwrap_or(u32::MAX))
    }

    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(&id)
    }

    pub fn peers(&self) -> impl Iterator<Item = &Peer> + '_ {
        self.peers.values()
    }

    /// Sends that failed, e.g. replies to a peer without a mailbox
    pub fn send_errors(&self) -> u64 {
        self.send_errors
    }

    pub fn step(&mut self) {
        self.tick += 1;
        self.network.advance_to(self.tick);
        let now = self.now();

        for (id, peer) in self.peers.iter_mut() {
            if self.silenced.contains(id) {
                continue;
            }

            let mut outgoing = match self.network.try_receive(*id) {
                Ok(Some(message)) => peer.handle(message, now),
                Ok(None) => Vec::new(),
                Err(e) => {
                    tracing::warn!(peer = %id, error = %e, "receive failed");
                    Vec::new()
                }
            };
            outgoing.extend(peer.tick(now));

            for envelope in outgoing {
                if let Err(e) = envelope.deliver(&self.network) {
                    self.send_errors += 1;
                    tracing::debug!(peer = %id, to = %envelope.to, error = %e, "send failed");
                }
            }
        }
    }

    pub fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.step();
        }
    }

    /// Step until `done` holds, for at most `max_ticks`. Returns the tick
    /// at which it first held.
    pub fn run_until(
        &mut self,
        max_ticks: u64,
        mut done: impl FnMut(&Simulation) -> bool,
    ) -> Option<u64> {
        for _ in 0..max_ticks {
            self.step();
            if done(self) {
                return Some(self.tick);
            }
        }
        None
    }

    pub fn snapshots(&self) -> Vec<PeerSnapshot> {
        self.peers.values().map(Peer::snapshot).collect()
    }

    pub fn last_avg(&self, id: PeerId) -> Option<f64> {
        self.peer(id).map(|p| p.state().last_avg())
    }

    pub fn value_sum(&self) -> f64 {
        self.peers.values().map(|p| p.state().value()).sum()
    }

    pub fn true_mean(&self) -> f64 {
        if self.peers.is_empty() {
            return 0.0;
        }
        self.value_sum() / self.peers.len() as f64
    }

    /// Largest `|last_avg - true_mean|` across peers
    pub fn max_deviation(&self) -> f64 {
        let mean = self.true_mean();
        self.peers
            .values()
            .map(|p| (p.state().last_avg() - mean).abs())
            .fold(0.0, f64::max)
    }

    /// `|flows[a][b] + flows[b][a]|`
    pub fn edge_imbalance(&self, a: PeerId, b: PeerId) -> Option<f64> {
        let pa = self.peer(a)?;
        let pb = self.peer(b)?;
        Some((pa.state().flow(b) + pb.state().flow(a)).abs())
    }

    /// Largest imbalance over every edge either side knows about
    pub fn max_edge_imbalance(&self) -> f64 {
        self.peers
            .values()
            .flat_map(|p| {
                let id = p.id();
                p.state()
                    .neighbors()
                    .iter()
                    .filter_map(move |n| self.edge_imbalance(id, *n))
            })
            .fold(0.0, f64::max)
    }
}

/// Builds a [`Simulation`] from a topology
#[derive(Clone, Debug)]
pub struct ScenarioBuilder {
    topology: Topology,
    values: Option<Vec<f64>>,
    template: PeerConfig,
    chaos: ChaosConfig,
    seed: u64,
    silent: Vec<PeerId>,
}

impl ScenarioBuilder {
    pub fn new(topology: Topology) -> Self {
        ScenarioBuilder {
            topology,
            values: None,
            template: PeerConfig::default(),
            chaos: ChaosConfig::reliable(),
            seed: 0,
            silent: Vec::new(),
        }
    }

    /// Values in ascending peer id order. Defaults to each peer's id.
    pub fn values(mut self, values: impl Into<Vec<f64>>) -> Self {
        self.values = Some(values.into());
        self
    }

    pub fn strategy(mut self, strategy: StrategyKind) -> Self {
        self.template.strategy = strategy;
        self
    }

    pub fn tick_timeout(mut self, tick_timeout: u32) -> Self {
        self.template.tick_timeout = tick_timeout;
        self
    }

    pub fn chaos(mut self, chaos: ChaosConfig) -> Self {
        self.chaos = chaos;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn silence(mut self, peer: PeerId) -> Self {
        self.silent.push(peer);
        self
    }

    pub fn build(self) -> FlowResult<Simulation> {
        let values = match self.values {
            Some(values) => values,
            None => self.topology.peers().map(|p| p.raw() as f64).collect(),
        };
        if values.len() != self.topology.peer_count() {
            return Err(FlowError::InvalidConfig(format!(
                "{} values for {} peers",
                values.len(),
                self.topology.peer_count()
            )));
        }

        let mut sim = Simulation::new(self.chaos, self.seed)
            .with_tick_interval(self.template.tick_interval);
        for (id, value) in self.topology.peers().zip(values) {
            let config = PeerConfig {
                value,
                neighbors: self.topology.neighbors(id).to_vec(),
                ..self.template.clone()
            };
            sim.add_peer(id, &config)?;
        }
        for peer in self.silent {
            sim.silence(peer);
        }
        Ok(sim)
    }
}
