//! Deployment - creates peers from configs and spawns their loops
//!
//! Every mailbox is registered before any loop is spawned, so an early
//! round never hits an unknown destination.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinHandle;

use flowup_core::{FlowError, FlowResult, PeerConfig, PeerId, Topology};
use flowup_peer::Peer;

use crate::{ChannelTransport, Clock, NetworkSnapshot, PeerLoop, TokioClock, Watcher};

#[derive(Clone, Debug, Default)]
pub struct Deployment {
    peers: Vec<(PeerId, PeerConfig)>,
}

impl Deployment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peer(mut self, id: PeerId, config: PeerConfig) -> Self {
        self.peers.push((id, config));
        self
    }

    /// One peer per topology node, in ascending id order. `values` pairs up
    /// with that order; everything but value and neighbors comes from
    /// `template`.
    pub fn from_topology(
        topology: &Topology,
        values: &[f64],
        template: &PeerConfig,
    ) -> FlowResult<Self> {
        if values.len() != topology.peer_count() {
            return Err(FlowError::InvalidConfig(format!(
                "{} values for {} peers",
                values.len(),
                topology.peer_count()
            )));
        }

        let peers = topology
            .peers()
            .zip(values)
            .map(|(id, value)| {
                let config = PeerConfig {
                    value: *value,
                    neighbors: topology.neighbors(id).to_vec(),
                    ..template.clone()
                };
                (id, config)
            })
            .collect();
        Ok(Deployment { peers })
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Launch on tokio's clock. Must be called inside a tokio runtime.
    pub fn launch(self) -> FlowResult<RunningDeployment> {
        self.launch_with(Arc::new(TokioClock::new()))
    }

    pub fn launch_with<C: Clock>(self, clock: Arc<C>) -> FlowResult<RunningDeployment> {
        let mut seen = HashSet::with_capacity(self.peers.len());
        let mut peers = Vec::with_capacity(self.peers.len());
        for (id, config) in &self.peers {
            if !seen.insert(*id) {
                return Err(FlowError::InvalidConfig(format!("duplicate peer {id}")));
            }
            peers.push((Peer::new(*id, config)?, config.tick_interval));
        }

        let transport = Arc::new(ChannelTransport::new());
        for (peer, _) in &peers {
            transport.register(peer.id());
        }

        let mut watcher = Watcher::new();
        let mut tasks = Vec::with_capacity(peers.len());
        for (peer, tick_interval) in peers {
            let (peer_loop, handle) =
                PeerLoop::new(peer, tick_interval, Arc::clone(&transport), Arc::clone(&clock));
            watcher.watch(handle);
            tasks.push(tokio::spawn(peer_loop.run()));
        }

        tracing::info!(peers = tasks.len(), "deployment launched");
        Ok(RunningDeployment {
            transport,
            watcher,
            tasks,
        })
    }
}

pub struct RunningDeployment {
    transport: Arc<ChannelTransport>,
    watcher: Watcher,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningDeployment {
    pub fn transport(&self) -> &Arc<ChannelTransport> {
        &self.transport
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        self.watcher.snapshot()
    }

    pub fn peer_count(&self) -> usize {
        self.tasks.len()
    }

    /// Abort every peer loop and wait for the tasks to wind down
    pub async fn shutdown(self) -> NetworkSnapshot {
        let snapshot = self.watcher.snapshot();
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks {
            // cancellation is the expected outcome
            let _ = task.await;
        }
        tracing::info!(stats = ?self.transport.stats(), "deployment stopped");
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowup_core::StrategyKind;
    use std::time::Duration;

    #[test]
    fn test_from_topology_assigns_values_in_id_order() {
        let topology = Topology::line(3);
        let template = PeerConfig::new(0.0).with_tick_timeout(7);
        let deployment = Deployment::from_topology(&topology, &[1.0, 2.0, 3.0], &template).unwrap();

        assert_eq!(deployment.len(), 3);
        let (id, config) = &deployment.peers[1];
        assert_eq!(*id, PeerId::new(1));
        assert_eq!(config.value, 2.0);
        assert_eq!(config.neighbors, vec![PeerId::new(0), PeerId::new(2)]);
        assert_eq!(config.tick_timeout, 7);
    }

    #[test]
    fn test_from_topology_rejects_value_mismatch() {
        let result = Deployment::from_topology(&Topology::line(3), &[1.0], &PeerConfig::default());
        assert!(matches!(result, Err(FlowError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_duplicate_peer_rejected() {
        let result = Deployment::new()
            .with_peer(PeerId::new(1), PeerConfig::new(1.0))
            .with_peer(PeerId::new(1), PeerConfig::new(2.0))
            .launch();
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_line_converges_and_conserves_values() {
        for strategy in [StrategyKind::CollectAll, StrategyKind::Pairwise] {
            let template = PeerConfig::new(0.0)
                .with_strategy(strategy)
                .with_tick_timeout(5);
            let deployment =
                Deployment::from_topology(&Topology::line(4), &[0.0, 4.0, 8.0, 12.0], &template)
                    .unwrap()
                    .launch()
                    .unwrap();

            let clock = TokioClock::new();
            let snapshot = deployment
                .watcher()
                .run(&clock, Duration::from_secs(50), Duration::from_secs(500))
                .await;

            assert_eq!(snapshot.value_sum(), 24.0);
            assert!(
                snapshot.max_deviation().unwrap() < 1e-6,
                "{strategy}: {snapshot:?}"
            );
            assert_eq!(deployment.peer_count(), 4);
            deployment.shutdown().await;
        }
    }
}
