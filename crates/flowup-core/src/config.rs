//! Peer construction configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{FlowError, FlowResult, PeerId};

/// Default scheduling period
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default timeout, in ticks, before a silent edge or barrier is forced
pub const DEFAULT_TICK_TIMEOUT: u32 = 50;

/// Scheduling policy used by a peer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Recompute once every neighbor has answered, or on timeout
    #[default]
    CollectAll,
    /// Recompute per incoming message and per stale edge
    Pairwise,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::CollectAll => "collect-all",
            StrategyKind::Pairwise => "pairwise",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collect-all" | "collectall" | "collect_all" => Ok(StrategyKind::CollectAll),
            "pairwise" => Ok(StrategyKind::Pairwise),
            other => Err(FlowError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Configuration a peer is created from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Private value; never mutated by the protocol
    pub value: f64,
    /// Initial neighbors, in order
    pub neighbors: Vec<PeerId>,
    pub strategy: StrategyKind,
    pub tick_interval: Duration,
    /// Ticks before a forced barrier release (collect-all) or an edge
    /// refresh (pairwise)
    pub tick_timeout: u32,
}

impl Default for PeerConfig {
    fn default() -> Self {
        PeerConfig {
            value: 0.0,
            neighbors: Vec::new(),
            strategy: StrategyKind::default(),
            tick_interval: DEFAULT_TICK_INTERVAL,
            tick_timeout: DEFAULT_TICK_TIMEOUT,
        }
    }
}

impl PeerConfig {
    pub fn new(value: f64) -> Self {
        PeerConfig {
            value,
            ..Default::default()
        }
    }

    pub fn with_neighbors(mut self, neighbors: impl IntoIterator<Item = PeerId>) -> Self {
        self.neighbors = neighbors.into_iter().collect();
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_tick_timeout(mut self, tick_timeout: u32) -> Self {
        self.tick_timeout = tick_timeout;
        self
    }

    /// Age after which a pairwise edge counts as stale
    pub fn staleness(&self) -> Duration {
        self.tick_interval.saturating_mul(self.tick_timeout)
    }

    pub fn validate(&self) -> FlowResult<()> {
        if !self.value.is_finite() {
            return Err(FlowError::InvalidConfig(format!(
                "value must be finite, got {}",
                self.value
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(FlowError::InvalidConfig(
                "tick_interval must be non-zero".to_string(),
            ));
        }
        if self.tick_timeout == 0 {
            return Err(FlowError::InvalidConfig(
                "tick_timeout must be at least one tick".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated neighbor list such as `"1,2,5"`.
/// An empty or blank string yields no neighbors.
pub fn parse_neighbor_list(list: &str) -> FlowResult<Vec<PeerId>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',').map(str::parse).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PeerConfig::new(4.0);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.tick_timeout, 50);
        assert_eq!(config.strategy, StrategyKind::CollectAll);
        assert_eq!(config.staleness(), Duration::from_secs(50));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(PeerConfig::new(f64::NAN).validate().is_err());
        assert!(PeerConfig::new(1.0).with_tick_timeout(0).validate().is_err());
        assert!(PeerConfig::new(1.0)
            .with_tick_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "collect-all".parse::<StrategyKind>().unwrap(),
            StrategyKind::CollectAll
        );
        assert_eq!(
            "Pairwise".parse::<StrategyKind>().unwrap(),
            StrategyKind::Pairwise
        );
        assert_eq!(
            "gossip".parse::<StrategyKind>(),
            Err(FlowError::UnknownStrategy("gossip".to_string()))
        );
        assert_eq!(StrategyKind::Pairwise.to_string(), "pairwise");
    }

    #[test]
    fn test_parse_neighbor_list() {
        assert_eq!(parse_neighbor_list("").unwrap(), Vec::<PeerId>::new());
        assert_eq!(
            parse_neighbor_list("1, 2,3").unwrap(),
            vec![PeerId::new(1), PeerId::new(2), PeerId::new(3)]
        );
        assert!(parse_neighbor_list("1,,2").is_err());
    }

    #[test]
    fn test_config_json() {
        let config = PeerConfig::new(2.0)
            .with_neighbors([PeerId::new(1)])
            .with_strategy(StrategyKind::Pairwise);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"pairwise\""));

        let back: PeerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
