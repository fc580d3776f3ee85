//! Chaos settings for the simulated network
//!
//! Hostile-but-fair conditions:
//! - Latency jitter, in whole ticks
//! - Bounded reordering
//! - Loss of flow updates that a newer update on the same edge supersedes
//!
//! Arbitrary loss is not modeled; an edge whose last update is lost never
//! rebalances.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::Rng;

#[derive(Clone, Debug, PartialEq)]
pub struct ChaosConfig {
    /// Delivery delay, in ticks after the send tick. Minimum 1.
    pub latency_ticks: RangeInclusive<u64>,
    /// Probability of inserting a message ahead of queued ones
    pub reorder_prob: f64,
    /// Maximum number of queued messages a reordered one may jump
    pub reorder_depth: usize,
    /// Probability that a queued update is dropped when a newer update on
    /// the same edge is sent
    pub supersede_drop_prob: f64,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self::reliable()
    }
}

impl ChaosConfig {
    /// Fixed one-tick latency, in order, nothing lost
    pub fn reliable() -> Self {
        ChaosConfig {
            latency_ticks: 1..=1,
            reorder_prob: 0.0,
            reorder_depth: 0,
            supersede_drop_prob: 0.0,
        }
    }

    pub fn jittery() -> Self {
        ChaosConfig {
            latency_ticks: 1..=4,
            reorder_prob: 0.2,
            reorder_depth: 3,
            supersede_drop_prob: 0.0,
        }
    }

    /// Jitter plus reordering plus superseded-update loss
    pub fn lossy() -> Self {
        ChaosConfig {
            supersede_drop_prob: 0.3,
            ..Self::jittery()
        }
    }

    pub fn sample_latency(&self, rng: &mut StdRng) -> u64 {
        let min = (*self.latency_ticks.start()).max(1);
        let max = (*self.latency_ticks.end()).max(min);
        rng.gen_range(min..=max)
    }

    /// How many queued messages to jump, zero for in-order
    pub fn sample_reorder(&self, rng: &mut StdRng, queued: usize) -> usize {
        let depth = self.reorder_depth.min(queued);
        if depth == 0 || rng.gen::<f64>() >= self.reorder_prob {
            return 0;
        }
        rng.gen_range(1..=depth)
    }

    pub fn should_drop_superseded(&self, rng: &mut StdRng) -> bool {
        self.supersede_drop_prob > 0.0 && rng.gen::<f64>() < self.supersede_drop_prob
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChaosStats {
    pub messages_sent: u64,
    pub messages_delivered: u64,
    pub messages_reordered: u64,
    pub messages_superseded: u64,
    pub total_latency_ticks: u64,
    /// Largest number of messages ever queued for a single peer
    pub max_backlog: usize,
}

impl ChaosStats {
    pub fn avg_latency_ticks(&self) -> f64 {
        if self.messages_delivered == 0 {
            0.0
        } else {
            self.total_latency_ticks as f64 / self.messages_delivered as f64
        }
    }

    pub fn in_flight(&self) -> u64 {
        self.messages_sent - self.messages_delivered - self.messages_superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_reliable_never_perturbs() {
        let config = ChaosConfig::reliable();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(config.sample_latency(&mut rng), 1);
            assert_eq!(config.sample_reorder(&mut rng, 10), 0);
            assert!(!config.should_drop_superseded(&mut rng));
        }
    }

    #[test]
    fn test_jittery_samples_stay_in_bounds() {
        let config = ChaosConfig::jittery();
        let mut rng = StdRng::seed_from_u64(7);
        let mut reordered = 0;
        for _ in 0..1000 {
            let latency = config.sample_latency(&mut rng);
            assert!((1..=4).contains(&latency));
            let jump = config.sample_reorder(&mut rng, 2);
            assert!(jump <= 2);
            if jump > 0 {
                reordered += 1;
            }
        }
        assert!(reordered > 100 && reordered < 300, "{reordered}");
    }

    #[test]
    fn test_zero_latency_is_clamped() {
        let config = ChaosConfig {
            latency_ticks: 0..=0,
            ..ChaosConfig::reliable()
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(config.sample_latency(&mut rng), 1);
    }
}
