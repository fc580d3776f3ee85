//! Scheduling strategy interface
//!
//! A strategy decides *when* a peer recomputes and *which* edges the round
//! covers. It owns only timer bookkeeping; all averaging state lives in
//! [`PeerState`] and is mutated through [`crate::recompute_and_send`].

use std::time::Duration;

use flowup_core::{Envelope, PeerConfig, PeerId, StrategyKind};

use crate::{CollectAll, Pairwise, PeerState};

/// Scheduling policy over shared peer state
pub trait Strategy: Send {
    fn kind(&self) -> StrategyKind;

    /// React to an update from `sender`. The message has already been
    /// absorbed into `state`.
    fn on_receive(&mut self, state: &mut PeerState, sender: PeerId, now: Duration)
        -> Vec<Envelope>;

    /// Periodic timer check, called once per tick.
    fn on_tick(&mut self, state: &mut PeerState, now: Duration) -> Vec<Envelope>;
}

/// Build the strategy selected by `config`
pub fn strategy_for(config: &PeerConfig) -> Box<dyn Strategy> {
    match config.strategy {
        StrategyKind::CollectAll => Box::new(CollectAll::new(config.tick_timeout)),
        StrategyKind::Pairwise => Box::new(Pairwise::new(config.staleness())),
    }
}
