//! Peer - averaging state plus the active scheduling strategy
//!
//! `Peer` is the unit a peer loop drives: it dispatches tagged messages,
//! forwards ticks to the strategy, and returns the envelopes to send.
//! It never blocks and never touches a transport directly.

use std::time::Duration;

use flowup_core::{Envelope, FlowResult, Message, PeerConfig, PeerId, StrategyKind};

use crate::{strategy_for, PeerSnapshot, PeerState, Strategy};

pub struct Peer {
    state: PeerState,
    strategy: Box<dyn Strategy>,
}

impl Peer {
    /// Create a peer from a validated config
    pub fn new(id: PeerId, config: &PeerConfig) -> FlowResult<Self> {
        config.validate()?;
        let state = PeerState::new(id, config.value, config.neighbors.iter().copied());
        Ok(Self::with_strategy(state, strategy_for(config)))
    }

    pub fn with_strategy(state: PeerState, strategy: Box<dyn Strategy>) -> Self {
        Peer { state, strategy }
    }

    #[inline]
    pub fn id(&self) -> PeerId {
        self.state.id()
    }

    pub fn state(&self) -> &PeerState {
        &self.state
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Dispatch one inbound message
    pub fn handle(&mut self, message: Message, now: Duration) -> Vec<Envelope> {
        match message {
            Message::FlowUpdating(msg) => {
                self.state.absorb(&msg);
                self.strategy.on_receive(&mut self.state, msg.sender, now)
            }
            Message::QueryLastAvg { requester } => {
                vec![Envelope::new(
                    requester,
                    Message::LastAvgReport {
                        sender: self.id(),
                        last_avg: self.state.last_avg(),
                    },
                )]
            }
            Message::LastAvgReport { sender, .. } => {
                tracing::debug!(peer = %self.id(), %sender, "ignoring last_avg report");
                Vec::new()
            }
        }
    }

    /// Timer check, once per tick
    pub fn tick(&mut self, now: Duration) -> Vec<Envelope> {
        self.strategy.on_tick(&mut self.state, now)
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        self.state.snapshot()
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("state", &self.state)
            .field("strategy", &self.strategy.kind())
            .finish()
    }
}
