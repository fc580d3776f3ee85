//! FlowUp Runtime - running peers on tokio
//!
//! Each peer runs in its own task, alternating one message step and one
//! timer check per tick interval. Peers talk through [`ChannelTransport`]
//! mailboxes and publish snapshots the [`Watcher`] reads.
//!
//! Time comes from a [`Clock`]. [`TokioClock`] follows tokio's timer, so
//! the whole deployment runs on virtual time under a paused runtime.

pub mod clock;
pub mod config;
pub mod deployment;
pub mod peer_loop;
pub mod telemetry;
pub mod transport;
pub mod watcher;

pub use clock::*;
pub use config::*;
pub use deployment::*;
pub use peer_loop::*;
pub use telemetry::*;
pub use transport::*;
pub use watcher::*;
