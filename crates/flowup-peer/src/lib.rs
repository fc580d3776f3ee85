//! FlowUp Peer - Flow Updating protocol engine
//!
//! This crate implements the peer side of Flow Updating averaging:
//! - Per-peer value, neighbor set and per-edge flow/estimate bookkeeping
//! - The shared recompute-and-send round
//! - Collect-all (barrier) and pairwise (per-edge timer) scheduling
//! - Tagged message dispatch
//!
//! Nothing here blocks or owns a transport; peer loops feed messages and
//! ticks in and ship the returned envelopes out.

pub mod collect_all;
pub mod pairwise;
pub mod peer;
pub mod recompute;
pub mod state;
pub mod strategy;

pub use collect_all::*;
pub use pairwise::*;
pub use peer::*;
pub use recompute::*;
pub use state::*;
pub use strategy::*;
