//! FlowUp Test Harness - deterministic simulation and chaos
//!
//! This crate provides:
//! - A seeded, tick-driven simulated network implementing `Transport`
//! - Chaos settings: latency jitter, reordering, superseded-update loss
//! - A simulation driver with conservation and convergence metrics
//! - A scenario builder over `Topology`

pub mod chaos;
pub mod network;
pub mod simulation;

pub use chaos::*;
pub use network::*;
pub use simulation::*;
