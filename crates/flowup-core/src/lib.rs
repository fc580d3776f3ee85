//! FlowUp Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every FlowUp crate:
//! - Identifiers (PeerId)
//! - The tagged message envelope and its codec
//! - Peer construction configuration
//! - Topology helpers
//! - The transport port consumed by peer loops

pub mod config;
pub mod error;
pub mod id;
pub mod message;
pub mod topology;
pub mod transport;

pub use config::*;
pub use error::*;
pub use id::*;
pub use message::*;
pub use topology::*;
pub use transport::*;
