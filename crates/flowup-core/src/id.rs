//! Identity types for FlowUp
//!
//! Peers are addressed by an opaque 64-bit identifier assigned at
//! creation and never changed afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::FlowError;

/// Peer identity
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl PeerId {
    #[inline]
    pub fn new(id: u64) -> Self {
        PeerId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        PeerId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

impl FromStr for PeerId {
    type Err = FlowError;

    /// Accepts either the bare number or the `peer-N` display form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix("peer-").unwrap_or(trimmed);
        digits
            .parse::<u64>()
            .map(PeerId)
            .map_err(|_| FlowError::InvalidConfig(format!("invalid peer id {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_roundtrip() {
        let id = PeerId::new(0xDEADBEEF_CAFEBABE);
        assert_eq!(PeerId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn test_peer_id_parse() {
        assert_eq!("7".parse::<PeerId>().unwrap(), PeerId::new(7));
        assert_eq!(" peer-12 ".parse::<PeerId>().unwrap(), PeerId::new(12));
        assert!("alice".parse::<PeerId>().is_err());
    }

    #[test]
    fn test_peer_id_display() {
        assert_eq!(PeerId::new(4).to_string(), "peer-4");
        assert_eq!(format!("{:?}", PeerId::new(4)), "Peer(4)");
    }
}
