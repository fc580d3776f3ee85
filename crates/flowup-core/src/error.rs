//! Error types for FlowUp

use thiserror::Error;

use crate::PeerId;

/// Core FlowUp errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    // Codec errors
    #[error("Unknown message tag: {0:#04x}")]
    UnknownMessageTag(u8),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Invalid wire format: {0}")]
    InvalidWireFormat(String),

    // Transport errors
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    #[error("Mailbox closed for peer {0}")]
    MailboxClosed(PeerId),

    #[error("Transport error: {0}")]
    TransportError(String),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

/// Result type for FlowUp operations
pub type FlowResult<T> = Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FlowError::UnknownMessageTag(0x7f).to_string(),
            "Unknown message tag: 0x7f"
        );
        assert_eq!(
            FlowError::UnknownPeer(PeerId::new(3)).to_string(),
            "Unknown peer: peer-3"
        );

        let short = FlowError::BufferTooShort {
            expected: 25,
            actual: 4,
        };
        assert!(short.to_string().contains("expected 25"));
    }
}
