//! Error types for the ANT+ profiles

use rowbridge_core::BridgeError;
use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors of ANT serial framing and channel handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AntError {
    #[error("Invalid sync byte 0x{0:02x}")]
    InvalidSync(u8),

    #[error("Message truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("Checksum mismatch: expected 0x{expected:02x}, got 0x{actual:02x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Message content too long: {0} bytes")]
    ContentTooLong(usize),

    #[error("No ANT stick available: {0}")]
    StickUnavailable(String),
}

impl From<AntError> for BridgeError {
    fn from(err: AntError) -> Self {
        match err {
            AntError::StickUnavailable(reason) => {
                BridgeError::Transport(rowbridge_core::TransportError::TransportUnavailable {
                    transport_type: format!("ANT+ stick: {}", reason),
                })
            }
            other => BridgeError::InvalidPayload(other.to_string()),
        }
    }
}
