//! Error types for the rowbridge peripheral bridge
//!
//! This module contains the transport error taxonomy and the `BridgeError` type that
//! every profile crate converts its own errors into.

use uuid::Uuid;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Errors raised by the opaque radio and broker transports
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not available: {transport_type}")]
    TransportUnavailable { transport_type: String },
    #[error("Transport busy: {reason}")]
    Busy { reason: String },
    #[error("Transport closed")]
    Closed,
    #[error("Characteristic not published: {uuid}")]
    UnknownCharacteristic { uuid: Uuid },
    #[error("Write failed: {reason}")]
    WriteFailed { reason: String },
    #[error("Advertising failed: {reason}")]
    AdvertisingFailed { reason: String },
    #[error("Sensor not found: {service}")]
    SensorNotFound { service: Uuid },
    #[error("Transport timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Core error type for the bridge
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("Profile {profile} failed: {reason}")]
    Profile { profile: String, reason: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BridgeError {
    /// Shorthand for a profile-scoped failure
    pub fn profile(profile: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Profile {
            profile: profile.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a configuration failure
    pub fn invalid_configuration(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Whether the error came from the underlying radio or broker
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type BridgeResult<T> = core::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_converts() {
        let err: BridgeError = TransportError::Closed.into();
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "Transport error: Transport closed");
    }

    #[test]
    fn test_profile_error_message() {
        let err = BridgeError::profile("FTMS", "service not published");
        assert_eq!(err.to_string(), "Profile FTMS failed: service not published");
        assert!(!err.is_transport());
    }
}
