//! Error types for the BLE profiles

use rowbridge_core::{BridgeError, TransportError};
use thiserror::Error;
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors specific to the BLE hosts and profiles
#[derive(Error, Debug)]
pub enum BleProfileError {
    #[error("BLE adapter not available")]
    AdapterNotAvailable,

    #[error("Peripheral role not supported on this platform")]
    PeripheralUnsupported,

    #[error("Failed to publish GATT application: {0}")]
    PublishFailed(String),

    #[error("Failed to start advertising: {0}")]
    AdvertisingFailed(String),

    #[error("Characteristic not found: {characteristic}")]
    CharacteristicNotFound { characteristic: Uuid },

    #[error("Failed to subscribe to notifications: {0}")]
    SubscriptionFailed(String),

    #[error("Failed to connect to sensor: {0}")]
    ConnectionFailed(String),

    #[error("No sensor advertising {service} found within {timeout_ms}ms")]
    SensorNotFound { service: Uuid, timeout_ms: u64 },

    #[error("Profile not attached")]
    NotAttached,
}

impl From<BleProfileError> for BridgeError {
    fn from(err: BleProfileError) -> Self {
        match err {
            BleProfileError::AdapterNotAvailable | BleProfileError::PeripheralUnsupported => {
                BridgeError::Transport(TransportError::TransportUnavailable {
                    transport_type: err.to_string(),
                })
            }
            BleProfileError::AdvertisingFailed(reason) => {
                BridgeError::Transport(TransportError::AdvertisingFailed { reason })
            }
            BleProfileError::CharacteristicNotFound { characteristic } => {
                BridgeError::Transport(TransportError::UnknownCharacteristic {
                    uuid: characteristic,
                })
            }
            BleProfileError::SensorNotFound { service, .. } => {
                BridgeError::Transport(TransportError::SensorNotFound { service })
            }
            other => BridgeError::profile("BLE", other.to_string()),
        }
    }
}
