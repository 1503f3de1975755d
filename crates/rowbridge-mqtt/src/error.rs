//! Error types for the MQTT bridge

use rowbridge_core::{BridgeError, TransportError};
use thiserror::Error;

/// Errors specific to the MQTT bridge
#[derive(Error, Debug)]
pub enum MqttBridgeError {
    #[error("Broker not reachable: {0}")]
    BrokerUnavailable(String),

    #[error("Failed to encode metrics: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Invalid workout plan: {0}")]
    InvalidWorkoutPlan(String),
}

impl From<MqttBridgeError> for BridgeError {
    fn from(err: MqttBridgeError) -> Self {
        match err {
            MqttBridgeError::BrokerUnavailable(transport_type) => {
                BridgeError::Transport(TransportError::TransportUnavailable { transport_type })
            }
            MqttBridgeError::Encoding(e) => BridgeError::Serialization(e),
            MqttBridgeError::InvalidWorkoutPlan(reason) => BridgeError::InvalidPayload(reason),
        }
    }
}
