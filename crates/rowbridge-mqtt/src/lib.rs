//! MQTT bridge for the rowing peripheral bridge
//!
//! The broker client itself is supplied by the host application through
//! `rowbridge_core::MqttClient`; this crate decides what to publish and how to read
//! workout plans.

mod bridge;
mod error;
pub mod message;

// Public API exports
pub use bridge::MqttBridge;
pub use error::MqttBridgeError;
pub use message::{metrics_topic, workout_plans_topic, MetricsMessage};
