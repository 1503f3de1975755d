//! Rowbridge Runtime
//!
//! This crate contains the peripheral manager that ties the profile crates together:
//! - `PeripheralManager`: owns the active BLE, ANT+, heart-rate and MQTT profiles
//! - `TransportArbiter`: shares one BLE host and one ANT+ stick between roles
//! - `HeartRateWatchdog`: validity gate and silence timeout for heart-rate straps
//!
//! The session layer feeds it snapshots and commands; profiles send control commands and
//! heart-rate measurements back through the event channel.

pub mod arbiter;
pub mod builder;
pub mod heart_rate;
mod manager;
pub mod watchdog;

pub use arbiter::{opener, SharedTransport, TransportArbiter, TransportOpener, TransportRole};
pub use builder::PeripheralManagerBuilder;
pub use heart_rate::{heart_rate_role, HeartRateProfile};
pub use manager::PeripheralManager;
pub use watchdog::HeartRateWatchdog;

// Re-export core types for convenience
pub use rowbridge_core::{
    event_channel, AntMode, BleMode, BridgeError, BridgeResult, ControlCommand, EventReceiver,
    EventSender, HrmMode, MetricsSnapshot, PeripheralConfig, PeripheralEvent, PeripheralMode,
    PeripheralStatus,
};
