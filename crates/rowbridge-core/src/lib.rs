//! rowbridge core
//!
//! This crate provides the metrics model, the little-endian frame builder, the state
//! mapping tables and the transport contracts shared by every protocol profile of the
//! rowing peripheral bridge.
//!
//! Telemetry flows engine → manager → profiles → codecs → transport. Control flows back as
//! `PeripheralEvent`s on an injected channel.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod control;
pub mod errors;
pub mod frame;
pub mod mapping;
pub mod merge;
pub mod metrics;
pub mod profile;
pub mod series;
pub mod timer;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{
    AntMode, BleMode, HeartRateBounds, HrmMode, MachineIdentity, PeripheralConfig,
    PeripheralMode, ProfileTiming,
};
pub use control::{
    emit_control, event_channel, parse_workout_plan, BikeSimulationParameters, ControlCommand,
    EventReceiver, EventSender, HeartRateMeasurement, PeripheralEvent, PeripheralStatus,
    SplitPlan, WorkoutPlanStep,
};
pub use errors::{BridgeError, BridgeResult, TransportError};
pub use frame::{FrameBuilder, FrameValue};
pub use merge::{append_pause_interval_to_active_interval, merge_two_splits};
pub use metrics::{
    MetricStats, MetricsContext, MetricsSnapshot, SegmentCalories, SegmentDistance,
    SegmentKind, SegmentMetrics, SessionState, StrokeState, TimeSpent,
};
pub use profile::DeviceProfile;
pub use series::RollingSeries;
pub use timer::BroadcastTimer;
pub use transport::{
    Advertisement, AntStick, BleHost, CharacteristicProperties, GattCharacteristic,
    GattService, HostEvent, HostEventReceiver, MqttClient, SensorNotification, SensorReceiver,
};
