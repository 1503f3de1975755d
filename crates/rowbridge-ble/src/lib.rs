//! Bluetooth Low Energy profiles for the rowing peripheral bridge
//!
//! This crate presents the rower to BLE centrals as one of several fitness devices and
//! reads heart-rate straps in the central role.
//!
//! ## Architecture
//!
//! - [`protocol`] - Service and characteristic UUIDs, op codes and result codes
//! - [`codec`] - Pure snapshot-to-bytes encoders and heart-rate parsers
//! - [`gatt`] - Published service tree, subscriptions and re-advertising
//! - [`ftms`] - FTMS rower and indoor bike with the control point
//! - [`cycling`] - Cycling Power and Cycling Speed and Cadence with update throttling
//! - [`pm5`] - PM5 emulation with edge dispatch and multiplexing
//! - [`hrm`] - Heart-rate strap client
//! - [`host`] - Platform hosts behind the `BleHost` trait
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rowbridge_ble::{open_platform_host, BleFitnessProfile};
//! use rowbridge_core::{event_channel, BleMode, DeviceProfile, PeripheralConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let host = open_platform_host().await?;
//! let (events, _control) = event_channel();
//! let profile = BleFitnessProfile::new(BleMode::Pm5, host, &PeripheralConfig::default(), events)?;
//! profile.attach().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Support
//!
//! - **Linux**: GATT server and advertising via `bluer` with BlueZ, sensors via `btleplug`
//! - **Other platforms**: heart-rate straps only

pub mod codec;
pub mod cycling;
mod error;
pub mod ftms;
pub mod gatt;
pub mod host;
pub mod hrm;
pub mod pm5;
mod profile;
pub mod protocol;

// Public API exports
pub use cycling::{CyclingKind, CyclingPeripheral};
pub use error::BleProfileError;
pub use ftms::FtmsPeripheral;
pub use host::{open_platform_host, CentralOnlyHost, SensorCentral, SensorPeer};
#[cfg(target_os = "linux")]
pub use host::BluezHost;
pub use hrm::BleHeartRateMonitor;
pub use pm5::Pm5Peripheral;
pub use profile::BleFitnessProfile;
pub use protocol::FitnessMachineType;
