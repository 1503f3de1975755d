//! Peripheral configuration
//!
//! Selected modes for the three radios, the identity every profile advertises, timing of
//! the broadcast loops and the physiological bounds used by the heart-rate gate.

use crate::errors::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// ----------------------------------------------------------------------------
// Modes
// ----------------------------------------------------------------------------

/// A radio mode list with an `Off` member
pub trait PeripheralMode: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Every mode in cycling order
    const ALL: &'static [Self];
    /// The mode that disables the radio
    const OFF: Self;

    fn is_off(self) -> bool {
        self == Self::OFF
    }

    /// Next mode for an unparameterised switch
    ///
    /// `Off` is skipped while the list has more than one active mode, so cycling stays
    /// within the active modes. A list with a single active mode toggles it with `Off`.
    fn next(self) -> Self {
        let modes = Self::ALL;
        let active = modes.iter().filter(|mode| !mode.is_off()).count();
        let start = modes
            .iter()
            .position(|mode| *mode == self)
            .unwrap_or(modes.len().saturating_sub(1));
        for step in 1..=modes.len() {
            let candidate = modes[(start + step) % modes.len()];
            if candidate.is_off() && active > 1 {
                continue;
            }
            return candidate;
        }
        self
    }
}

/// BLE fitness profile selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BleMode {
    #[default]
    #[serde(rename = "FTMS")]
    Ftms,
    #[serde(rename = "FTMSBIKE")]
    FtmsBike,
    #[serde(rename = "PM5")]
    Pm5,
    #[serde(rename = "CSC")]
    Csc,
    #[serde(rename = "CPS")]
    Cps,
    #[serde(rename = "OFF")]
    Off,
}

impl PeripheralMode for BleMode {
    const ALL: &'static [Self] = &[
        Self::Ftms,
        Self::FtmsBike,
        Self::Pm5,
        Self::Csc,
        Self::Cps,
        Self::Off,
    ];
    const OFF: Self = Self::Off;
}

/// ANT+ fitness profile selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AntMode {
    #[serde(rename = "FE")]
    Fe,
    #[default]
    #[serde(rename = "OFF")]
    Off,
}

impl PeripheralMode for AntMode {
    const ALL: &'static [Self] = &[Self::Fe, Self::Off];
    const OFF: Self = Self::Off;
}

/// Heart-rate monitor source selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HrmMode {
    #[serde(rename = "ANT")]
    Ant,
    #[serde(rename = "BLE")]
    Ble,
    #[default]
    #[serde(rename = "OFF")]
    Off,
}

impl PeripheralMode for HrmMode {
    const ALL: &'static [Self] = &[Self::Ant, Self::Ble, Self::Off];
    const OFF: Self = Self::Off;
}

macro_rules! mode_names {
    ($ty:ty { $($variant:ident => $name:literal),* $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = BridgeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_uppercase().as_str() {
                    $($name => Ok(Self::$variant),)*
                    other => Err(BridgeError::invalid_configuration(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    ))),
                }
            }
        }
    };
}

mode_names!(BleMode {
    Ftms => "FTMS",
    FtmsBike => "FTMSBIKE",
    Pm5 => "PM5",
    Csc => "CSC",
    Cps => "CPS",
    Off => "OFF",
});
mode_names!(AntMode { Fe => "FE", Off => "OFF" });
mode_names!(HrmMode { Ant => "ANT", Ble => "BLE", Off => "OFF" });

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// Identity exposed through device information services and advertising
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineIdentity {
    /// Local name advertised by the generic BLE profiles
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub hardware_revision: String,
}

impl Default for MachineIdentity {
    fn default() -> Self {
        Self {
            name: "OpenRowingMonitor".to_string(),
            manufacturer: "OpenRowingMonitor".to_string(),
            model: "rowbridge".to_string(),
            serial_number: "430000001".to_string(),
            firmware_revision: env!("CARGO_PKG_VERSION").to_string(),
            hardware_revision: "1".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Timing
// ----------------------------------------------------------------------------

/// Broadcast loop timing, in milliseconds unless noted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileTiming {
    pub ftms_rower_interval_ms: u64,
    pub ftms_bike_interval_ms: u64,
    pub pm5_heartbeat_interval_ms: u64,
    pub cycling_broadcast_interval_ms: u64,
    pub cycling_minimum_update_ms: u64,
    pub heart_rate_timeout_ms: u64,
    /// ANT+ FE channel period in 1/32768 s
    pub ant_channel_period: u16,
}

impl Default for ProfileTiming {
    fn default() -> Self {
        Self {
            ftms_rower_interval_ms: 1000,
            ftms_bike_interval_ms: 1000,
            pm5_heartbeat_interval_ms: 1000,
            cycling_broadcast_interval_ms: 1000,
            cycling_minimum_update_ms: 4000,
            heart_rate_timeout_ms: 6000,
            ant_channel_period: 8192,
        }
    }
}

impl ProfileTiming {
    pub fn ftms_rower_interval(&self) -> Duration {
        Duration::from_millis(self.ftms_rower_interval_ms)
    }

    pub fn ftms_bike_interval(&self) -> Duration {
        Duration::from_millis(self.ftms_bike_interval_ms)
    }

    pub fn pm5_heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.pm5_heartbeat_interval_ms)
    }

    pub fn cycling_broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.cycling_broadcast_interval_ms)
    }

    pub fn cycling_minimum_update(&self) -> Duration {
        Duration::from_millis(self.cycling_minimum_update_ms)
    }

    pub fn heart_rate_timeout(&self) -> Duration {
        Duration::from_millis(self.heart_rate_timeout_ms)
    }

    /// Time between two ANT+ FE pages
    pub fn ant_page_interval(&self) -> Duration {
        Duration::from_micros(u64::from(self.ant_channel_period) * 1_000_000 / 32_768)
    }
}

/// Physiological heart-rate bounds in beats per minute
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateBounds {
    pub resting_hr: f64,
    pub max_hr: f64,
}

impl Default for HeartRateBounds {
    fn default() -> Self {
        Self {
            resting_hr: 40.0,
            max_hr: 220.0,
        }
    }
}

impl HeartRateBounds {
    /// Whether `value` is a plausible heart rate
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && self.resting_hr <= value && value <= self.max_hr
    }
}

// ----------------------------------------------------------------------------
// Peripheral Configuration
// ----------------------------------------------------------------------------

/// Configuration for the peripheral bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    pub ble_mode: BleMode,
    pub ant_mode: AntMode,
    pub hrm_mode: HrmMode,
    pub identity: MachineIdentity,
    /// ANT+ device number of the FE channel
    pub ant_device_id: u16,
    pub timing: ProfileTiming,
    pub heart_rate: HeartRateBounds,
    /// Machine name used in MQTT topics
    pub mqtt_machine_name: String,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            ble_mode: BleMode::default(),
            ant_mode: AntMode::default(),
            hrm_mode: HrmMode::default(),
            identity: MachineIdentity::default(),
            ant_device_id: 57063,
            timing: ProfileTiming::default(),
            heart_rate: HeartRateBounds::default(),
            mqtt_machine_name: "rower".to_string(),
        }
    }
}

impl PeripheralConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ble_mode(mut self, mode: BleMode) -> Self {
        self.ble_mode = mode;
        self
    }

    pub fn with_ant_mode(mut self, mode: AntMode) -> Self {
        self.ant_mode = mode;
        self
    }

    pub fn with_hrm_mode(mut self, mode: HrmMode) -> Self {
        self.hrm_mode = mode;
        self
    }

    pub fn with_identity(mut self, identity: MachineIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_ant_device_id(mut self, device_id: u16) -> Self {
        self.ant_device_id = device_id;
        self
    }

    pub fn with_timing(mut self, timing: ProfileTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_heart_rate_bounds(mut self, resting_hr: f64, max_hr: f64) -> Self {
        self.heart_rate = HeartRateBounds { resting_hr, max_hr };
        self
    }

    pub fn with_mqtt_machine_name(mut self, name: impl Into<String>) -> Self {
        self.mqtt_machine_name = name.into();
        self
    }

    /// Reject settings no profile could run with
    pub fn validate(&self) -> BridgeResult<()> {
        let bounds = &self.heart_rate;
        if !(bounds.resting_hr >= 0.0 && bounds.resting_hr < bounds.max_hr) {
            return Err(BridgeError::invalid_configuration(format!(
                "heart rate bounds must satisfy 0 <= resting ({}) < max ({})",
                bounds.resting_hr, bounds.max_hr
            )));
        }
        let timing = &self.timing;
        let intervals = [
            ("ftms_rower_interval_ms", timing.ftms_rower_interval_ms),
            ("ftms_bike_interval_ms", timing.ftms_bike_interval_ms),
            ("pm5_heartbeat_interval_ms", timing.pm5_heartbeat_interval_ms),
            ("cycling_broadcast_interval_ms", timing.cycling_broadcast_interval_ms),
            ("heart_rate_timeout_ms", timing.heart_rate_timeout_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(BridgeError::invalid_configuration(format!(
                "{name} must be greater than zero"
            )));
        }
        if timing.ant_channel_period == 0 {
            return Err(BridgeError::invalid_configuration(
                "ant_channel_period must be greater than zero",
            ));
        }
        if self.identity.serial_number.is_empty() {
            return Err(BridgeError::invalid_configuration("serial number is empty"));
        }
        if self.mqtt_machine_name.contains(['/', '+', '#']) {
            return Err(BridgeError::invalid_configuration(
                "MQTT machine name must not contain topic separators or wildcards",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ble_cycling_skips_off() {
        assert_eq!(BleMode::Off.next(), BleMode::Ftms);
        assert_eq!(BleMode::Cps.next(), BleMode::Ftms);
        assert_eq!(BleMode::Ftms.next(), BleMode::FtmsBike);
        assert_eq!(BleMode::Pm5.next(), BleMode::Csc);
    }

    #[test]
    fn test_single_active_mode_toggles() {
        assert_eq!(AntMode::Fe.next(), AntMode::Off);
        assert_eq!(AntMode::Off.next(), AntMode::Fe);
    }

    #[test]
    fn test_hrm_cycling() {
        assert_eq!(HrmMode::Off.next(), HrmMode::Ant);
        assert_eq!(HrmMode::Ant.next(), HrmMode::Ble);
        assert_eq!(HrmMode::Ble.next(), HrmMode::Ant);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ftmsbike".parse::<BleMode>().unwrap(), BleMode::FtmsBike);
        assert_eq!("FE".parse::<AntMode>().unwrap(), AntMode::Fe);
        assert!("bluetooth".parse::<HrmMode>().is_err());
        assert_eq!(BleMode::Pm5.to_string(), "PM5");
    }

    #[test]
    fn test_config_validation() {
        assert!(PeripheralConfig::new().validate().is_ok());
        let inverted = PeripheralConfig::new().with_heart_rate_bounds(200.0, 60.0);
        assert!(inverted.validate().is_err());
        let wildcard = PeripheralConfig::new().with_mqtt_machine_name("rower/#");
        assert!(wildcard.validate().is_err());
    }

    #[test]
    fn test_ant_page_interval() {
        assert_eq!(
            ProfileTiming::default().ant_page_interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_bounds_gate() {
        let bounds = HeartRateBounds::default();
        assert!(bounds.accepts(40.0));
        assert!(bounds.accepts(220.0));
        assert!(!bounds.accepts(30.0));
        assert!(!bounds.accepts(f64::NAN));
    }

    #[test]
    fn test_partial_toml_like_json_uses_defaults() {
        let config: PeripheralConfig =
            serde_json::from_str(r#"{"ble_mode":"PM5","timing":{"pm5_heartbeat_interval_ms":500}}"#)
                .unwrap();
        assert_eq!(config.ble_mode, BleMode::Pm5);
        assert_eq!(config.timing.pm5_heartbeat_interval_ms, 500);
        assert_eq!(config.timing.cycling_minimum_update_ms, 4000);
        assert_eq!(config.ant_mode, AntMode::Off);
    }
}
