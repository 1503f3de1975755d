//! rowbridge CLI Configuration Management
//!
//! Configuration is layered: command line flags > configuration file > defaults. The file
//! is TOML and lives in `<config dir>/rowbridge/rowbridge.toml` unless `--config` names
//! another one.

use std::path::{Path, PathBuf};

use rowbridge_core::PeripheralConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::cli::Cli;
use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the rowbridge CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Modes, identity, timing and heart-rate bounds of the bridge
    pub peripherals: PeripheralConfig,

    /// Which radios this host has
    pub radios: RadioConfig,
}

/// Radios available to the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub ble: bool,
    pub ant: bool,
    /// Log MQTT traffic through the built-in client
    pub mqtt: bool,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            ble: true,
            ant: true,
            mqtt: true,
        }
    }
}

impl AppConfig {
    /// `<config dir>/rowbridge/rowbridge.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("rowbridge").join("rowbridge.toml"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load `explicit` if given, else the default file if it exists, else defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from: {}", path.display());
            return Self::load_from_file(path);
        }
        match Self::default_path().filter(|path| path.exists()) {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)
            }
            None => {
                info!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Apply mode and radio flags from the command line
    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(mode) = cli.ble_mode {
            self.peripherals.ble_mode = mode;
        }
        if let Some(mode) = cli.ant_mode {
            self.peripherals.ant_mode = mode;
        }
        if let Some(mode) = cli.hrm_mode {
            self.peripherals.hrm_mode = mode;
        }
        if cli.no_ble {
            self.radios.ble = false;
        }
        if cli.no_ant {
            self.radios.ant = false;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.peripherals.validate()?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use rowbridge_core::{AntMode, BleMode, HrmMode};

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [peripherals]
            ble_mode = "PM5"
            hrm_mode = "ANT"

            [peripherals.heart_rate]
            max_hr = 190.0

            [radios]
            mqtt = false
            "#,
        )
        .unwrap();

        assert_eq!(config.peripherals.ble_mode, BleMode::Pm5);
        assert_eq!(config.peripherals.hrm_mode, HrmMode::Ant);
        assert_eq!(config.peripherals.heart_rate.max_hr, 190.0);
        assert_eq!(config.peripherals.heart_rate.resting_hr, 40.0);
        assert_eq!(config.peripherals.ant_device_id, 57063);
        assert!(config.radios.ble);
        assert!(!config.radios.mqtt);
    }

    #[test]
    fn test_inverted_heart_rate_bounds_are_rejected() {
        let parsed = AppConfig::from_toml_str(
            r#"
            [peripherals.heart_rate]
            resting_hr = 180.0
            max_hr = 120.0
            "#,
        );
        assert!(matches!(parsed, Err(CliError::Bridge(_))));
    }

    #[test]
    fn test_unknown_mode_is_a_parse_error() {
        let parsed = AppConfig::from_toml_str("[peripherals]\nble_mode = \"ROWER\"\n");
        assert!(matches!(parsed, Err(CliError::TomlParsing(_))));
    }

    #[test]
    fn test_flags_override_file() {
        let mut config = AppConfig::default();
        let cli = Cli::parse_from(["rowbridge", "--ant-mode", "off", "--no-ble", "config"]);
        config.apply_overrides(&cli);
        assert_eq!(config.peripherals.ant_mode, AntMode::Off);
        assert_eq!(config.peripherals.ble_mode, BleMode::Ftms);
        assert!(!config.radios.ble);
        assert!(config.radios.ant);
    }

    #[test]
    fn test_toml_output_reloads() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml_str(&text).unwrap(), config);
    }
}
