//! Loading configuration files from disk

use std::path::PathBuf;

use rowbridge_cli::{AppConfig, CliError};
use rowbridge_core::{BleMode, BridgeError, HrmMode};

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn write_config(name: &str, contents: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("rowbridge-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

#[test]
fn test_explicit_file_is_loaded() {
    let path = write_config(
        "explicit.toml",
        r#"
        [peripherals]
        ble_mode = "CSC"
        hrm_mode = "BLE"
        mqtt_machine_name = "erg2"

        [peripherals.identity]
        serial_number = "430000042"
        "#,
    );

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.peripherals.ble_mode, BleMode::Csc);
    assert_eq!(config.peripherals.hrm_mode, HrmMode::Ble);
    assert_eq!(config.peripherals.mqtt_machine_name, "erg2");
    assert_eq!(config.peripherals.identity.serial_number, "430000042");
    assert_eq!(config.peripherals.identity.hardware_revision, "1");
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let path = std::env::temp_dir().join("rowbridge-does-not-exist.toml");
    assert!(matches!(
        AppConfig::load(Some(&path)),
        Err(CliError::Config(_))
    ));
}

#[test]
fn test_topic_characters_in_machine_name_are_rejected() {
    let path = write_config(
        "topic.toml",
        "[peripherals]\nmqtt_machine_name = \"rower/1\"\n",
    );
    let err = AppConfig::load_from_file(&path).unwrap_err();
    let bridge: BridgeError = err.into();
    assert!(matches!(bridge, BridgeError::InvalidConfiguration { .. }));
}
