//! Peripheral manager integration tests
//!
//! Drive the manager through loopback radios: start-up, mode cycling, shared-radio
//! teardown, heart-rate fusion and concurrent switches.

use std::sync::Arc;
use std::time::Duration;

use rowbridge_ble::protocol::HEART_RATE_MEASUREMENT_UUID;
use rowbridge_core::testing::{LoopbackAntStick, LoopbackBleHost, LoopbackMqttClient};
use rowbridge_core::{
    event_channel, AntMode, BleHost, BleMode, BridgeError, ControlCommand, EventReceiver,
    HrmMode, MetricsContext, MetricsSnapshot, PeripheralConfig, PeripheralEvent,
};
use rowbridge_runtime::{PeripheralManager, PeripheralManagerBuilder, TransportRole};
use serde_json::Value;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn config(ble: BleMode, ant: AntMode, hrm: HrmMode) -> PeripheralConfig {
    PeripheralConfig::default()
        .with_ble_mode(ble)
        .with_ant_mode(ant)
        .with_hrm_mode(hrm)
}

fn session_start() -> MetricsSnapshot {
    MetricsSnapshot {
        metrics_context: MetricsContext {
            is_session_start: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn refreshes(rx: &mut EventReceiver) -> usize {
    let mut count = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(
            event,
            PeripheralEvent::Control(ControlCommand::RefreshPeripheralConfig)
        ) {
            count += 1;
        }
    }
    count
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

// ----------------------------------------------------------------------------
// Start-up and Cycling
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_start_brings_up_configured_modes() {
    let host = Arc::new(LoopbackBleHost::new());
    let stick = Arc::new(LoopbackAntStick::new());
    let (tx, mut rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Pm5, AntMode::Fe, HrmMode::Ble), tx)
        .with_ble_host(host.clone())
        .with_ant_stick(stick.clone())
        .build_and_start()
        .await
        .unwrap();

    assert_eq!(manager.ble_mode().await, BleMode::Pm5);
    assert_eq!(manager.ant_mode().await, AntMode::Fe);
    assert_eq!(manager.hrm_mode().await, HrmMode::Ble);
    assert_eq!(
        manager.ble_host().holders().await,
        vec![TransportRole::BleFitness, TransportRole::BleHeartRate]
    );
    assert_eq!(
        manager.ant_stick().holders().await,
        vec![TransportRole::AntFitness]
    );
    assert!(host.advertisement().is_some());
    assert_eq!(refreshes(&mut rx), 3);

    manager.shutdown_all_peripherals().await;
}

#[tokio::test(start_paused = true)]
async fn test_ble_cycle_skips_off() {
    let host = Arc::new(LoopbackBleHost::new());
    let (tx, mut rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Ftms, AntMode::Off, HrmMode::Off), tx)
        .with_ble_host(host.clone())
        .build_and_start()
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..5 {
        seen.push(manager.switch_ble_mode(None).await.unwrap());
    }
    assert_eq!(
        seen,
        vec![
            BleMode::FtmsBike,
            BleMode::Pm5,
            BleMode::Csc,
            BleMode::Cps,
            BleMode::Ftms
        ]
    );
    // the host stays open while one profile replaces the next
    assert_eq!(host.close_calls(), 0);
    assert_eq!(refreshes(&mut rx), 6);
}

#[tokio::test(start_paused = true)]
async fn test_ant_cycle_toggles_off() {
    let stick = Arc::new(LoopbackAntStick::new());
    let (tx, _rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Off), tx)
        .with_ant_stick(stick.clone())
        .build_and_start()
        .await
        .unwrap();

    manager
        .handle_command(&ControlCommand::SwitchAntPeripheralMode)
        .await;
    assert_eq!(manager.ant_mode().await, AntMode::Fe);
    manager
        .handle_command(&ControlCommand::SwitchAntPeripheralMode)
        .await;
    assert_eq!(manager.ant_mode().await, AntMode::Off);
    assert_eq!(stick.close_calls(), 1);
}

// ----------------------------------------------------------------------------
// Shared Radios
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_stick_closes_after_last_role() {
    let stick = Arc::new(LoopbackAntStick::new());
    let (tx, _rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Fe, HrmMode::Ant), tx)
        .with_ant_stick(stick.clone())
        .build_and_start()
        .await
        .unwrap();
    assert_eq!(
        manager.ant_stick().holders().await,
        vec![TransportRole::AntFitness, TransportRole::AntHeartRate]
    );

    assert_eq!(manager.switch_ant_mode(Some(AntMode::Off)).await, Some(AntMode::Off));
    assert_eq!(stick.close_calls(), 0);
    assert!(manager.ant_stick().is_open().await);

    assert_eq!(manager.switch_hrm_mode(Some(HrmMode::Off)).await, Some(HrmMode::Off));
    assert_eq!(stick.close_calls(), 1);
    assert!(!manager.ant_stick().is_open().await);
}

#[tokio::test(start_paused = true)]
async fn test_hrm_source_change_releases_previous_radio() {
    let host = Arc::new(LoopbackBleHost::new());
    let stick = Arc::new(LoopbackAntStick::new());
    let (tx, _rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Ant), tx)
        .with_ble_host(host.clone())
        .with_ant_stick(stick.clone())
        .build_and_start()
        .await
        .unwrap();

    assert_eq!(manager.switch_hrm_mode(Some(HrmMode::Ble)).await, Some(HrmMode::Ble));
    assert_eq!(stick.close_calls(), 1);
    assert_eq!(
        manager.ble_host().holders().await,
        vec![TransportRole::BleHeartRate]
    );
}

#[tokio::test(start_paused = true)]
async fn test_failing_host_leaves_ble_off() {
    let host = Arc::new(LoopbackBleHost::failing());
    let (tx, mut rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Off), tx)
        .with_ble_host(host.clone())
        .build()
        .unwrap();

    assert_eq!(manager.switch_ble_mode(Some(BleMode::Pm5)).await, Some(BleMode::Off));
    assert_eq!(manager.ble_mode().await, BleMode::Off);
    assert_eq!(host.close_calls(), 1);
    assert!(manager.ble_host().holders().await.is_empty());
    assert_eq!(refreshes(&mut rx), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_radio_leaves_mode_off() {
    let (tx, _rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Ftms, AntMode::Fe, HrmMode::Ant), tx)
        .build_and_start()
        .await
        .unwrap();

    let config = manager.config().await;
    assert_eq!(config.ble_mode, BleMode::Off);
    assert_eq!(config.ant_mode, AntMode::Off);
    assert_eq!(config.hrm_mode, HrmMode::Off);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_closes_everything() {
    let host = Arc::new(LoopbackBleHost::new());
    let stick = Arc::new(LoopbackAntStick::new());
    let client = Arc::new(LoopbackMqttClient::new());
    let (tx, _rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Ftms, AntMode::Fe, HrmMode::Ble), tx)
        .with_ble_host(host.clone())
        .with_ant_stick(stick.clone())
        .with_mqtt_client(client.clone())
        .build_and_start()
        .await
        .unwrap();

    manager.handle_command(&ControlCommand::Shutdown).await;
    assert_eq!(host.close_calls(), 1);
    assert_eq!(stick.close_calls(), 1);
    assert!(client.is_disconnected());
    assert!(!manager.ble_host().is_open().await);
}

// ----------------------------------------------------------------------------
// Heart Rate
// ----------------------------------------------------------------------------

fn published_heart_rates(client: &LoopbackMqttClient) -> Vec<Value> {
    client
        .published()
        .iter()
        .map(|(_, payload)| {
            let json: Value = serde_json::from_slice(payload).unwrap();
            json["heartrate"].clone()
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_heart_rate_is_fused_into_metrics() {
    let host = Arc::new(LoopbackBleHost::new());
    let client = Arc::new(LoopbackMqttClient::new());
    let (tx, mut rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Ble), tx)
        .with_ble_host(host.clone())
        .with_mqtt_client(client.clone())
        .build_and_start()
        .await
        .unwrap();
    settle().await;

    assert!(host.inject_sensor(HEART_RATE_MEASUREMENT_UUID, vec![0x00, 132]));
    settle().await;
    manager.notify_metrics(&session_start()).await;

    let mut forwarded = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PeripheralEvent::HeartRateMeasurement(measurement) = event {
            forwarded.push(measurement.heartrate);
        }
    }
    assert_eq!(forwarded, vec![Some(132.0)]);

    // silent strap
    tokio::time::sleep(Duration::from_secs(7)).await;
    manager.notify_metrics(&session_start()).await;

    assert_eq!(
        published_heart_rates(&client),
        vec![Value::from(132.0), Value::Null]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hrm_off_clears_heart_rate() {
    let host = Arc::new(LoopbackBleHost::new());
    let client = Arc::new(LoopbackMqttClient::new());
    let (tx, _rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Ble), tx)
        .with_ble_host(host.clone() as Arc<dyn BleHost>)
        .with_mqtt_client(client.clone())
        .build_and_start()
        .await
        .unwrap();
    settle().await;
    assert!(host.inject_sensor(HEART_RATE_MEASUREMENT_UUID, vec![0x00, 140]));
    settle().await;

    manager.switch_hrm_mode(Some(HrmMode::Off)).await;
    manager.notify_metrics(&session_start()).await;
    assert_eq!(published_heart_rates(&client), vec![Value::Null]);
    assert_eq!(host.close_calls(), 1);
}

// ----------------------------------------------------------------------------
// Commands and Concurrency
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_concurrent_switch_is_dropped() {
    let host: Arc<dyn BleHost> = Arc::new(LoopbackBleHost::new());
    let stick = Arc::new(LoopbackAntStick::new());
    let (tx, _rx) = event_channel();
    let manager: Arc<PeripheralManager> = Arc::new(
        PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Off), tx)
            .with_ble_host_opener(move || {
                let host = Arc::clone(&host);
                async move {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    Ok::<_, BridgeError>(host)
                }
            })
            .with_ant_stick(stick.clone())
            .build()
            .unwrap(),
    );

    let slow = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.switch_ble_mode(Some(BleMode::Pm5)).await })
    };
    settle().await;

    assert_eq!(manager.switch_ant_mode(Some(AntMode::Fe)).await, None);
    assert_eq!(manager.ant_mode().await, AntMode::Off);
    assert!(stick.written().is_empty());

    assert_eq!(slow.await.unwrap(), Some(BleMode::Pm5));
    assert_eq!(manager.switch_ant_mode(Some(AntMode::Fe)).await, Some(AntMode::Fe));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_command_name_is_ignored() {
    let (tx, mut rx) = event_channel();
    let manager = PeripheralManagerBuilder::new(config(BleMode::Off, AntMode::Off, HrmMode::Off), tx)
        .build()
        .unwrap();

    manager.handle_command_name("launchRocket", None).await;
    manager.handle_command_name("pause", None).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(manager.config().await.ble_mode, BleMode::Off);
}
