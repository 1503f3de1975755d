//! Bridge application
//!
//! Wires the configured radios into a peripheral manager and routes the commands the
//! profiles raise back into it.

use std::sync::{Arc, Weak};

use rowbridge_ble::open_platform_host;
use rowbridge_core::{
    event_channel, ControlCommand, EventReceiver, MqttClient, PeripheralEvent,
};
use rowbridge_mqtt::workout_plans_topic;
use rowbridge_runtime::{PeripheralManager, PeripheralManagerBuilder};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::transports::{LoggingAntStick, LoggingMqttClient};

// ----------------------------------------------------------------------------
// Event Routing
// ----------------------------------------------------------------------------

async fn route_events(mut events: EventReceiver, manager: Weak<PeripheralManager>) {
    while let Some(event) = events.recv().await {
        match event {
            PeripheralEvent::Control(command) => {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                match &command {
                    ControlCommand::UpdateIntervalSettings(plan) => {
                        info!("Workout plan with {} intervals received", plan.len())
                    }
                    ControlCommand::RefreshPeripheralConfig => {
                        let config = manager.config().await;
                        info!(
                            "Peripherals: BLE {}, ANT+ {}, HRM {}",
                            config.ble_mode, config.ant_mode, config.hrm_mode
                        );
                    }
                    other => debug!("Routing command {}", other.name()),
                }
                manager.handle_command(&command).await;
            }
            PeripheralEvent::HeartRateMeasurement(measurement) => {
                debug!(
                    "Heart rate {:?} bpm, battery {:?}%",
                    measurement.heartrate, measurement.battery_level
                );
            }
        }
    }
    debug!("Event channel closed");
}

// ----------------------------------------------------------------------------
// Application
// ----------------------------------------------------------------------------

/// Running bridge with its command router
pub struct BridgeApp {
    manager: Arc<PeripheralManager>,
    mqtt: Option<Arc<LoggingMqttClient>>,
    router: JoinHandle<()>,
}

impl BridgeApp {
    /// Build the manager from `config`, start the configured modes and the router
    pub async fn start(config: AppConfig) -> Result<Self> {
        let (tx, rx) = event_channel();
        let mut builder = PeripheralManagerBuilder::new(config.peripherals.clone(), tx);
        if config.radios.ble {
            builder = builder.with_ble_host_opener(open_platform_host);
        }
        if config.radios.ant {
            builder = builder.with_ant_stick(Arc::new(LoggingAntStick::new()));
        }
        let mqtt = config.radios.mqtt.then(|| Arc::new(LoggingMqttClient::new()));
        if let Some(client) = &mqtt {
            builder = builder.with_mqtt_client(Arc::clone(client) as Arc<dyn MqttClient>);
        }

        let manager = builder.build_and_start().await?;
        let router = tokio::spawn(route_events(rx, Arc::downgrade(&manager)));
        info!("Bridge started");
        Ok(Self {
            manager,
            mqtt,
            router,
        })
    }

    pub fn manager(&self) -> &Arc<PeripheralManager> {
        &self.manager
    }

    /// Hand a workout plan to the MQTT bridge as if the broker had delivered it
    pub async fn submit_workout_plan(&self, payload: Vec<u8>) -> Result<()> {
        let client = self
            .mqtt
            .as_ref()
            .ok_or_else(|| CliError::Config("MQTT is disabled".to_string()))?;
        let topic = workout_plans_topic(&self.manager.config().await.mqtt_machine_name);
        if !client.inject(&topic, payload) {
            warn!("Nobody listens on {}", topic);
        }
        Ok(())
    }

    /// Shut every peripheral down and stop routing
    pub async fn shutdown(self) {
        self.manager.shutdown_all_peripherals().await;
        self.router.abort();
        info!("Bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::{AntMode, BleMode, HrmMode};

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.radios.ble = false;
        config.peripherals.ble_mode = BleMode::Ftms;
        config.peripherals.ant_mode = AntMode::Fe;
        config.peripherals.hrm_mode = HrmMode::Off;
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_adapter_leaves_ble_off() {
        let app = BridgeApp::start(config()).await.unwrap();
        let modes = app.manager().config().await;
        assert_eq!(modes.ble_mode, BleMode::Off);
        assert_eq!(modes.ant_mode, AntMode::Fe);
        app.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_command_by_name() {
        let app = BridgeApp::start(config()).await.unwrap();
        app.manager()
            .handle_command_name("switchAntPeripheralMode", None)
            .await;
        assert_eq!(app.manager().ant_mode().await, AntMode::Off);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_plan_without_mqtt_is_an_error() {
        let mut config = config();
        config.radios.mqtt = false;
        let app = BridgeApp::start(config).await.unwrap();
        assert!(app.submit_workout_plan(b"[]".to_vec()).await.is_err());
        app.shutdown().await;
    }
}
