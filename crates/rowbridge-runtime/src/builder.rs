//! Peripheral Manager Builder API
//!
//! Lets consumers (CLI, tests) register the radios they have before starting the manager.
//! Radios that are not registered behave as unavailable: selecting a mode that needs one
//! leaves that radio `Off`.

use rowbridge_ant::AntPlusManager;
use rowbridge_core::{
    AntStick, BleHost, BridgeError, BridgeResult, EventSender, MqttClient, PeripheralConfig,
};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::arbiter::{opener, TransportArbiter, TransportOpener};
use crate::manager::PeripheralManager;

const BLE_HOST: &str = "BLE host";
const ANT_STICK: &str = "ANT+ stick";

// ----------------------------------------------------------------------------
// Peripheral Manager Builder
// ----------------------------------------------------------------------------

/// Builder for a [`PeripheralManager`]
pub struct PeripheralManagerBuilder {
    config: PeripheralConfig,
    events: EventSender,
    ble_host: Option<TransportOpener<dyn BleHost>>,
    ant_stick: Option<TransportOpener<AntPlusManager>>,
    mqtt_client: Option<Arc<dyn MqttClient>>,
}

impl PeripheralManagerBuilder {
    /// Create a builder; `events` receives control commands and heart-rate measurements
    pub fn new(config: PeripheralConfig, events: EventSender) -> Self {
        Self {
            config,
            events,
            ble_host: None,
            ant_stick: None,
            mqtt_client: None,
        }
    }

    /// Share an already open BLE host
    pub fn with_ble_host(self, host: Arc<dyn BleHost>) -> Self {
        self.with_ble_host_opener(move || {
            let host = Arc::clone(&host);
            async move { Ok::<_, BridgeError>(host) }
        })
    }

    /// Open the BLE host when a profile first needs it, again after it was closed
    pub fn with_ble_host_opener<F, Fut>(mut self, open: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BridgeResult<Arc<dyn BleHost>>> + Send + 'static,
    {
        self.ble_host = Some(opener(open));
        self
    }

    /// Drive ANT+ through `stick`; the stick is reset and keyed on every opening
    pub fn with_ant_stick(self, stick: Arc<dyn AntStick>) -> Self {
        self.with_ant_stick_opener(move || {
            let stick = Arc::clone(&stick);
            async move { Ok::<_, BridgeError>(stick) }
        })
    }

    /// Open the ANT+ stick when a profile first needs it
    pub fn with_ant_stick_opener<F, Fut>(mut self, open: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BridgeResult<Arc<dyn AntStick>>> + Send + 'static,
    {
        let open = Arc::new(open);
        self.ant_stick = Some(opener(move || {
            let open = Arc::clone(&open);
            async move {
                let stick = (*open)().await?;
                let manager = Arc::new(AntPlusManager::new(stick));
                manager.open().await?;
                Ok::<_, BridgeError>(manager)
            }
        }));
        self
    }

    /// Publish metrics and receive workout plans through `client`
    pub fn with_mqtt_client(mut self, client: Arc<dyn MqttClient>) -> Self {
        self.mqtt_client = Some(client);
        self
    }

    /// Validate the configuration and build the manager without starting any radio
    pub fn build(self) -> BridgeResult<PeripheralManager> {
        self.config.validate()?;
        info!(
            "Building peripheral manager (BLE host: {}, ANT+ stick: {}, MQTT: {})",
            self.ble_host.is_some(),
            self.ant_stick.is_some(),
            self.mqtt_client.is_some()
        );
        let ble_host = match self.ble_host {
            Some(open) => TransportArbiter::new(BLE_HOST, open),
            None => TransportArbiter::unavailable(BLE_HOST),
        };
        let ant_stick = match self.ant_stick {
            Some(open) => TransportArbiter::new(ANT_STICK, open),
            None => TransportArbiter::unavailable(ANT_STICK),
        };
        Ok(PeripheralManager::new(
            self.config,
            self.events,
            ble_host,
            ant_stick,
            self.mqtt_client,
        ))
    }

    /// Build the manager and bring up the configured modes
    pub async fn build_and_start(self) -> BridgeResult<Arc<PeripheralManager>> {
        let manager = Arc::new(self.build()?);
        manager.start().await;
        Ok(manager)
    }
}
