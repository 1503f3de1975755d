//! In-memory transports for tests
//!
//! Each loopback records what the profiles send and lets a test inject what a central,
//! a sensor, the ANT stick or the broker would deliver.

use crate::errors::{BridgeResult, TransportError};
use crate::transport::{
    Advertisement, AntStick, BleHost, GattService, HostEvent, HostEventReceiver, MqttClient,
    SensorNotification, SensorReceiver,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ----------------------------------------------------------------------------
// BLE
// ----------------------------------------------------------------------------

#[derive(Default)]
struct BleState {
    published: Vec<GattService>,
    advertising: Option<Advertisement>,
    advertise_count: usize,
    notifications: Vec<(Uuid, Vec<u8>)>,
    events: Option<mpsc::UnboundedSender<HostEvent>>,
    sensor: Option<mpsc::UnboundedSender<SensorNotification>>,
    sensor_service: Option<Uuid>,
    disconnect_calls: usize,
    close_calls: usize,
    fail_publish: bool,
    fail_advertising: bool,
    fail_sensor: bool,
}

/// BLE host that records publications, advertising and notifications
#[derive(Default)]
pub struct LoopbackBleHost {
    state: Mutex<BleState>,
}

impl LoopbackBleHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose GATT server refuses every publication
    pub fn failing() -> Self {
        let host = Self::default();
        guard(&host.state).fail_publish = true;
        host
    }

    /// Host that publishes services but cannot advertise them
    pub fn without_advertising() -> Self {
        let host = Self::default();
        guard(&host.state).fail_advertising = true;
        host
    }

    /// Host that never finds a sensor
    pub fn without_sensors() -> Self {
        let host = Self::default();
        guard(&host.state).fail_sensor = true;
        host
    }

    /// Deliver a GATT server event; false when nothing is published
    pub fn inject(&self, event: HostEvent) -> bool {
        guard(&self.state)
            .events
            .as_ref()
            .is_some_and(|tx| tx.send(event).is_ok())
    }

    /// Deliver a sensor notification; false when no sensor is connected
    pub fn inject_sensor(&self, characteristic: Uuid, value: Vec<u8>) -> bool {
        guard(&self.state).sensor.as_ref().is_some_and(|tx| {
            tx.send(SensorNotification {
                characteristic,
                value,
            })
            .is_ok()
        })
    }

    pub fn published(&self) -> Vec<GattService> {
        guard(&self.state).published.clone()
    }

    pub fn advertisement(&self) -> Option<Advertisement> {
        guard(&self.state).advertising.clone()
    }

    /// Number of times advertising was started
    pub fn advertise_count(&self) -> usize {
        guard(&self.state).advertise_count
    }

    pub fn notifications(&self) -> Vec<(Uuid, Vec<u8>)> {
        guard(&self.state).notifications.clone()
    }

    pub fn notifications_for(&self, characteristic: Uuid) -> Vec<Vec<u8>> {
        guard(&self.state)
            .notifications
            .iter()
            .filter(|(uuid, _)| *uuid == characteristic)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub fn clear_notifications(&self) {
        guard(&self.state).notifications.clear();
    }

    pub fn sensor_service(&self) -> Option<Uuid> {
        guard(&self.state).sensor_service
    }

    pub fn disconnect_calls(&self) -> usize {
        guard(&self.state).disconnect_calls
    }

    pub fn close_calls(&self) -> usize {
        guard(&self.state).close_calls
    }
}

#[async_trait]
impl BleHost for LoopbackBleHost {
    async fn publish(&self, services: Vec<GattService>) -> BridgeResult<HostEventReceiver> {
        let mut state = guard(&self.state);
        if state.fail_publish {
            return Err(TransportError::Busy {
                reason: "loopback refuses publication".to_string(),
            }
            .into());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.published = services;
        state.events = Some(tx);
        Ok(rx)
    }

    async fn unpublish(&self) -> BridgeResult<()> {
        let mut state = guard(&self.state);
        state.published.clear();
        state.events = None;
        Ok(())
    }

    async fn start_advertising(&self, advertisement: &Advertisement) -> BridgeResult<()> {
        let mut state = guard(&self.state);
        if state.fail_advertising {
            return Err(TransportError::Busy {
                reason: "loopback refuses advertising".to_string(),
            }
            .into());
        }
        state.advertising = Some(advertisement.clone());
        state.advertise_count += 1;
        Ok(())
    }

    async fn stop_advertising(&self) -> BridgeResult<()> {
        guard(&self.state).advertising = None;
        Ok(())
    }

    async fn notify(&self, characteristic: Uuid, value: &[u8]) -> BridgeResult<()> {
        let mut state = guard(&self.state);
        let known = state
            .published
            .iter()
            .any(|service| service.characteristic(characteristic).is_some());
        if !known {
            return Err(TransportError::UnknownCharacteristic {
                uuid: characteristic,
            }
            .into());
        }
        state.notifications.push((characteristic, value.to_vec()));
        Ok(())
    }

    async fn disconnect_centrals(&self) -> BridgeResult<()> {
        guard(&self.state).disconnect_calls += 1;
        Ok(())
    }

    async fn connect_sensor(
        &self,
        service: Uuid,
        _characteristics: &[Uuid],
    ) -> BridgeResult<SensorReceiver> {
        let mut state = guard(&self.state);
        if state.fail_sensor {
            return Err(TransportError::SensorNotFound { service }.into());
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.sensor = Some(tx);
        state.sensor_service = Some(service);
        Ok(rx)
    }

    async fn disconnect_sensor(&self) -> BridgeResult<()> {
        let mut state = guard(&self.state);
        state.sensor = None;
        state.sensor_service = None;
        Ok(())
    }

    async fn close(&self) -> BridgeResult<()> {
        let mut state = guard(&self.state);
        state.close_calls += 1;
        state.advertising = None;
        state.events = None;
        state.sensor = None;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// ANT+
// ----------------------------------------------------------------------------

/// ANT stick that records written frames
pub struct LoopbackAntStick {
    written: Mutex<Vec<Vec<u8>>>,
    inbound: broadcast::Sender<Vec<u8>>,
    close_calls: Mutex<usize>,
}

impl Default for LoopbackAntStick {
    fn default() -> Self {
        let (inbound, _) = broadcast::channel(64);
        Self {
            written: Mutex::new(Vec::new()),
            inbound,
            close_calls: Mutex::new(0),
        }
    }
}

impl LoopbackAntStick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a framed message as if the stick had received it
    pub fn inject(&self, message: Vec<u8>) -> bool {
        self.inbound.send(message).is_ok()
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        guard(&self.written).clone()
    }

    pub fn clear_written(&self) {
        guard(&self.written).clear();
    }

    pub fn close_calls(&self) -> usize {
        *guard(&self.close_calls)
    }
}

#[async_trait]
impl AntStick for LoopbackAntStick {
    async fn write(&self, message: &[u8]) -> BridgeResult<()> {
        guard(&self.written).push(message.to_vec());
        Ok(())
    }

    fn inbound(&self) -> broadcast::Receiver<Vec<u8>> {
        self.inbound.subscribe()
    }

    async fn close(&self) -> BridgeResult<()> {
        *guard(&self.close_calls) += 1;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// MQTT
// ----------------------------------------------------------------------------

/// MQTT client that records publications and routes injected messages to subscribers
#[derive(Default)]
pub struct LoopbackMqttClient {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    subscriptions: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
    disconnected: Mutex<bool>,
}

impl LoopbackMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a message on `topic`; false when nobody subscribed
    pub fn inject(&self, topic: &str, payload: Vec<u8>) -> bool {
        guard(&self.subscriptions)
            .get(topic)
            .is_some_and(|tx| tx.send(payload).is_ok())
    }

    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        guard(&self.published).clone()
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        guard(&self.subscriptions).keys().cloned().collect()
    }

    pub fn is_disconnected(&self) -> bool {
        *guard(&self.disconnected)
    }
}

#[async_trait]
impl MqttClient for LoopbackMqttClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BridgeResult<()> {
        guard(&self.published).push((topic.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BridgeResult<mpsc::UnboundedReceiver<Vec<u8>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        guard(&self.subscriptions).insert(topic.to_string(), tx);
        Ok(rx)
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        guard(&self.subscriptions).clear();
        *guard(&self.disconnected) = true;
        Ok(())
    }
}
