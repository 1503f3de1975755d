//! Transport contracts for the radios and the broker
//!
//! The BLE host stack, the ANT+ USB stick and the MQTT client are opaque to the profiles.
//! Each is reached through a trait so the platform implementations and the in-memory
//! loopbacks are interchangeable.

use crate::errors::BridgeResult;
use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// GATT Description
// ----------------------------------------------------------------------------

/// Properties of a published characteristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacteristicProperties {
    pub read: bool,
    pub write: bool,
    pub write_without_response: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicProperties {
    pub const READ: Self = Self {
        read: true,
        write: false,
        write_without_response: false,
        notify: false,
        indicate: false,
    };

    pub const NOTIFY: Self = Self {
        read: false,
        write: false,
        write_without_response: false,
        notify: true,
        indicate: false,
    };

    pub const READ_NOTIFY: Self = Self {
        read: true,
        notify: true,
        ..Self::READ
    };

    pub const WRITE_INDICATE: Self = Self {
        read: false,
        write: true,
        write_without_response: false,
        notify: false,
        indicate: true,
    };

    pub const WRITE: Self = Self {
        read: false,
        write: true,
        write_without_response: true,
        notify: false,
        indicate: false,
    };
}

/// Characteristic in a published service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub properties: CharacteristicProperties,
    /// Value returned to reads
    pub value: Vec<u8>,
}

impl GattCharacteristic {
    pub fn new(uuid: Uuid, properties: CharacteristicProperties) -> Self {
        Self {
            uuid,
            properties,
            value: Vec::new(),
        }
    }

    /// Read-only characteristic with a fixed value
    pub fn read_only(uuid: Uuid, value: impl Into<Vec<u8>>) -> Self {
        Self {
            uuid,
            properties: CharacteristicProperties::READ,
            value: value.into(),
        }
    }

    pub fn with_value(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.value = value.into();
        self
    }
}

/// Primary service to publish on the local GATT server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn new(uuid: Uuid, characteristics: Vec<GattCharacteristic>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }

    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Advertising payload of a BLE peripheral
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Advertisement {
    pub local_name: String,
    /// Service UUIDs in the advertising packet
    pub service_uuids: Vec<Uuid>,
    /// Service UUIDs placed in the scan response
    pub scan_response_uuids: Vec<Uuid>,
    pub service_data: Vec<(Uuid, Vec<u8>)>,
}

// ----------------------------------------------------------------------------
// BLE Host
// ----------------------------------------------------------------------------

/// Event raised by the local GATT server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    CentralConnected { address: String },
    CentralDisconnected { address: String },
    Subscribed { characteristic: Uuid },
    Unsubscribed { characteristic: Uuid },
    Write { characteristic: Uuid, value: Vec<u8> },
}

pub type HostEventReceiver = mpsc::UnboundedReceiver<HostEvent>;

/// Notification received from a remote sensor in the central role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorNotification {
    pub characteristic: Uuid,
    pub value: Vec<u8>,
}

pub type SensorReceiver = mpsc::UnboundedReceiver<SensorNotification>;

/// BLE host stack shared by the fitness profile and the heart-rate client
#[async_trait]
pub trait BleHost: Send + Sync {
    /// Publish services on the GATT server; events stream until `unpublish`
    async fn publish(&self, services: Vec<GattService>) -> BridgeResult<HostEventReceiver>;

    /// Remove the published services
    async fn unpublish(&self) -> BridgeResult<()>;

    async fn start_advertising(&self, advertisement: &Advertisement) -> BridgeResult<()>;

    async fn stop_advertising(&self) -> BridgeResult<()>;

    /// Notify or indicate subscribed centrals
    async fn notify(&self, characteristic: Uuid, value: &[u8]) -> BridgeResult<()>;

    /// Disconnect every connected central; resolves immediately with none connected
    async fn disconnect_centrals(&self) -> BridgeResult<()>;

    /// Connect to a sensor advertising `service`, subscribe and read `characteristics`
    async fn connect_sensor(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> BridgeResult<SensorReceiver>;

    async fn disconnect_sensor(&self) -> BridgeResult<()>;

    /// Release the adapter
    async fn close(&self) -> BridgeResult<()>;
}

// ----------------------------------------------------------------------------
// ANT+ Stick
// ----------------------------------------------------------------------------

/// ANT USB stick speaking framed ANT serial messages
#[async_trait]
pub trait AntStick: Send + Sync {
    /// Write one framed message
    async fn write(&self, message: &[u8]) -> BridgeResult<()>;

    /// Stream of framed messages received from the stick
    fn inbound(&self) -> broadcast::Receiver<Vec<u8>>;

    async fn close(&self) -> BridgeResult<()>;
}

// ----------------------------------------------------------------------------
// MQTT Client
// ----------------------------------------------------------------------------

/// Connected MQTT client
#[async_trait]
pub trait MqttClient: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BridgeResult<()>;

    async fn subscribe(&self, topic: &str) -> BridgeResult<mpsc::UnboundedReceiver<Vec<u8>>>;

    async fn disconnect(&self) -> BridgeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_presets() {
        let props = CharacteristicProperties::READ_NOTIFY;
        assert!(props.read && props.notify && !props.write);
        let write = CharacteristicProperties::WRITE;
        assert!(write.write && write.write_without_response && !write.notify);
    }

    #[test]
    fn test_service_lookup() {
        let uuid = Uuid::from_u128(0x2A19);
        let service = GattService::new(
            Uuid::from_u128(0x180F),
            vec![GattCharacteristic::read_only(uuid, vec![100])],
        );
        assert_eq!(service.characteristic(uuid).map(|c| c.value.clone()), Some(vec![100]));
        assert!(service.characteristic(Uuid::nil()).is_none());
    }
}
