//! Published GATT application shared by every BLE fitness profile
//!
//! A `GattSession` owns the service tree a profile published on the host, keeps track of
//! which characteristics centrals subscribed to, forwards writes to the profile and
//! re-advertises whenever a central disconnects.

use async_trait::async_trait;
use rowbridge_core::{
    Advertisement, BleHost, BridgeResult, GattCharacteristic, GattService, HostEvent,
    HostEventReceiver, MachineIdentity,
};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::protocol::{
    DEVICE_INFORMATION_SERVICE_UUID, FIRMWARE_REVISION_UUID, HARDWARE_REVISION_UUID,
    MANUFACTURER_NAME_UUID, MODEL_NUMBER_UUID, SERIAL_NUMBER_UUID,
};

// ----------------------------------------------------------------------------
// Write Handling
// ----------------------------------------------------------------------------

/// Receiver of characteristic writes made by a central
#[async_trait]
pub trait WriteHandler: Send + Sync {
    async fn on_write(&self, characteristic: Uuid, value: Vec<u8>);
}

/// Standard Device Information Service (0x180A)
pub fn device_information_service(identity: &MachineIdentity) -> GattService {
    GattService::new(
        DEVICE_INFORMATION_SERVICE_UUID,
        vec![
            GattCharacteristic::read_only(MANUFACTURER_NAME_UUID, identity.manufacturer.as_bytes()),
            GattCharacteristic::read_only(MODEL_NUMBER_UUID, identity.model.as_bytes()),
            GattCharacteristic::read_only(SERIAL_NUMBER_UUID, identity.serial_number.as_bytes()),
            GattCharacteristic::read_only(
                FIRMWARE_REVISION_UUID,
                identity.firmware_revision.as_bytes(),
            ),
            GattCharacteristic::read_only(
                HARDWARE_REVISION_UUID,
                identity.hardware_revision.as_bytes(),
            ),
        ],
    )
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

/// Service tree published by one profile
pub struct GattSession {
    host: Arc<dyn BleHost>,
    subscriptions: Arc<RwLock<HashSet<Uuid>>>,
    central_connected: Arc<RwLock<bool>>,
    event_task: JoinHandle<()>,
}

impl GattSession {
    /// Publish `services`, start advertising and route host events
    pub async fn open(
        profile: &'static str,
        host: Arc<dyn BleHost>,
        services: Vec<GattService>,
        advertisement: Advertisement,
        handler: Weak<dyn WriteHandler>,
    ) -> BridgeResult<Self> {
        let events = host.publish(services).await?;
        if let Err(e) = host.start_advertising(&advertisement).await {
            if let Err(cleanup) = host.unpublish().await {
                warn!("{} failed to withdraw services: {}", profile, cleanup);
            }
            return Err(e);
        }
        info!("{} advertising as '{}'", profile, advertisement.local_name);

        let subscriptions = Arc::new(RwLock::new(HashSet::new()));
        let central_connected = Arc::new(RwLock::new(false));
        let event_task = tokio::spawn(run_host_events(
            profile,
            Arc::clone(&host),
            events,
            advertisement,
            Arc::clone(&subscriptions),
            Arc::clone(&central_connected),
            handler,
        ));

        Ok(Self {
            host,
            subscriptions,
            central_connected,
            event_task,
        })
    }

    /// Whether a central subscribed to `characteristic`
    pub async fn is_subscribed(&self, characteristic: Uuid) -> bool {
        self.subscriptions.read().await.contains(&characteristic)
    }

    pub async fn is_connected(&self) -> bool {
        *self.central_connected.read().await
    }

    pub async fn notify(&self, characteristic: Uuid, value: &[u8]) -> BridgeResult<()> {
        debug!("notify {} {}", characteristic, hex::encode(value));
        self.host.notify(characteristic, value).await
    }

    /// Stop routing events, disconnect centrals and withdraw the services
    ///
    /// Every step runs even if an earlier one failed.
    pub async fn close(&self, profile: &'static str) {
        self.event_task.abort();
        if let Err(e) = self.host.stop_advertising().await {
            warn!("{} failed to stop advertising: {}", profile, e);
        }
        if let Err(e) = self.host.disconnect_centrals().await {
            warn!("{} failed to disconnect centrals: {}", profile, e);
        }
        if let Err(e) = self.host.unpublish().await {
            warn!("{} failed to withdraw services: {}", profile, e);
        }
        self.subscriptions.write().await.clear();
        *self.central_connected.write().await = false;
    }
}

impl Drop for GattSession {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

async fn run_host_events(
    profile: &'static str,
    host: Arc<dyn BleHost>,
    mut events: HostEventReceiver,
    advertisement: Advertisement,
    subscriptions: Arc<RwLock<HashSet<Uuid>>>,
    central_connected: Arc<RwLock<bool>>,
    handler: Weak<dyn WriteHandler>,
) {
    while let Some(event) = events.recv().await {
        match event {
            HostEvent::CentralConnected { address } => {
                info!("{} central connected: {}", profile, address);
                *central_connected.write().await = true;
            }
            HostEvent::CentralDisconnected { address } => {
                info!("{} central disconnected: {}, advertising again", profile, address);
                *central_connected.write().await = false;
                subscriptions.write().await.clear();
                if let Err(e) = host.start_advertising(&advertisement).await {
                    error!("{} failed to restart advertising: {}", profile, e);
                }
            }
            HostEvent::Subscribed { characteristic } => {
                debug!("{} subscription to {}", profile, characteristic);
                subscriptions.write().await.insert(characteristic);
            }
            HostEvent::Unsubscribed { characteristic } => {
                debug!("{} subscription to {} ended", profile, characteristic);
                subscriptions.write().await.remove(&characteristic);
            }
            HostEvent::Write {
                characteristic,
                value,
            } => match handler.upgrade() {
                Some(handler) => handler.on_write(characteristic, value).await,
                None => break,
            },
        }
    }
    debug!("{} host event stream ended", profile);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::testing::LoopbackBleHost;
    use rowbridge_core::CharacteristicProperties;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    }

    #[async_trait]
    impl WriteHandler for RecordingHandler {
        async fn on_write(&self, characteristic: Uuid, value: Vec<u8>) {
            self.writes.lock().await.push((characteristic, value));
        }
    }

    const CHAR: Uuid = Uuid::from_u128(0x1234);

    async fn open_session(
        host: &Arc<LoopbackBleHost>,
        handler: &Arc<RecordingHandler>,
    ) -> GattSession {
        let handler: Arc<dyn WriteHandler> = handler.clone();
        GattSession::open(
            "test",
            host.clone(),
            vec![GattService::new(
                Uuid::from_u128(0xABCD),
                vec![GattCharacteristic::new(CHAR, CharacteristicProperties::WRITE)],
            )],
            Advertisement {
                local_name: "rower".to_string(),
                ..Default::default()
            },
            Arc::downgrade(&handler),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_failed_advertising_withdraws_services() {
        let host = Arc::new(LoopbackBleHost::without_advertising());
        let handler: Arc<dyn WriteHandler> = Arc::new(RecordingHandler::default());
        let result = GattSession::open(
            "test",
            host.clone(),
            vec![GattService::new(
                Uuid::from_u128(0xABCD),
                vec![GattCharacteristic::new(CHAR, CharacteristicProperties::WRITE)],
            )],
            Advertisement::default(),
            Arc::downgrade(&handler),
        )
        .await;
        assert!(result.is_err());
        assert!(host.published().is_empty());
        assert!(!host.inject(HostEvent::CentralConnected {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
        }));
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_readvertises_after_disconnect() {
        let host = Arc::new(LoopbackBleHost::new());
        let handler = Arc::new(RecordingHandler::default());
        let session = open_session(&host, &handler).await;
        assert_eq!(host.advertise_count(), 1);

        host.inject(HostEvent::CentralConnected {
            address: "AA".to_string(),
        });
        host.inject(HostEvent::Subscribed {
            characteristic: CHAR,
        });
        settle().await;
        assert!(session.is_connected().await);
        assert!(session.is_subscribed(CHAR).await);

        host.inject(HostEvent::CentralDisconnected {
            address: "AA".to_string(),
        });
        settle().await;
        assert_eq!(host.advertise_count(), 2);
        assert!(!session.is_subscribed(CHAR).await);
        assert!(!session.is_connected().await);
    }

    #[tokio::test]
    async fn test_writes_reach_handler() {
        let host = Arc::new(LoopbackBleHost::new());
        let handler = Arc::new(RecordingHandler::default());
        let _session = open_session(&host, &handler).await;

        host.inject(HostEvent::Write {
            characteristic: CHAR,
            value: vec![0x00],
        });
        settle().await;
        assert_eq!(handler.writes.lock().await.clone(), vec![(CHAR, vec![0x00])]);
    }

    #[tokio::test]
    async fn test_close_withdraws_everything() {
        let host = Arc::new(LoopbackBleHost::new());
        let handler = Arc::new(RecordingHandler::default());
        let session = open_session(&host, &handler).await;
        session.close("test").await;
        assert!(host.published().is_empty());
        assert!(host.advertisement().is_none());
        assert_eq!(host.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_device_information_values() {
        let identity = MachineIdentity::default();
        let service = device_information_service(&identity);
        assert_eq!(
            service.characteristic(MANUFACTURER_NAME_UUID).map(|c| c.value.clone()),
            Some(identity.manufacturer.into_bytes())
        );
    }
}
