//! Central role for heart-rate straps using btleplug

use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Manager as _, Peripheral as _, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use rowbridge_core::{BridgeResult, SensorNotification, SensorReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::BleProfileError;

/// How long a scan waits for a matching sensor
pub const SENSOR_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Address of the last sensor the central connected to
///
/// The address stays recorded after the sensor disconnects so that its late connection
/// events are still recognized.
#[derive(Debug, Clone, Default)]
pub struct SensorPeer(Arc<RwLock<Option<String>>>);

impl SensorPeer {
    async fn set(&self, address: String) {
        *self.0.write().await = Some(address);
    }

    /// Whether `address` is the sensor, in any letter case
    pub async fn is_peer(&self, address: &str) -> bool {
        self.0
            .read()
            .await
            .as_deref()
            .is_some_and(|peer| peer.eq_ignore_ascii_case(address))
    }
}

struct ConnectedSensor {
    peripheral: Peripheral,
    forwarder: JoinHandle<()>,
}

/// btleplug adapter connecting to one sensor at a time
pub struct SensorCentral {
    adapter: Adapter,
    scan_timeout: Duration,
    connected: Mutex<Option<ConnectedSensor>>,
    peer: SensorPeer,
}

impl SensorCentral {
    /// Use the first adapter of the system
    pub async fn new() -> Result<Self, BleProfileError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleProfileError::ConnectionFailed(format!("BLE manager: {}", e)))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| BleProfileError::ConnectionFailed(format!("BLE adapters: {}", e)))?
            .into_iter()
            .next()
            .ok_or(BleProfileError::AdapterNotAvailable)?;
        info!("BLE central adapter initialized");
        Ok(Self {
            adapter,
            scan_timeout: SENSOR_SCAN_TIMEOUT,
            connected: Mutex::new(None),
            peer: SensorPeer::default(),
        })
    }

    pub fn with_scan_timeout(mut self, scan_timeout: Duration) -> Self {
        self.scan_timeout = scan_timeout;
        self
    }

    /// Handle on the sensor address, for a GATT server sharing the adapter
    pub fn peer(&self) -> SensorPeer {
        self.peer.clone()
    }

    async fn advertises(&self, peripheral: &Peripheral, service: Uuid) -> bool {
        match peripheral.properties().await {
            Ok(Some(properties)) => properties.services.contains(&service),
            _ => false,
        }
    }

    async fn scan_for(&self, service: Uuid) -> Result<Peripheral, BleProfileError> {
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| BleProfileError::ConnectionFailed(e.to_string()))?;
        self.adapter
            .start_scan(ScanFilter {
                services: vec![service],
            })
            .await
            .map_err(|e| BleProfileError::ConnectionFailed(format!("start scan: {}", e)))?;

        let search = async {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDiscovered(id) = event {
                    if let Ok(peripheral) = self.adapter.peripheral(&id).await {
                        if self.advertises(&peripheral, service).await {
                            return Some(peripheral);
                        }
                    }
                }
            }
            None
        };
        let found = timeout(self.scan_timeout, search).await;

        if let Err(e) = self.adapter.stop_scan().await {
            debug!("Failed to stop BLE scan: {}", e);
        }

        match found {
            Ok(Some(peripheral)) => Ok(peripheral),
            _ => Err(BleProfileError::SensorNotFound {
                service,
                timeout_ms: self.scan_timeout.as_millis() as u64,
            }),
        }
    }

    /// Connect to the first sensor advertising `service`
    ///
    /// Readable characteristics are read once and delivered first, then notifications of
    /// every notifying characteristic follow.
    pub async fn connect(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> BridgeResult<SensorReceiver> {
        self.disconnect().await?;

        let peripheral = self.scan_for(service).await?;
        // recorded before connecting, the adapter reports the link as soon as it is up
        self.peer.set(peripheral.address().to_string()).await;
        peripheral
            .connect()
            .await
            .map_err(|e| BleProfileError::ConnectionFailed(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| BleProfileError::ConnectionFailed(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        for characteristic in peripheral.characteristics() {
            if !characteristics.contains(&characteristic.uuid) {
                continue;
            }
            if characteristic.properties.contains(CharPropFlags::READ) {
                match peripheral.read(&characteristic).await {
                    Ok(value) => {
                        let _ = tx.send(SensorNotification {
                            characteristic: characteristic.uuid,
                            value,
                        });
                    }
                    Err(e) => debug!("Failed to read {}: {}", characteristic.uuid, e),
                }
            }
            if characteristic.properties.contains(CharPropFlags::NOTIFY) {
                peripheral
                    .subscribe(&characteristic)
                    .await
                    .map_err(|e| BleProfileError::SubscriptionFailed(e.to_string()))?;
            }
        }

        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| BleProfileError::SubscriptionFailed(e.to_string()))?;
        let forwarder = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let forwarded = tx.send(SensorNotification {
                    characteristic: notification.uuid,
                    value: notification.value,
                });
                if forwarded.is_err() {
                    break;
                }
            }
            debug!("Sensor notification stream ended");
        });

        info!("Connected to sensor {}", peripheral.address());
        *self.connected.lock().await = Some(ConnectedSensor {
            peripheral,
            forwarder,
        });
        Ok(rx)
    }

    pub async fn disconnect(&self) -> BridgeResult<()> {
        if let Some(sensor) = self.connected.lock().await.take() {
            sensor.forwarder.abort();
            if let Err(e) = sensor.peripheral.disconnect().await {
                warn!("Failed to disconnect sensor: {}", e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sensor_peer_matches_recorded_address() {
        let peer = SensorPeer::default();
        assert!(!peer.is_peer("C4:7C:8D:6A:12:34").await);

        peer.set("C4:7C:8D:6A:12:34".to_string()).await;
        assert!(peer.is_peer("c4:7c:8d:6a:12:34").await);
        assert!(!peer.is_peer("C4:7C:8D:6A:12:35").await);
    }

    #[tokio::test]
    async fn test_sensor_peer_is_shared_between_clones() {
        let peer = SensorPeer::default();
        let server_side = peer.clone();
        peer.set("00:11:22:33:44:55".to_string()).await;
        assert!(server_side.is_peer("00:11:22:33:44:55").await);
    }
}
