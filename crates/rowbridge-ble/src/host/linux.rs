//! BlueZ host using bluer for the GATT server and advertising

use async_trait::async_trait;
use bluer::adv::{Advertisement as BluezAdvertisement, AdvertisementHandle, Type};
use bluer::gatt::local::{
    Application, ApplicationHandle, Characteristic, CharacteristicNotifier, CharacteristicNotify,
    CharacteristicNotifyMethod, CharacteristicRead, CharacteristicWrite,
    CharacteristicWriteMethod, Service,
};
use bluer::{AdapterEvent, Address, DeviceEvent, DeviceProperty};
use futures::{FutureExt, StreamExt};
use rowbridge_core::{
    Advertisement, BleHost, BridgeResult, GattCharacteristic, GattService, HostEvent,
    HostEventReceiver, SensorReceiver, TransportError,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::central::{SensorCentral, SensorPeer};
use crate::error::BleProfileError;

type Notifiers = Arc<Mutex<HashMap<Uuid, CharacteristicNotifier>>>;

/// Application registered with BlueZ plus the task following central connections
struct Publication {
    _application: ApplicationHandle,
    characteristics: HashSet<Uuid>,
    events: mpsc::UnboundedSender<HostEvent>,
    connection_watch: JoinHandle<()>,
}

// ----------------------------------------------------------------------------
// BlueZ Host
// ----------------------------------------------------------------------------

/// Shared BLE host on Linux
pub struct BluezHost {
    _session: bluer::Session,
    adapter: bluer::Adapter,
    central: Option<SensorCentral>,
    sensor_peer: SensorPeer,
    publication: Mutex<Option<Publication>>,
    advertisement: Mutex<Option<AdvertisementHandle>>,
    notifiers: Notifiers,
    connected: Arc<Mutex<HashSet<Address>>>,
}

impl BluezHost {
    /// Open the default adapter and power it on
    pub async fn open() -> Result<Self, BleProfileError> {
        let session = bluer::Session::new()
            .await
            .map_err(|e| BleProfileError::PublishFailed(format!("BlueZ session: {}", e)))?;
        let adapter = session
            .default_adapter()
            .await
            .map_err(|_| BleProfileError::AdapterNotAvailable)?;
        if !adapter.is_powered().await.unwrap_or(false) {
            adapter
                .set_powered(true)
                .await
                .map_err(|e| BleProfileError::PublishFailed(format!("power on adapter: {}", e)))?;
        }

        let central = match SensorCentral::new().await {
            Ok(central) => Some(central),
            Err(e) => {
                warn!("BLE central role unavailable: {}", e);
                None
            }
        };

        let sensor_peer = central.as_ref().map(SensorCentral::peer).unwrap_or_default();

        info!("BlueZ adapter {} initialized", adapter.name());
        Ok(Self {
            _session: session,
            adapter,
            central,
            sensor_peer,
            publication: Mutex::new(None),
            advertisement: Mutex::new(None),
            notifiers: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    fn characteristic(
        &self,
        definition: &GattCharacteristic,
        events: &mpsc::UnboundedSender<HostEvent>,
    ) -> Characteristic {
        let uuid = definition.uuid;
        let properties = definition.properties;

        let read = properties.read.then(|| {
            let value = definition.value.clone();
            CharacteristicRead {
                read: true,
                fun: Box::new(move |_request| {
                    let value = value.clone();
                    async move { Ok(value) }.boxed()
                }),
                ..Default::default()
            }
        });

        let write = (properties.write || properties.write_without_response).then(|| {
            let events = events.clone();
            CharacteristicWrite {
                write: properties.write,
                write_without_response: properties.write_without_response,
                method: CharacteristicWriteMethod::Fun(Box::new(move |value, _request| {
                    let events = events.clone();
                    async move {
                        let _ = events.send(HostEvent::Write {
                            characteristic: uuid,
                            value,
                        });
                        Ok(())
                    }
                    .boxed()
                })),
                ..Default::default()
            }
        });

        let notify = (properties.notify || properties.indicate).then(|| {
            let events = events.clone();
            let notifiers = Arc::clone(&self.notifiers);
            CharacteristicNotify {
                notify: properties.notify,
                indicate: properties.indicate,
                method: CharacteristicNotifyMethod::Fun(Box::new(move |notifier| {
                    let events = events.clone();
                    let notifiers = Arc::clone(&notifiers);
                    async move {
                        notifiers.lock().await.insert(uuid, notifier);
                        let _ = events.send(HostEvent::Subscribed {
                            characteristic: uuid,
                        });
                    }
                    .boxed()
                })),
                ..Default::default()
            }
        });

        Characteristic {
            uuid,
            read,
            write,
            notify,
            ..Default::default()
        }
    }

    /// Follow connection state of every device the adapter sees, except the sensor
    fn watch_connections(&self, events: mpsc::UnboundedSender<HostEvent>) -> JoinHandle<()> {
        let adapter = self.adapter.clone();
        let connected = Arc::clone(&self.connected);
        let sensor_peer = self.sensor_peer.clone();
        tokio::spawn(async move {
            let mut adapter_events = match adapter.events().await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("Cannot follow BLE connections: {}", e);
                    return;
                }
            };
            let mut device_tasks = Vec::new();
            while let Some(event) = adapter_events.next().await {
                let AdapterEvent::DeviceAdded(address) = event else {
                    continue;
                };
                let Ok(device) = adapter.device(address) else {
                    continue;
                };
                let events = events.clone();
                let connected = Arc::clone(&connected);
                let sensor_peer = sensor_peer.clone();
                device_tasks.push(tokio::spawn(async move {
                    let Ok(mut device_events) = device.events().await else {
                        return;
                    };
                    while let Some(DeviceEvent::PropertyChanged(property)) =
                        device_events.next().await
                    {
                        let DeviceProperty::Connected(is_connected) = property else {
                            continue;
                        };
                        if sensor_peer.is_peer(&address.to_string()).await {
                            debug!("Ignoring sensor link change of {}", address);
                            continue;
                        }
                        let event = if is_connected {
                            connected.lock().await.insert(address);
                            HostEvent::CentralConnected {
                                address: address.to_string(),
                            }
                        } else {
                            connected.lock().await.remove(&address);
                            HostEvent::CentralDisconnected {
                                address: address.to_string(),
                            }
                        };
                        if events.send(event).is_err() {
                            return;
                        }
                    }
                }));
                device_tasks.retain(|task: &JoinHandle<()>| !task.is_finished());
            }
            for task in device_tasks {
                task.abort();
            }
        })
    }

    fn central(&self) -> Result<&SensorCentral, BleProfileError> {
        self.central.as_ref().ok_or(BleProfileError::AdapterNotAvailable)
    }
}

fn bluez_advertisement(advertisement: &Advertisement) -> BluezAdvertisement {
    // BlueZ moves what does not fit the advertising packet into the scan response
    let service_uuids: BTreeSet<Uuid> = advertisement
        .service_uuids
        .iter()
        .chain(advertisement.scan_response_uuids.iter())
        .copied()
        .collect();
    let service_data: BTreeMap<Uuid, Vec<u8>> =
        advertisement.service_data.iter().cloned().collect();
    BluezAdvertisement {
        advertisement_type: Type::Peripheral,
        service_uuids,
        service_data,
        local_name: Some(advertisement.local_name.clone()),
        discoverable: Some(true),
        ..Default::default()
    }
}

#[async_trait]
impl BleHost for BluezHost {
    async fn publish(&self, services: Vec<GattService>) -> BridgeResult<HostEventReceiver> {
        let mut publication = self.publication.lock().await;
        if publication.is_some() {
            return Err(TransportError::Busy {
                reason: "GATT application already published".to_string(),
            }
            .into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let characteristics = services
            .iter()
            .flat_map(|service| service.characteristics.iter().map(|c| c.uuid))
            .collect();
        let application = Application {
            services: services
                .iter()
                .map(|service| Service {
                    uuid: service.uuid,
                    primary: true,
                    characteristics: service
                        .characteristics
                        .iter()
                        .map(|definition| self.characteristic(definition, &tx))
                        .collect(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let handle = self
            .adapter
            .serve_gatt_application(application)
            .await
            .map_err(|e| BleProfileError::PublishFailed(e.to_string()))?;
        debug!("GATT application registered with {} services", services.len());

        *publication = Some(Publication {
            _application: handle,
            characteristics,
            connection_watch: self.watch_connections(tx.clone()),
            events: tx,
        });
        Ok(rx)
    }

    async fn unpublish(&self) -> BridgeResult<()> {
        if let Some(publication) = self.publication.lock().await.take() {
            publication.connection_watch.abort();
        }
        self.notifiers.lock().await.clear();
        Ok(())
    }

    async fn start_advertising(&self, advertisement: &Advertisement) -> BridgeResult<()> {
        let handle = self
            .adapter
            .advertise(bluez_advertisement(advertisement))
            .await
            .map_err(|e| BleProfileError::AdvertisingFailed(e.to_string()))?;
        // replacing the handle withdraws the previous advertisement
        *self.advertisement.lock().await = Some(handle);
        Ok(())
    }

    async fn stop_advertising(&self) -> BridgeResult<()> {
        self.advertisement.lock().await.take();
        Ok(())
    }

    async fn notify(&self, characteristic: Uuid, value: &[u8]) -> BridgeResult<()> {
        let events = {
            let publication = self.publication.lock().await;
            match publication.as_ref() {
                Some(p) if p.characteristics.contains(&characteristic) => p.events.clone(),
                _ => {
                    return Err(TransportError::UnknownCharacteristic {
                        uuid: characteristic,
                    }
                    .into())
                }
            }
        };

        let mut notifiers = self.notifiers.lock().await;
        let Some(notifier) = notifiers.get_mut(&characteristic) else {
            return Ok(());
        };
        if notifier.is_stopped() {
            notifiers.remove(&characteristic);
            let _ = events.send(HostEvent::Unsubscribed { characteristic });
            return Ok(());
        }
        notifier.notify(value.to_vec()).await.map_err(|e| {
            TransportError::WriteFailed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn disconnect_centrals(&self) -> BridgeResult<()> {
        let addresses: Vec<Address> = self.connected.lock().await.drain().collect();
        for address in addresses {
            if self.sensor_peer.is_peer(&address.to_string()).await {
                continue;
            }
            match self.adapter.device(address) {
                Ok(device) => {
                    if let Err(e) = device.disconnect().await {
                        warn!("Failed to disconnect central {}: {}", address, e);
                    }
                }
                Err(e) => debug!("Central {} vanished: {}", address, e),
            }
        }
        Ok(())
    }

    async fn connect_sensor(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> BridgeResult<SensorReceiver> {
        self.central()?.connect(service, characteristics).await
    }

    async fn disconnect_sensor(&self) -> BridgeResult<()> {
        match self.central.as_ref() {
            Some(central) => central.disconnect().await,
            None => Ok(()),
        }
    }

    async fn close(&self) -> BridgeResult<()> {
        self.stop_advertising().await?;
        self.disconnect_centrals().await?;
        self.unpublish().await?;
        self.disconnect_sensor().await?;
        info!("BlueZ host closed");
        Ok(())
    }
}
