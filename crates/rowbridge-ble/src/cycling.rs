//! Cycling Power and Cycling Speed and Cadence profiles
//!
//! Bike head units expect updates at a slow steady rate. A snapshot is only accepted when
//! the minimum update interval elapsed since the last accepted one or when it carries a
//! session stop, pause start or recovery start edge. Accepted snapshots are notified at
//! once and repeated by the broadcast timer.

use async_trait::async_trait;
use rowbridge_core::{
    Advertisement, BleHost, BridgeResult, BroadcastTimer, CharacteristicProperties,
    DeviceProfile, GattCharacteristic, GattService, MetricsSnapshot, PeripheralConfig,
};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::cycling::{
    csc_feature, csc_measurement, cycling_power_control_response, cycling_power_feature,
    cycling_power_measurement, sc_control_response, SENSOR_LOCATION_OTHER,
};
use crate::gatt::{device_information_service, GattSession, WriteHandler};
use crate::protocol::{
    CSC_FEATURE_UUID, CSC_MEASUREMENT_UUID, CYCLING_POWER_CONTROL_POINT_UUID,
    CYCLING_POWER_FEATURE_UUID, CYCLING_POWER_MEASUREMENT_UUID, CYCLING_POWER_SERVICE_UUID,
    CYCLING_SPEED_CADENCE_SERVICE_UUID, SC_CONTROL_POINT_UUID, SENSOR_LOCATION_UUID,
};

/// Which cycling profile the peripheral presents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclingKind {
    Power,
    SpeedCadence,
}

impl CyclingKind {
    fn profile_name(self) -> &'static str {
        match self {
            Self::Power => "CPS",
            Self::SpeedCadence => "CSC",
        }
    }

    fn service_uuid(self) -> Uuid {
        match self {
            Self::Power => CYCLING_POWER_SERVICE_UUID,
            Self::SpeedCadence => CYCLING_SPEED_CADENCE_SERVICE_UUID,
        }
    }

    fn measurement_uuid(self) -> Uuid {
        match self {
            Self::Power => CYCLING_POWER_MEASUREMENT_UUID,
            Self::SpeedCadence => CSC_MEASUREMENT_UUID,
        }
    }

    fn control_point_uuid(self) -> Uuid {
        match self {
            Self::Power => CYCLING_POWER_CONTROL_POINT_UUID,
            Self::SpeedCadence => SC_CONTROL_POINT_UUID,
        }
    }

    fn measurement(self, snapshot: &MetricsSnapshot) -> Vec<u8> {
        match self {
            Self::Power => cycling_power_measurement(snapshot),
            Self::SpeedCadence => csc_measurement(snapshot),
        }
    }
}

// ----------------------------------------------------------------------------
// Cycling Peripheral
// ----------------------------------------------------------------------------

/// Rower presented as a power meter or a speed and cadence sensor
pub struct CyclingPeripheral {
    inner: Arc<CyclingInner>,
}

struct CyclingInner {
    kind: CyclingKind,
    host: Arc<dyn BleHost>,
    config: PeripheralConfig,
    session: RwLock<Option<GattSession>>,
    timer: Mutex<Option<BroadcastTimer>>,
    accepted: RwLock<Option<MetricsSnapshot>>,
}

impl CyclingPeripheral {
    pub fn power(host: Arc<dyn BleHost>, config: &PeripheralConfig) -> Self {
        Self::new(CyclingKind::Power, host, config)
    }

    pub fn speed_cadence(host: Arc<dyn BleHost>, config: &PeripheralConfig) -> Self {
        Self::new(CyclingKind::SpeedCadence, host, config)
    }

    fn new(kind: CyclingKind, host: Arc<dyn BleHost>, config: &PeripheralConfig) -> Self {
        Self {
            inner: Arc::new(CyclingInner {
                kind,
                host,
                config: config.clone(),
                session: RwLock::new(None),
                timer: Mutex::new(None),
                accepted: RwLock::new(None),
            }),
        }
    }

    pub fn kind(&self) -> CyclingKind {
        self.inner.kind
    }

    /// Last snapshot that passed the throttle
    pub async fn current_snapshot(&self) -> Option<MetricsSnapshot> {
        self.inner.accepted.read().await.clone()
    }
}

impl CyclingInner {
    fn services(&self) -> Vec<GattService> {
        let kind = self.kind;
        let feature = match kind {
            CyclingKind::Power => {
                GattCharacteristic::read_only(CYCLING_POWER_FEATURE_UUID, cycling_power_feature())
            }
            CyclingKind::SpeedCadence => {
                GattCharacteristic::read_only(CSC_FEATURE_UUID, csc_feature())
            }
        };
        vec![
            GattService::new(
                kind.service_uuid(),
                vec![
                    GattCharacteristic::new(kind.measurement_uuid(), CharacteristicProperties::NOTIFY),
                    feature,
                    GattCharacteristic::read_only(SENSOR_LOCATION_UUID, vec![SENSOR_LOCATION_OTHER]),
                    GattCharacteristic::new(
                        kind.control_point_uuid(),
                        CharacteristicProperties::WRITE_INDICATE,
                    ),
                ],
            ),
            device_information_service(&self.config.identity),
        ]
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            local_name: self.config.identity.name.clone(),
            service_uuids: vec![self.kind.service_uuid()],
            ..Default::default()
        }
    }

    fn should_accept(&self, previous: Option<&MetricsSnapshot>, snapshot: &MetricsSnapshot) -> bool {
        let Some(previous) = previous else {
            return true;
        };
        let context = &snapshot.metrics_context;
        context.is_session_stop
            || context.is_pause_start
            || context.is_recovery_start
            || snapshot.timestamp.saturating_sub(previous.timestamp)
                >= self.config.timing.cycling_minimum_update()
    }

    async fn notify(&self, characteristic: Uuid, value: &[u8]) {
        if let Some(session) = self.session.read().await.as_ref() {
            if let Err(e) = session.notify(characteristic, value).await {
                debug!("{} notification dropped: {}", self.kind.profile_name(), e);
            }
        }
    }

    async fn broadcast(&self) {
        let frame = match self.accepted.read().await.as_ref() {
            Some(snapshot) => self.kind.measurement(snapshot),
            None => return,
        };
        self.notify(self.kind.measurement_uuid(), &frame).await;
    }
}

#[async_trait]
impl WriteHandler for CyclingInner {
    async fn on_write(&self, characteristic: Uuid, value: Vec<u8>) {
        if characteristic != self.kind.control_point_uuid() {
            return;
        }
        let op_code = value.first().copied().unwrap_or_default();
        info!(
            "{} control point op 0x{:02x} not supported",
            self.kind.profile_name(),
            op_code
        );
        let response = match self.kind {
            CyclingKind::Power => cycling_power_control_response(op_code),
            CyclingKind::SpeedCadence => sc_control_response(op_code),
        };
        self.notify(characteristic, &response).await;
    }
}

#[async_trait]
impl DeviceProfile for CyclingPeripheral {
    fn name(&self) -> &'static str {
        self.inner.kind.profile_name()
    }

    async fn attach(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        let handler: Arc<dyn WriteHandler> = Arc::clone(inner) as Arc<dyn WriteHandler>;
        let session = GattSession::open(
            inner.kind.profile_name(),
            Arc::clone(&inner.host),
            inner.services(),
            inner.advertisement(),
            Arc::downgrade(&handler),
        )
        .await?;
        *inner.session.write().await = Some(session);

        let weak = Arc::downgrade(inner);
        let timer = BroadcastTimer::spawn(inner.config.timing.cycling_broadcast_interval(), move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.broadcast().await;
                }
            }
        });
        *inner.timer.lock().await = Some(timer);
        Ok(())
    }

    async fn destroy(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        if let Some(timer) = inner.timer.lock().await.take() {
            timer.cancel();
        }
        if let Some(session) = inner.session.write().await.take() {
            session.close(inner.kind.profile_name()).await;
        }
        info!("{} peripheral destroyed", inner.kind.profile_name());
        Ok(())
    }

    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        let inner = &self.inner;
        {
            let mut accepted = inner.accepted.write().await;
            if !inner.should_accept(accepted.as_ref(), snapshot) {
                return Ok(());
            }
            *accepted = Some(snapshot.clone());
        }
        inner.broadcast().await;
        if let Some(timer) = inner.timer.lock().await.as_ref() {
            timer.rearm();
        }
        Ok(())
    }
}
