//! Fitness Machine Service profile for the rower and the indoor bike
//!
//! The latest snapshot is stored on every update and notified verbatim by the broadcast
//! timer. Centrals drive the session through the control point once they requested control.

use async_trait::async_trait;
use rowbridge_core::{
    emit_control, Advertisement, BikeSimulationParameters, BleHost, BridgeResult,
    BroadcastTimer, CharacteristicProperties, ControlCommand, DeviceProfile, EventSender,
    GattCharacteristic, GattService, MetricsSnapshot, PeripheralConfig, PeripheralStatus,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::codec::ftms::{
    advertising_service_data, control_point_response, indoor_bike_data, machine_status,
    rower_data, INDOOR_BIKE_FEATURES, ROWER_FEATURES,
};
use crate::gatt::{device_information_service, GattSession, WriteHandler};
use crate::protocol::{
    ftms_op, FitnessMachineType, ResultCode, FITNESS_MACHINE_CONTROL_POINT_UUID,
    FITNESS_MACHINE_FEATURE_UUID, FITNESS_MACHINE_SERVICE_UUID, FITNESS_MACHINE_STATUS_UUID,
    INDOOR_BIKE_DATA_UUID, ROWER_DATA_UUID,
};

// ----------------------------------------------------------------------------
// FTMS Peripheral
// ----------------------------------------------------------------------------

/// FTMS rower or indoor bike
pub struct FtmsPeripheral {
    inner: Arc<FtmsInner>,
}

struct FtmsInner {
    machine: FitnessMachineType,
    host: Arc<dyn BleHost>,
    config: PeripheralConfig,
    events: EventSender,
    session: RwLock<Option<GattSession>>,
    timer: Mutex<Option<BroadcastTimer>>,
    latest: RwLock<MetricsSnapshot>,
    control_acquired: AtomicBool,
}

impl FtmsPeripheral {
    pub fn rower(host: Arc<dyn BleHost>, config: &PeripheralConfig, events: EventSender) -> Self {
        Self::new(FitnessMachineType::Rower, host, config, events)
    }

    pub fn indoor_bike(
        host: Arc<dyn BleHost>,
        config: &PeripheralConfig,
        events: EventSender,
    ) -> Self {
        Self::new(FitnessMachineType::IndoorBike, host, config, events)
    }

    fn new(
        machine: FitnessMachineType,
        host: Arc<dyn BleHost>,
        config: &PeripheralConfig,
        events: EventSender,
    ) -> Self {
        Self {
            inner: Arc::new(FtmsInner {
                machine,
                host,
                config: config.clone(),
                events,
                session: RwLock::new(None),
                timer: Mutex::new(None),
                latest: RwLock::new(MetricsSnapshot::default()),
                control_acquired: AtomicBool::new(false),
            }),
        }
    }

    pub fn machine_type(&self) -> FitnessMachineType {
        self.inner.machine
    }

    /// Whether a central currently holds control
    pub fn has_control(&self) -> bool {
        self.inner.control_acquired.load(Ordering::SeqCst)
    }
}

impl FtmsInner {
    fn profile_name(&self) -> &'static str {
        match self.machine {
            FitnessMachineType::Rower => "FTMS",
            FitnessMachineType::IndoorBike => "FTMSBIKE",
        }
    }

    fn data_characteristic(&self) -> Uuid {
        match self.machine {
            FitnessMachineType::Rower => ROWER_DATA_UUID,
            FitnessMachineType::IndoorBike => INDOOR_BIKE_DATA_UUID,
        }
    }

    fn broadcast_interval(&self) -> Duration {
        match self.machine {
            FitnessMachineType::Rower => self.config.timing.ftms_rower_interval(),
            FitnessMachineType::IndoorBike => self.config.timing.ftms_bike_interval(),
        }
    }

    fn services(&self) -> Vec<GattService> {
        let features = match self.machine {
            FitnessMachineType::Rower => ROWER_FEATURES,
            FitnessMachineType::IndoorBike => INDOOR_BIKE_FEATURES,
        };
        vec![
            GattService::new(
                FITNESS_MACHINE_SERVICE_UUID,
                vec![
                    GattCharacteristic::read_only(FITNESS_MACHINE_FEATURE_UUID, features),
                    GattCharacteristic::new(
                        self.data_characteristic(),
                        CharacteristicProperties::NOTIFY,
                    ),
                    GattCharacteristic::new(
                        FITNESS_MACHINE_CONTROL_POINT_UUID,
                        CharacteristicProperties::WRITE_INDICATE,
                    ),
                    GattCharacteristic::new(
                        FITNESS_MACHINE_STATUS_UUID,
                        CharacteristicProperties::NOTIFY,
                    ),
                ],
            ),
            device_information_service(&self.config.identity),
        ]
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            local_name: self.config.identity.name.clone(),
            service_uuids: vec![FITNESS_MACHINE_SERVICE_UUID],
            scan_response_uuids: Vec::new(),
            service_data: vec![(
                FITNESS_MACHINE_SERVICE_UUID,
                advertising_service_data(self.machine),
            )],
        }
    }

    async fn notify(&self, characteristic: Uuid, value: &[u8]) {
        if let Some(session) = self.session.read().await.as_ref() {
            if let Err(e) = session.notify(characteristic, value).await {
                debug!("{} notification dropped: {}", self.profile_name(), e);
            }
        }
    }

    /// Notify the stored snapshot
    async fn broadcast(&self) {
        let frame = {
            let latest = self.latest.read().await;
            match self.machine {
                FitnessMachineType::Rower => rower_data(&latest),
                FitnessMachineType::IndoorBike => indoor_bike_data(&latest),
            }
        };
        self.notify(self.data_characteristic(), &frame).await;
    }

    fn handle_control_point(&self, value: &[u8]) -> (u8, ResultCode) {
        let Some(&op_code) = value.first() else {
            return (0, ResultCode::InvalidParameter);
        };

        let gated = matches!(
            op_code,
            ftms_op::RESET
                | ftms_op::START_OR_RESUME
                | ftms_op::STOP_OR_PAUSE
                | ftms_op::SET_INDOOR_BIKE_SIMULATION
        );
        if gated && !self.control_acquired.load(Ordering::SeqCst) {
            info!(
                "{} control point op 0x{:02x} refused, control not requested",
                self.profile_name(),
                op_code
            );
            return (op_code, ResultCode::ControlNotPermitted);
        }

        let result = match op_code {
            ftms_op::REQUEST_CONTROL => {
                if self.control_acquired.swap(true, Ordering::SeqCst) {
                    ResultCode::ControlNotPermitted
                } else {
                    emit_control(&self.events, ControlCommand::RequestControl);
                    ResultCode::Success
                }
            }
            ftms_op::RESET => {
                self.control_acquired.store(false, Ordering::SeqCst);
                emit_control(&self.events, ControlCommand::Reset);
                ResultCode::Success
            }
            ftms_op::START_OR_RESUME => {
                emit_control(&self.events, ControlCommand::StartOrResume);
                ResultCode::Success
            }
            ftms_op::STOP_OR_PAUSE => match value.get(1) {
                Some(0x01) => {
                    emit_control(&self.events, ControlCommand::Stop);
                    ResultCode::Success
                }
                Some(0x02) => {
                    emit_control(&self.events, ControlCommand::Pause);
                    ResultCode::Success
                }
                _ => ResultCode::InvalidParameter,
            },
            ftms_op::SET_INDOOR_BIKE_SIMULATION => match self.machine {
                FitnessMachineType::Rower => ResultCode::OpCodeNotSupported,
                FitnessMachineType::IndoorBike => match parse_bike_simulation(&value[1..]) {
                    Some(parameters) => {
                        emit_control(
                            &self.events,
                            ControlCommand::SetIndoorBikeSimulationParameters(parameters),
                        );
                        ResultCode::Success
                    }
                    None => ResultCode::InvalidParameter,
                },
            },
            other => {
                info!(
                    "{} control point op 0x{:02x} not supported",
                    self.profile_name(),
                    other
                );
                ResultCode::OpCodeNotSupported
            }
        };
        (op_code, result)
    }
}

/// Wind speed 0.001 m/s, grade 0.01 %, rolling resistance 0.0001, wind resistance 0.01 kg/m
fn parse_bike_simulation(parameters: &[u8]) -> Option<BikeSimulationParameters> {
    match parameters {
        [w0, w1, g0, g1, crr, cw, ..] => Some(BikeSimulationParameters {
            windspeed: f64::from(i16::from_le_bytes([*w0, *w1])) * 0.001,
            grade: f64::from(i16::from_le_bytes([*g0, *g1])) * 0.01,
            coefficient_rr: f64::from(*crr) * 0.0001,
            coefficient_wr: f64::from(*cw) * 0.01,
        }),
        _ => None,
    }
}

#[async_trait]
impl WriteHandler for FtmsInner {
    async fn on_write(&self, characteristic: Uuid, value: Vec<u8>) {
        if characteristic != FITNESS_MACHINE_CONTROL_POINT_UUID {
            warn!(
                "{} ignoring write to {}",
                self.profile_name(),
                characteristic
            );
            return;
        }
        let (op_code, result) = self.handle_control_point(&value);
        let response = control_point_response(op_code, result);
        self.notify(FITNESS_MACHINE_CONTROL_POINT_UUID, &response).await;
    }
}

#[async_trait]
impl DeviceProfile for FtmsPeripheral {
    fn name(&self) -> &'static str {
        self.inner.profile_name()
    }

    async fn attach(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        let handler: Arc<dyn WriteHandler> = Arc::clone(inner) as Arc<dyn WriteHandler>;
        let session = GattSession::open(
            inner.profile_name(),
            Arc::clone(&inner.host),
            inner.services(),
            inner.advertisement(),
            Arc::downgrade(&handler),
        )
        .await?;
        *inner.session.write().await = Some(session);

        let weak = Arc::downgrade(inner);
        let timer = BroadcastTimer::spawn(inner.broadcast_interval(), move || {
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
            session.close(inner.profile_name()).await;
        }
        inner.control_acquired.store(false, Ordering::SeqCst);
        info!("{} peripheral destroyed", inner.profile_name());
        Ok(())
    }

    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        *self.inner.latest.write().await = snapshot.clone();
        Ok(())
    }

    async fn notify_status(&self, status: PeripheralStatus) -> BridgeResult<()> {
        self.inner
            .notify(FITNESS_MACHINE_STATUS_UUID, &machine_status(status))
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::testing::LoopbackBleHost;
    use rowbridge_core::{event_channel, EventReceiver, HostEvent, PeripheralEvent};

    async fn attached(
        machine: FitnessMachineType,
    ) -> (FtmsPeripheral, Arc<LoopbackBleHost>, EventReceiver) {
        let host = Arc::new(LoopbackBleHost::new());
        let (tx, rx) = event_channel();
        let config = PeripheralConfig::default();
        let profile = match machine {
            FitnessMachineType::Rower => FtmsPeripheral::rower(host.clone(), &config, tx),
            FitnessMachineType::IndoorBike => {
                FtmsPeripheral::indoor_bike(host.clone(), &config, tx)
            }
        };
        profile.attach().await.unwrap();
        (profile, host, rx)
    }

    async fn write_control_point(host: &LoopbackBleHost, value: Vec<u8>) {
        host.inject(HostEvent::Write {
            characteristic: FITNESS_MACHINE_CONTROL_POINT_UUID,
            value,
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_timer_notifies_latest_snapshot() {
        let (profile, host, _rx) = attached(FitnessMachineType::Rower).await;
        let snapshot = MetricsSnapshot {
            cycle_power: 150.0,
            ..Default::default()
        };
        profile.notify_data(&snapshot).await.unwrap();
        assert!(host.notifications_for(ROWER_DATA_UUID).is_empty());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let frames = host.notifications_for(ROWER_DATA_UUID);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], rower_data(&snapshot));
    }

    #[tokio::test]
    async fn test_control_requires_request() {
        let (profile, host, mut rx) = attached(FitnessMachineType::Rower).await;

        write_control_point(&host, vec![ftms_op::START_OR_RESUME]).await;
        assert_eq!(
            host.notifications_for(FITNESS_MACHINE_CONTROL_POINT_UUID),
            vec![vec![0x80, 0x07, 0x05]]
        );
        assert!(rx.try_recv().is_err());

        write_control_point(&host, vec![ftms_op::REQUEST_CONTROL]).await;
        write_control_point(&host, vec![ftms_op::START_OR_RESUME]).await;
        write_control_point(&host, vec![ftms_op::STOP_OR_PAUSE, 0x02]).await;
        assert!(profile.has_control());
        assert_eq!(
            rx.try_recv().unwrap(),
            PeripheralEvent::Control(ControlCommand::RequestControl)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PeripheralEvent::Control(ControlCommand::StartOrResume)
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            PeripheralEvent::Control(ControlCommand::Pause)
        );

        write_control_point(&host, vec![ftms_op::RESET]).await;
        assert!(!profile.has_control());
    }

    #[tokio::test]
    async fn test_unknown_op_code_not_supported() {
        let (_profile, host, _rx) = attached(FitnessMachineType::Rower).await;
        write_control_point(&host, vec![0x05, 0x10]).await;
        assert_eq!(
            host.notifications_for(FITNESS_MACHINE_CONTROL_POINT_UUID),
            vec![vec![0x80, 0x05, 0x02]]
        );
    }

    #[tokio::test]
    async fn test_bike_simulation_parameters() {
        let (_profile, host, mut rx) = attached(FitnessMachineType::IndoorBike).await;
        write_control_point(&host, vec![ftms_op::REQUEST_CONTROL]).await;
        let _ = rx.try_recv();
        write_control_point(
            &host,
            vec![ftms_op::SET_INDOOR_BIKE_SIMULATION, 0xE8, 0x03, 0x64, 0x00, 40, 51],
        )
        .await;
        let Ok(PeripheralEvent::Control(ControlCommand::SetIndoorBikeSimulationParameters(p))) =
            rx.try_recv()
        else {
            panic!("expected simulation parameters");
        };
        assert!((p.windspeed - 1.0).abs() < 1e-9);
        assert!((p.grade - 1.0).abs() < 1e-9);
        assert!((p.coefficient_rr - 0.004).abs() < 1e-9);
        assert!((p.coefficient_wr - 0.51).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_status_and_advertising() {
        let (profile, host, _rx) = attached(FitnessMachineType::IndoorBike).await;
        let advertisement = host.advertisement().unwrap();
        assert_eq!(advertisement.service_uuids, vec![FITNESS_MACHINE_SERVICE_UUID]);
        assert_eq!(advertisement.service_data[0].1, vec![0x01, 0x20, 0x00]);

        profile
            .notify_status(PeripheralStatus::StartedOrResumedByUser)
            .await
            .unwrap();
        assert_eq!(
            host.notifications_for(FITNESS_MACHINE_STATUS_UUID),
            vec![vec![0x04]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_stops_broadcasts() {
        let (profile, host, _rx) = attached(FitnessMachineType::Rower).await;
        profile.destroy().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(host.notifications().is_empty());
        assert!(host.published().is_empty());
        // a second destroy is harmless
        profile.destroy().await.unwrap();
    }
}
