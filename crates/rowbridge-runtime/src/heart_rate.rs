//! Closed set of heart-rate monitor sources

use async_trait::async_trait;
use rowbridge_ant::{AntHeartRateMonitor, AntPlusManager};
use rowbridge_ble::BleHeartRateMonitor;
use rowbridge_core::{
    BleHost, BridgeResult, DeviceProfile, HeartRateMeasurement, HrmMode, MetricsSnapshot,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::arbiter::TransportRole;

/// The heart-rate monitor currently listened to
pub enum HeartRateProfile {
    Ble(BleHeartRateMonitor),
    Ant(AntHeartRateMonitor),
}

impl HeartRateProfile {
    pub fn ble(
        host: Arc<dyn BleHost>,
        measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    ) -> Self {
        Self::Ble(BleHeartRateMonitor::new(host, measurements))
    }

    pub fn ant(
        manager: Arc<AntPlusManager>,
        measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    ) -> Self {
        Self::Ant(AntHeartRateMonitor::new(manager, measurements))
    }

    pub fn mode(&self) -> HrmMode {
        match self {
            Self::Ble(_) => HrmMode::Ble,
            Self::Ant(_) => HrmMode::Ant,
        }
    }

    fn inner(&self) -> &dyn DeviceProfile {
        match self {
            Self::Ble(monitor) => monitor,
            Self::Ant(monitor) => monitor,
        }
    }
}

/// Radio role a heart-rate source holds, `None` for `Off`
pub fn heart_rate_role(mode: HrmMode) -> Option<TransportRole> {
    match mode {
        HrmMode::Ble => Some(TransportRole::BleHeartRate),
        HrmMode::Ant => Some(TransportRole::AntHeartRate),
        HrmMode::Off => None,
    }
}

#[async_trait]
impl DeviceProfile for HeartRateProfile {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    async fn attach(&self) -> BridgeResult<()> {
        self.inner().attach().await
    }

    async fn destroy(&self) -> BridgeResult<()> {
        self.inner().destroy().await
    }

    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        self.inner().notify_data(snapshot).await
    }
}
