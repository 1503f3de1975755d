//! Closed set of BLE fitness profiles

use async_trait::async_trait;
use rowbridge_core::{
    BleHost, BleMode, BridgeError, BridgeResult, DeviceProfile, EventSender, MetricsSnapshot,
    PeripheralConfig, PeripheralStatus,
};
use std::sync::Arc;

use crate::cycling::CyclingPeripheral;
use crate::ftms::FtmsPeripheral;
use crate::pm5::Pm5Peripheral;

/// The one BLE fitness profile presented at a time
pub enum BleFitnessProfile {
    FtmsRower(FtmsPeripheral),
    FtmsBike(FtmsPeripheral),
    Pm5(Pm5Peripheral),
    Cps(CyclingPeripheral),
    Csc(CyclingPeripheral),
}

impl BleFitnessProfile {
    /// Build the profile for `mode` on the shared host
    ///
    /// `BleMode::Off` has no profile and is rejected.
    pub fn new(
        mode: BleMode,
        host: Arc<dyn BleHost>,
        config: &PeripheralConfig,
        events: EventSender,
    ) -> BridgeResult<Self> {
        let profile = match mode {
            BleMode::Ftms => Self::FtmsRower(FtmsPeripheral::rower(host, config, events)),
            BleMode::FtmsBike => Self::FtmsBike(FtmsPeripheral::indoor_bike(host, config, events)),
            BleMode::Pm5 => Self::Pm5(Pm5Peripheral::new(host, config)),
            BleMode::Cps => Self::Cps(CyclingPeripheral::power(host, config)),
            BleMode::Csc => Self::Csc(CyclingPeripheral::speed_cadence(host, config)),
            BleMode::Off => {
                return Err(BridgeError::invalid_configuration(
                    "BLE mode OFF has no profile",
                ))
            }
        };
        Ok(profile)
    }

    pub fn mode(&self) -> BleMode {
        match self {
            Self::FtmsRower(_) => BleMode::Ftms,
            Self::FtmsBike(_) => BleMode::FtmsBike,
            Self::Pm5(_) => BleMode::Pm5,
            Self::Cps(_) => BleMode::Cps,
            Self::Csc(_) => BleMode::Csc,
        }
    }

    fn inner(&self) -> &dyn DeviceProfile {
        match self {
            Self::FtmsRower(profile) | Self::FtmsBike(profile) => profile,
            Self::Pm5(profile) => profile,
            Self::Cps(profile) | Self::Csc(profile) => profile,
        }
    }
}

#[async_trait]
impl DeviceProfile for BleFitnessProfile {
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

    async fn notify_status(&self, status: PeripheralStatus) -> BridgeResult<()> {
        self.inner().notify_status(status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::testing::LoopbackBleHost;
    use rowbridge_core::{event_channel, PeripheralMode};

    #[test]
    fn test_every_mode_but_off_has_a_profile() {
        let host: Arc<dyn BleHost> = Arc::new(LoopbackBleHost::new());
        let config = PeripheralConfig::default();
        for mode in BleMode::ALL {
            let (tx, _rx) = event_channel();
            let profile = BleFitnessProfile::new(*mode, Arc::clone(&host), &config, tx);
            if mode.is_off() {
                assert!(profile.is_err());
            } else {
                let profile = profile.unwrap();
                assert_eq!(profile.mode(), *mode);
                assert_eq!(profile.name(), mode.as_str());
            }
        }
    }
}
