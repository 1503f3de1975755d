//! Closed set of ANT+ fitness profiles

use async_trait::async_trait;
use rowbridge_core::{
    AntMode, BridgeError, BridgeResult, DeviceProfile, MetricsSnapshot, PeripheralConfig,
    PeripheralStatus,
};
use std::sync::Arc;

use crate::fe::AntFePeripheral;
use crate::manager::AntPlusManager;

/// The one ANT+ fitness profile broadcast at a time
pub enum AntFitnessProfile {
    Fe(AntFePeripheral),
}

impl AntFitnessProfile {
    /// Build the profile for `mode` on the shared stick
    ///
    /// `AntMode::Off` has no profile and is rejected.
    pub fn new(
        mode: AntMode,
        manager: Arc<AntPlusManager>,
        config: &PeripheralConfig,
    ) -> BridgeResult<Self> {
        match mode {
            AntMode::Fe => Ok(Self::Fe(AntFePeripheral::new(manager, config))),
            AntMode::Off => Err(BridgeError::invalid_configuration(
                "ANT+ mode OFF has no profile",
            )),
        }
    }

    pub fn mode(&self) -> AntMode {
        match self {
            Self::Fe(_) => AntMode::Fe,
        }
    }

    fn inner(&self) -> &dyn DeviceProfile {
        match self {
            Self::Fe(profile) => profile,
        }
    }
}

#[async_trait]
impl DeviceProfile for AntFitnessProfile {
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
    use rowbridge_core::testing::LoopbackAntStick;

    #[test]
    fn test_modes() {
        let manager = Arc::new(AntPlusManager::new(Arc::new(LoopbackAntStick::new())));
        let config = PeripheralConfig::default();
        let fe = AntFitnessProfile::new(AntMode::Fe, Arc::clone(&manager), &config).unwrap();
        assert_eq!(fe.mode(), AntMode::Fe);
        assert!(AntFitnessProfile::new(AntMode::Off, manager, &config).is_err());
    }
}
