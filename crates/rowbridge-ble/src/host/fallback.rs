//! Central-only host for platforms without a supported GATT server

use async_trait::async_trait;
use rowbridge_core::{
    Advertisement, BleHost, BridgeResult, GattService, HostEventReceiver, SensorReceiver,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::central::SensorCentral;
use crate::error::BleProfileError;

/// Host that can reach heart-rate straps but cannot publish fitness profiles
pub struct CentralOnlyHost {
    central: SensorCentral,
}

impl CentralOnlyHost {
    pub async fn open() -> Result<Self, BleProfileError> {
        warn!("BLE peripheral role is not supported on this platform, fitness profiles stay off");
        Ok(Self {
            central: SensorCentral::new().await?,
        })
    }
}

#[async_trait]
impl BleHost for CentralOnlyHost {
    async fn publish(&self, _services: Vec<GattService>) -> BridgeResult<HostEventReceiver> {
        Err(BleProfileError::PeripheralUnsupported.into())
    }

    async fn unpublish(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn start_advertising(&self, _advertisement: &Advertisement) -> BridgeResult<()> {
        Err(BleProfileError::PeripheralUnsupported.into())
    }

    async fn stop_advertising(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn notify(&self, _characteristic: Uuid, _value: &[u8]) -> BridgeResult<()> {
        Err(BleProfileError::PeripheralUnsupported.into())
    }

    async fn disconnect_centrals(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn connect_sensor(
        &self,
        service: Uuid,
        characteristics: &[Uuid],
    ) -> BridgeResult<SensorReceiver> {
        self.central.connect(service, characteristics).await
    }

    async fn disconnect_sensor(&self) -> BridgeResult<()> {
        self.central.disconnect().await
    }

    async fn close(&self) -> BridgeResult<()> {
        self.central.disconnect().await?;
        info!("BLE central host closed");
        Ok(())
    }
}
