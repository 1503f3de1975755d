//! Platform BLE hosts
//!
//! Linux publishes GATT applications through BlueZ with bluer. Every platform reaches
//! heart-rate straps in the central role through btleplug.

use rowbridge_core::{BleHost, BridgeResult};
use std::sync::Arc;

pub mod central;
pub mod fallback;
#[cfg(target_os = "linux")]
pub mod linux;

pub use central::{SensorCentral, SensorPeer};
pub use fallback::CentralOnlyHost;
#[cfg(target_os = "linux")]
pub use linux::BluezHost;

/// Open the BLE host of the current platform
pub async fn open_platform_host() -> BridgeResult<Arc<dyn BleHost>> {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "linux")] {
            let host = BluezHost::open().await?;
            Ok(Arc::new(host))
        } else {
            let host = CentralOnlyHost::open().await?;
            Ok(Arc::new(host))
        }
    }
}
