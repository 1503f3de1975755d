//! Capability set shared by every device profile

use crate::control::PeripheralStatus;
use crate::errors::BridgeResult;
use crate::metrics::MetricsSnapshot;
use async_trait::async_trait;

/// A protocol profile exposed over one of the radios or the broker
///
/// `destroy` must be callable at any point, including after a failed or partial `attach`,
/// and must cancel every timer the profile owns before releasing its connection.
#[async_trait]
pub trait DeviceProfile: Send + Sync {
    /// Short protocol name used in logs
    fn name(&self) -> &'static str;

    /// Publish services or open the channel and start advertising
    async fn attach(&self) -> BridgeResult<()>;

    async fn destroy(&self) -> BridgeResult<()>;

    /// Deliver a metrics snapshot
    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()>;

    /// Deliver a session status change; profiles without a status channel ignore it
    async fn notify_status(&self, status: PeripheralStatus) -> BridgeResult<()> {
        tracing::trace!("{} ignores status {:?}", self.name(), status);
        Ok(())
    }
}
