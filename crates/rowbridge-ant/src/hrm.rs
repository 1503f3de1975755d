//! ANT+ heart-rate receiver
//!
//! Opens a slave channel paired with the first strap in range and turns its broadcast pages
//! into `HeartRateMeasurement`s.

use async_trait::async_trait;
use rowbridge_core::{BridgeResult, DeviceProfile, HeartRateMeasurement, MetricsSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::manager::{AntPlusManager, ChannelConfig};
use crate::messages::{channel_type, AntMessage, AntPage, ANT_PLUS_RF_FREQUENCY};

const PROFILE_NAME: &str = "ANT+ HRM";

pub const HRM_CHANNEL: u8 = 0;
pub const HRM_DEVICE_TYPE: u8 = 0x78;
pub const HRM_CHANNEL_PERIOD: u16 = 8070;

/// Page carrying the battery status
const BATTERY_STATUS_PAGE: u8 = 0x07;

/// Decodes heart-rate pages, remembering the last battery level
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartRatePageDecoder {
    battery_level: Option<f64>,
}

impl HeartRatePageDecoder {
    pub fn decode(&mut self, page: &AntPage) -> HeartRateMeasurement {
        // the top bit toggles with every heart beat
        if page[0] & 0x7F == BATTERY_STATUS_PAGE && page[1] <= 100 {
            self.battery_level = Some(f64::from(page[1]));
        }
        let heartrate = page[7];
        HeartRateMeasurement {
            heartrate: (heartrate != 0).then(|| f64::from(heartrate)),
            battery_level: self.battery_level,
            ..Default::default()
        }
    }
}

async fn run_receiver(
    mut inbound: broadcast::Receiver<Vec<u8>>,
    measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
) {
    let mut decoder = HeartRatePageDecoder::default();
    loop {
        let frame = match inbound.recv().await {
            Ok(frame) => frame,
            Err(RecvError::Lagged(skipped)) => {
                debug!("{} skipped {} stale messages", PROFILE_NAME, skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                info!("{} stick closed", PROFILE_NAME);
                return;
            }
        };
        let message = match AntMessage::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                debug!("{} dropping frame {}: {}", PROFILE_NAME, hex::encode(&frame), e);
                continue;
            }
        };
        let Some((HRM_CHANNEL, page)) = message.broadcast_page() else {
            continue;
        };
        if measurements.send(decoder.decode(&page)).is_err() {
            return;
        }
    }
}

/// Heart-rate strap received over ANT+
pub struct AntHeartRateMonitor {
    manager: Arc<AntPlusManager>,
    measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    task: Mutex<Option<JoinHandle<()>>>,
    channel_open: AtomicBool,
}

impl AntHeartRateMonitor {
    pub fn new(
        manager: Arc<AntPlusManager>,
        measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    ) -> Self {
        Self {
            manager,
            measurements,
            task: Mutex::new(None),
            channel_open: AtomicBool::new(false),
        }
    }

    pub fn channel_config() -> ChannelConfig {
        ChannelConfig {
            channel: HRM_CHANNEL,
            channel_type: channel_type::BIDIRECTIONAL_SLAVE,
            device_number: 0,
            device_type: HRM_DEVICE_TYPE,
            transmission_type: 0,
            period: HRM_CHANNEL_PERIOD,
            rf_frequency: ANT_PLUS_RF_FREQUENCY,
        }
    }
}

#[async_trait]
impl DeviceProfile for AntHeartRateMonitor {
    fn name(&self) -> &'static str {
        PROFILE_NAME
    }

    async fn attach(&self) -> BridgeResult<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Ok(());
        }
        // subscribe before opening so the first pages are not lost
        let inbound = self.manager.inbound();
        self.manager.open_channel(&Self::channel_config()).await?;
        self.channel_open.store(true, Ordering::SeqCst);
        *task = Some(tokio::spawn(run_receiver(
            inbound,
            self.measurements.clone(),
        )));
        Ok(())
    }

    async fn destroy(&self) -> BridgeResult<()> {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        if self.channel_open.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.manager.close_channel(HRM_CHANNEL).await {
                warn!("{} channel close failed: {}", PROFILE_NAME, e);
            }
        }
        info!("{} stopped", PROFILE_NAME);
        Ok(())
    }

    async fn notify_data(&self, _snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::message_id;
    use rowbridge_core::testing::LoopbackAntStick;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    fn attached() -> (
        AntHeartRateMonitor,
        Arc<LoopbackAntStick>,
        mpsc::UnboundedReceiver<HeartRateMeasurement>,
    ) {
        let stick = Arc::new(LoopbackAntStick::new());
        let manager = Arc::new(AntPlusManager::new(stick.clone()));
        let (tx, rx) = mpsc::unbounded_channel();
        (AntHeartRateMonitor::new(manager, tx), stick, rx)
    }

    #[test]
    fn test_decoder_tracks_battery() {
        let mut decoder = HeartRatePageDecoder::default();
        let first = decoder.decode(&[0x84, 0, 0, 0, 0, 0, 0, 128]);
        assert_eq!(first.heartrate, Some(128.0));
        assert_eq!(first.battery_level, None);

        let battery = decoder.decode(&[0x87, 72, 0, 0, 0, 0, 0, 130]);
        assert_eq!(battery.battery_level, Some(72.0));
        let later = decoder.decode(&[0x04, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(later.heartrate, None);
        assert_eq!(later.battery_level, Some(72.0));
    }

    #[tokio::test]
    async fn test_attach_opens_slave_channel() {
        let (monitor, stick, _rx) = attached();
        monitor.attach().await.unwrap();
        let setup = stick.written();
        assert_eq!(&setup[0][3..5], &[HRM_CHANNEL, channel_type::BIDIRECTIONAL_SLAVE]);
        assert_eq!(&setup[1][3..8], &[HRM_CHANNEL, 0, 0, 0x78, 0]);
        assert_eq!(&setup[3][3..6], &[HRM_CHANNEL, 0x86, 0x1F]);
    }

    #[tokio::test]
    async fn test_forwards_pages_of_own_channel() {
        let (monitor, stick, mut rx) = attached();
        monitor.attach().await.unwrap();
        settle().await;

        stick.inject(AntMessage::broadcast_data(HRM_CHANNEL, &[0x04, 0, 0, 0, 0, 0, 0, 151]).encode());
        stick.inject(AntMessage::broadcast_data(1, &[0x10, 22, 0, 0, 0, 0, 0xFF, 0x24]).encode());
        stick.inject(vec![0xA4, 0xFF]);
        settle().await;

        assert_eq!(rx.try_recv().unwrap().heartrate, Some(151.0));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_destroy_closes_channel() {
        let (monitor, stick, _rx) = attached();
        monitor.attach().await.unwrap();
        monitor.destroy().await.unwrap();
        let ids: Vec<u8> = stick.written().iter().map(|frame| frame[2]).collect();
        assert!(ids.ends_with(&[message_id::CLOSE_CHANNEL, message_id::UNASSIGN_CHANNEL]));
    }
}
