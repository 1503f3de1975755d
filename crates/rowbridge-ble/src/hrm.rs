//! BLE heart-rate monitor client
//!
//! Runs in the central role on the shared BLE host. A background task connects to the first
//! strap advertising the Heart Rate Service, forwards every measurement with the latest
//! battery level and reconnects when the strap goes away.

use async_trait::async_trait;
use rowbridge_core::{
    BleHost, BridgeResult, DeviceProfile, HeartRateMeasurement, MetricsSnapshot,
    SensorNotification,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::heart_rate::{parse_battery_level, parse_heart_rate_measurement};
use crate::protocol::{BATTERY_LEVEL_UUID, HEART_RATE_MEASUREMENT_UUID, HEART_RATE_SERVICE_UUID};

const PROFILE_NAME: &str = "BLE-HRM";

/// Delay before looking for the strap again
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Heart-rate strap connected over BLE
pub struct BleHeartRateMonitor {
    host: Arc<dyn BleHost>,
    measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BleHeartRateMonitor {
    pub fn new(
        host: Arc<dyn BleHost>,
        measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    ) -> Self {
        Self {
            host,
            measurements,
            task: Mutex::new(None),
        }
    }
}

async fn run_sensor(
    host: Arc<dyn BleHost>,
    measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
) {
    loop {
        match host
            .connect_sensor(
                HEART_RATE_SERVICE_UUID,
                &[HEART_RATE_MEASUREMENT_UUID, BATTERY_LEVEL_UUID],
            )
            .await
        {
            Ok(mut notifications) => {
                info!("{} strap connected", PROFILE_NAME);
                let mut battery_level = None;
                while let Some(SensorNotification {
                    characteristic,
                    value,
                }) = notifications.recv().await
                {
                    if characteristic == BATTERY_LEVEL_UUID {
                        battery_level = parse_battery_level(&value).or(battery_level);
                        continue;
                    }
                    if characteristic != HEART_RATE_MEASUREMENT_UUID {
                        continue;
                    }
                    match parse_heart_rate_measurement(&value) {
                        Some(mut measurement) => {
                            measurement.battery_level = battery_level;
                            if measurements.send(measurement).is_err() {
                                return;
                            }
                        }
                        None => debug!(
                            "{} malformed measurement: {}",
                            PROFILE_NAME,
                            hex::encode(&value)
                        ),
                    }
                }
                info!("{} strap disconnected", PROFILE_NAME);
            }
            Err(e) => warn!("{} no strap found: {}", PROFILE_NAME, e),
        }
        if measurements.is_closed() {
            return;
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

#[async_trait]
impl DeviceProfile for BleHeartRateMonitor {
    fn name(&self) -> &'static str {
        PROFILE_NAME
    }

    async fn attach(&self) -> BridgeResult<()> {
        let mut task = self.task.lock().await;
        if task.is_none() {
            *task = Some(tokio::spawn(run_sensor(
                Arc::clone(&self.host),
                self.measurements.clone(),
            )));
        }
        Ok(())
    }

    async fn destroy(&self) -> BridgeResult<()> {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
        }
        self.host.disconnect_sensor().await?;
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
    use rowbridge_core::testing::LoopbackBleHost;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_forwards_measurements_with_battery() {
        let host = Arc::new(LoopbackBleHost::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = BleHeartRateMonitor::new(host.clone(), tx);
        monitor.attach().await.unwrap();
        settle().await;
        assert_eq!(host.sensor_service(), Some(HEART_RATE_SERVICE_UUID));

        host.inject_sensor(BATTERY_LEVEL_UUID, vec![80]);
        host.inject_sensor(HEART_RATE_MEASUREMENT_UUID, vec![0x00, 142]);
        settle().await;

        let measurement = rx.try_recv().unwrap();
        assert_eq!(measurement.heartrate, Some(142.0));
        assert_eq!(measurement.battery_level, Some(80.0));
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped() {
        let host = Arc::new(LoopbackBleHost::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = BleHeartRateMonitor::new(host.clone(), tx);
        monitor.attach().await.unwrap();
        settle().await;

        host.inject_sensor(HEART_RATE_MEASUREMENT_UUID, vec![0x01]);
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_strap_found() {
        let host = Arc::new(LoopbackBleHost::without_sensors());
        let (tx, _rx) = mpsc::unbounded_channel();
        let monitor = BleHeartRateMonitor::new(host.clone(), tx);
        // a missing strap is not an attach failure
        monitor.attach().await.unwrap();
        tokio::time::sleep(RECONNECT_DELAY * 2).await;
        assert_eq!(host.sensor_service(), None);

        monitor.destroy().await.unwrap();
    }
}
