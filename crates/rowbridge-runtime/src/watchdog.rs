//! Heart-rate watchdog
//!
//! Gates incoming measurements against the user's heart-rate bounds, keeps the last
//! accepted value for fusion into snapshots and reports the strap as unknown once it has
//! been silent for the timeout.

use rowbridge_core::{
    BroadcastTimer, EventSender, HeartRateBounds, HeartRateMeasurement, PeripheralEvent,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Reading {
    heartrate: Option<f64>,
    battery_level: Option<f64>,
}

struct WatchdogInner {
    bounds: HeartRateBounds,
    timeout: Duration,
    events: EventSender,
    reading: Mutex<Reading>,
    timer: Mutex<Option<BroadcastTimer>>,
}

impl WatchdogInner {
    fn forward(&self, measurement: HeartRateMeasurement) {
        if self
            .events
            .send(PeripheralEvent::HeartRateMeasurement(measurement))
            .is_err()
        {
            debug!("Heart-rate measurement dropped, event receiver is gone");
        }
    }

    fn trip(&self) {
        let tripped = {
            let mut reading = guard(&self.reading);
            let had_value = reading.heartrate.is_some();
            *reading = Reading::default();
            had_value
        };
        if tripped {
            info!("No heart rate for {:?}, reporting it as unknown", self.timeout);
            // the timer task ends with this tick
            guard(&self.timer).take();
            self.forward(HeartRateMeasurement::unknown());
        }
    }
}

/// Validity gate and silence timeout for heart-rate monitors
pub struct HeartRateWatchdog {
    inner: Arc<WatchdogInner>,
}

impl HeartRateWatchdog {
    pub fn new(bounds: HeartRateBounds, timeout: Duration, events: EventSender) -> Self {
        Self {
            inner: Arc::new(WatchdogInner {
                bounds,
                timeout,
                events,
                reading: Mutex::new(Reading::default()),
                timer: Mutex::new(None),
            }),
        }
    }

    /// Gate and forward one measurement
    ///
    /// A plausible heart rate is stored and restarts the timeout. Anything else is
    /// forwarded without a heart rate and leaves the timeout running.
    pub fn on_measurement(&self, measurement: HeartRateMeasurement) {
        let inner = &self.inner;
        match measurement.heartrate {
            Some(value) if inner.bounds.accepts(value) => {
                *guard(&inner.reading) = Reading {
                    heartrate: Some(value),
                    battery_level: measurement.battery_level,
                };
                self.rearm();
                inner.forward(measurement);
            }
            _ => {
                debug!("Heart rate {:?} outside bounds", measurement.heartrate);
                inner.forward(HeartRateMeasurement {
                    heartrate: None,
                    ..measurement
                });
            }
        }
    }

    fn rearm(&self) {
        let mut timer = guard(&self.inner.timer);
        match timer.as_ref() {
            Some(timer) => timer.rearm(),
            None => {
                let weak = Arc::downgrade(&self.inner);
                *timer = Some(BroadcastTimer::spawn(self.inner.timeout, move || {
                    let weak = weak.clone();
                    async move {
                        if let Some(inner) = weak.upgrade() {
                            inner.trip();
                        }
                    }
                }));
            }
        }
    }

    /// Last accepted heart rate and battery level, both absent once tripped
    pub fn current(&self) -> (Option<f64>, Option<f64>) {
        let reading = *guard(&self.inner.reading);
        (reading.heartrate, reading.battery_level)
    }

    /// Forget the reading and cancel the timeout
    pub fn reset(&self) {
        if let Some(timer) = guard(&self.inner.timer).take() {
            timer.cancel();
        }
        *guard(&self.inner.reading) = Reading::default();
    }
}

impl Drop for HeartRateWatchdog {
    fn drop(&mut self) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::{event_channel, EventReceiver};

    fn watchdog() -> (HeartRateWatchdog, EventReceiver) {
        let (tx, rx) = event_channel();
        let watchdog = HeartRateWatchdog::new(
            HeartRateBounds::default(),
            Duration::from_secs(6),
            tx,
        );
        (watchdog, rx)
    }

    fn measurement(heartrate: f64) -> HeartRateMeasurement {
        HeartRateMeasurement {
            heartrate: Some(heartrate),
            battery_level: Some(90.0),
            ..Default::default()
        }
    }

    fn heart_rates(rx: &mut EventReceiver) -> Vec<Option<f64>> {
        let mut values = Vec::new();
        while let Ok(PeripheralEvent::HeartRateMeasurement(m)) = rx.try_recv() {
            values.push(m.heartrate);
        }
        values
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_unknown_after_silence() {
        let (watchdog, mut rx) = watchdog();
        watchdog.on_measurement(measurement(130.0));
        assert_eq!(watchdog.current(), (Some(130.0), Some(90.0)));

        tokio::time::sleep(Duration::from_millis(6100)).await;
        assert_eq!(watchdog.current(), (None, None));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(heart_rates(&mut rx), vec![Some(130.0), None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_measurements_keep_it_alive() {
        let (watchdog, mut rx) = watchdog();
        for bpm in [120.0, 122.0, 125.0, 127.0] {
            watchdog.on_measurement(measurement(bpm));
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        assert_eq!(watchdog.current().0, Some(127.0));
        assert_eq!(heart_rates(&mut rx).len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_values_do_not_rearm() {
        let (watchdog, mut rx) = watchdog();
        watchdog.on_measurement(measurement(130.0));
        tokio::time::sleep(Duration::from_secs(4)).await;
        watchdog.on_measurement(measurement(250.0));
        assert_eq!(watchdog.current().0, Some(130.0));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(watchdog.current().0, None);
        assert_eq!(heart_rates(&mut rx), vec![Some(130.0), None, None]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_timeout() {
        let (watchdog, mut rx) = watchdog();
        watchdog.on_measurement(measurement(110.0));
        watchdog.reset();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(heart_rates(&mut rx), vec![Some(110.0)]);
        assert_eq!(watchdog.current(), (None, None));
    }
}
