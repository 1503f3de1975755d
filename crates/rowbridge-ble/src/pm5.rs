//! PM5 rowing computer profile
//!
//! Notifications are driven by the edge flags of each snapshot rather than by a timer. The
//! first matching edge decides which characteristics are sent; when no edge arrives an idle
//! heartbeat keeps the status characteristics fresh. Every dispatched edge rearms the
//! heartbeat.
//!
//! Each characteristic goes out in its direct layout when a central subscribed to it and in
//! the multiplexed layout on 0x0080 otherwise.

use async_trait::async_trait;
use rowbridge_core::{
    append_pause_interval_to_active_interval, merge_two_splits, Advertisement, BleHost,
    BridgeResult, BroadcastTimer, CharacteristicProperties, DeviceProfile, GattCharacteristic,
    GattService, MetricsSnapshot, PeripheralConfig, RollingSeries, SegmentMetrics,
};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::pm5::{
    additional_split_data, additional_split_data_multiplexed, additional_status,
    additional_status_2, additional_status_2_multiplexed, additional_status_multiplexed,
    additional_stroke_data, additional_stroke_data_multiplexed, additional_workout_summary,
    additional_workout_summary_2, additional_workout_summary_2_multiplexed,
    additional_workout_summary_multiplexed, force_curve_frames, general_status,
    general_status_multiplexed, split_data, split_data_multiplexed, stroke_data,
    stroke_data_multiplexed, workout_summary, workout_summary_multiplexed, LogTimestamp,
    Pm5Summary, FORCE_CURVE_VALUES_PER_FRAME, FORCE_CURVE_VALUES_PER_MULTIPLEXED_FRAME,
};
use crate::gatt::{GattSession, WriteHandler};
use crate::protocol::{
    pm5_char, pm5_char_uuid, PM5_BASE_UUID, PM5_CONTROL_RECEIVE_UUID, PM5_CONTROL_SERVICE_UUID,
    PM5_CONTROL_TRANSMIT_UUID, PM5_DEVICE_INFORMATION_SERVICE_UUID, PM5_FIRMWARE_REVISION_UUID,
    PM5_HARDWARE_REVISION_UUID, PM5_MANUFACTURER_UUID, PM5_MODEL_UUID, PM5_ROWING_SERVICE_UUID,
    PM5_SERIAL_UUID,
};

const PROFILE_NAME: &str = "PM5";

const PM5_MODEL: &str = "PM5";
const PM5_HARDWARE_REVISION: &str = "907";
const PM5_FIRMWARE_REVISION: &str = "210";
const PM5_MANUFACTURER: &str = "Concept2";

/// Sample rate characteristic value: 500 ms
const SAMPLE_RATE_500_MS: u8 = 0x01;

// ----------------------------------------------------------------------------
// Outgoing Frames
// ----------------------------------------------------------------------------

/// One characteristic update in both layouts
#[derive(Debug, Clone, PartialEq)]
enum Outgoing {
    Characteristic {
        id: u8,
        direct: Vec<u8>,
        multiplexed: Vec<u8>,
    },
    ForceCurve {
        direct: Vec<Vec<u8>>,
        multiplexed: Vec<Vec<u8>>,
    },
}

fn status_frames(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<Outgoing> {
    vec![
        Outgoing::Characteristic {
            id: pm5_char::GENERAL_STATUS,
            direct: general_status(snapshot),
            multiplexed: general_status_multiplexed(snapshot),
        },
        Outgoing::Characteristic {
            id: pm5_char::ADDITIONAL_STATUS,
            direct: additional_status(snapshot),
            multiplexed: additional_status_multiplexed(snapshot),
        },
        Outgoing::Characteristic {
            id: pm5_char::ADDITIONAL_STATUS_2,
            direct: additional_status_2(snapshot, summary),
            multiplexed: additional_status_2_multiplexed(snapshot, summary),
        },
    ]
}

fn split_frames(
    snapshot: &MetricsSnapshot,
    split: &SegmentMetrics,
    summary: &Pm5Summary,
) -> Vec<Outgoing> {
    vec![
        Outgoing::Characteristic {
            id: pm5_char::SPLIT_DATA,
            direct: split_data(snapshot, split),
            multiplexed: split_data_multiplexed(snapshot, split),
        },
        Outgoing::Characteristic {
            id: pm5_char::ADDITIONAL_SPLIT_DATA,
            direct: additional_split_data(snapshot, split, summary),
            multiplexed: additional_split_data_multiplexed(snapshot, split, summary),
        },
    ]
}

fn workout_frames(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<Outgoing> {
    vec![
        Outgoing::Characteristic {
            id: pm5_char::WORKOUT_SUMMARY,
            direct: workout_summary(snapshot, summary),
            multiplexed: workout_summary_multiplexed(snapshot, summary),
        },
        Outgoing::Characteristic {
            id: pm5_char::ADDITIONAL_WORKOUT_SUMMARY,
            direct: additional_workout_summary(snapshot, summary),
            multiplexed: additional_workout_summary_multiplexed(snapshot, summary),
        },
        Outgoing::Characteristic {
            id: pm5_char::ADDITIONAL_WORKOUT_SUMMARY_2,
            direct: additional_workout_summary_2(snapshot, summary),
            multiplexed: additional_workout_summary_2_multiplexed(snapshot, summary),
        },
    ]
}

fn stroke_frame(snapshot: &MetricsSnapshot) -> Outgoing {
    Outgoing::Characteristic {
        id: pm5_char::STROKE_DATA,
        direct: stroke_data(snapshot),
        multiplexed: stroke_data_multiplexed(snapshot),
    }
}

fn additional_stroke_frame(snapshot: &MetricsSnapshot) -> Outgoing {
    Outgoing::Characteristic {
        id: pm5_char::ADDITIONAL_STROKE_DATA,
        direct: additional_stroke_data(snapshot),
        multiplexed: additional_stroke_data_multiplexed(snapshot),
    }
}

fn force_curve_frame(snapshot: &MetricsSnapshot) -> Outgoing {
    let curve = &snapshot.drive_handle_force_curve;
    Outgoing::ForceCurve {
        direct: force_curve_frames(curve, FORCE_CURVE_VALUES_PER_FRAME),
        multiplexed: force_curve_frames(curve, FORCE_CURVE_VALUES_PER_MULTIPLEXED_FRAME),
    }
}

// ----------------------------------------------------------------------------
// Session State
// ----------------------------------------------------------------------------

/// What the PM5 remembers between snapshots
#[derive(Debug, Default)]
struct Pm5State {
    latest: MetricsSnapshot,
    log_time: LogTimestamp,
    previous_split_time: f64,
    previous_split_distance: f64,
    rest_heart_rate: Option<f64>,
    split_heart_rate: RollingSeries,
    workout_heart_rate: RollingSeries,
    /// Split that was running when an unplanned pause began
    paused_split: Option<SegmentMetrics>,
    /// Interval that was running when a planned rest began
    active_interval: Option<SegmentMetrics>,
}

impl Pm5State {
    fn summary(&self) -> Pm5Summary {
        Pm5Summary {
            log_time: self.log_time,
            previous_split_time: self.previous_split_time,
            previous_split_distance: self.previous_split_distance,
            split_heart_rate: (&self.split_heart_rate).into(),
            workout_heart_rate: (&self.workout_heart_rate).into(),
            rest_heart_rate: self.rest_heart_rate,
        }
    }

    fn push_heart_rate(&mut self, heartrate: Option<f64>) {
        self.split_heart_rate.push(heartrate);
        self.workout_heart_rate.push(heartrate);
    }

    fn keep_split_baseline(&mut self, split: &SegmentMetrics) {
        self.previous_split_time = split.time_spent.moving;
        self.previous_split_distance = split.distance.from_start;
    }

    /// Split to report once a split or the session ends
    fn completed_split(&mut self, snapshot: &MetricsSnapshot) -> SegmentMetrics {
        match self.paused_split.take() {
            Some(kept) => merge_two_splits(&kept, &snapshot.split),
            None => snapshot.split,
        }
    }

    /// Split to report when a pause ends
    fn resumed_split(&mut self, snapshot: &MetricsSnapshot) -> SegmentMetrics {
        match self.active_interval.take() {
            Some(kept) => append_pause_interval_to_active_interval(&kept, &snapshot.interval),
            None => snapshot.split,
        }
    }

    /// Apply the first matching edge of `snapshot`, `None` when it carries no dispatched edge
    fn dispatch(&mut self, snapshot: &MetricsSnapshot) -> Option<Vec<Outgoing>> {
        self.latest = snapshot.clone();
        let context = &snapshot.metrics_context;

        let frames = if context.is_session_start {
            self.log_time = LogTimestamp::now();
            self.split_heart_rate.reset();
            self.workout_heart_rate.reset();
            self.paused_split = None;
            self.active_interval = None;
            self.previous_split_time = 0.0;
            self.previous_split_distance = 0.0;
            self.rest_heart_rate = None;
            self.push_heart_rate(snapshot.heartrate);
            status_frames(snapshot, &self.summary())
        } else if context.is_session_stop {
            self.push_heart_rate(snapshot.heartrate);
            let split = self.completed_split(snapshot);
            let summary = self.summary();
            let mut frames = status_frames(snapshot, &summary);
            frames.extend(split_frames(snapshot, &split, &summary));
            frames.extend(workout_frames(snapshot, &summary));
            frames
        } else if context.is_pause_start {
            let summary = self.summary();
            let mut frames = status_frames(snapshot, &summary);
            frames.extend(split_frames(snapshot, &snapshot.split, &summary));
            self.keep_split_baseline(&snapshot.split);
            if snapshot.is_unplanned_pause {
                self.paused_split = Some(match self.paused_split.take() {
                    Some(kept) => merge_two_splits(&kept, &snapshot.split),
                    None => snapshot.split,
                });
            } else {
                self.active_interval = Some(snapshot.interval);
            }
            self.split_heart_rate.reset();
            self.split_heart_rate.push(snapshot.heartrate);
            frames
        } else if context.is_pause_end {
            self.rest_heart_rate = snapshot.heartrate.or(self.split_heart_rate.last());
            let split = self.resumed_split(snapshot);
            let summary = self.summary();
            let mut frames = vec![stroke_frame(snapshot)];
            frames.extend(status_frames(snapshot, &summary));
            frames.extend(split_frames(snapshot, &split, &summary));
            self.split_heart_rate.reset();
            frames
        } else if context.is_split_end {
            let split = self.completed_split(snapshot);
            let summary = self.summary();
            let mut frames = status_frames(snapshot, &summary);
            frames.extend(split_frames(snapshot, &split, &summary));
            self.keep_split_baseline(&split);
            self.split_heart_rate.reset();
            frames
        } else if context.is_drive_start {
            vec![stroke_frame(snapshot)]
        } else if context.is_recovery_start {
            self.push_heart_rate(snapshot.heartrate);
            vec![
                stroke_frame(snapshot),
                additional_stroke_frame(snapshot),
                force_curve_frame(snapshot),
            ]
        } else {
            return None;
        };
        Some(frames)
    }

    fn heartbeat(&self) -> Vec<Outgoing> {
        status_frames(&self.latest, &self.summary())
    }
}

// ----------------------------------------------------------------------------
// PM5 Peripheral
// ----------------------------------------------------------------------------

/// Emulated PM5 rowing computer
pub struct Pm5Peripheral {
    inner: Arc<Pm5Inner>,
}

struct Pm5Inner {
    host: Arc<dyn BleHost>,
    config: PeripheralConfig,
    session: RwLock<Option<GattSession>>,
    timer: Mutex<Option<BroadcastTimer>>,
    state: Mutex<Pm5State>,
}

impl Pm5Peripheral {
    pub fn new(host: Arc<dyn BleHost>, config: &PeripheralConfig) -> Self {
        Self {
            inner: Arc::new(Pm5Inner {
                host,
                config: config.clone(),
                session: RwLock::new(None),
                timer: Mutex::new(None),
                state: Mutex::new(Pm5State::default()),
            }),
        }
    }

    /// Local name the PM5 advertises
    pub fn local_name(&self) -> String {
        format!("PM5 {} Row", self.inner.config.identity.serial_number)
    }
}

impl Pm5Inner {
    fn services(&self) -> Vec<GattService> {
        let identity = &self.config.identity;
        let notify = |id: u8| GattCharacteristic::new(pm5_char_uuid(id), CharacteristicProperties::NOTIFY);
        vec![
            GattService::new(
                PM5_DEVICE_INFORMATION_SERVICE_UUID,
                vec![
                    GattCharacteristic::read_only(PM5_MODEL_UUID, PM5_MODEL.as_bytes()),
                    GattCharacteristic::read_only(PM5_SERIAL_UUID, identity.serial_number.as_bytes()),
                    GattCharacteristic::read_only(
                        PM5_HARDWARE_REVISION_UUID,
                        PM5_HARDWARE_REVISION.as_bytes(),
                    ),
                    GattCharacteristic::read_only(
                        PM5_FIRMWARE_REVISION_UUID,
                        PM5_FIRMWARE_REVISION.as_bytes(),
                    ),
                    GattCharacteristic::read_only(PM5_MANUFACTURER_UUID, PM5_MANUFACTURER.as_bytes()),
                ],
            ),
            GattService::new(
                PM5_CONTROL_SERVICE_UUID,
                vec![
                    GattCharacteristic::new(PM5_CONTROL_RECEIVE_UUID, CharacteristicProperties::WRITE),
                    GattCharacteristic::new(
                        PM5_CONTROL_TRANSMIT_UUID,
                        CharacteristicProperties::READ_NOTIFY,
                    ),
                ],
            ),
            GattService::new(
                PM5_ROWING_SERVICE_UUID,
                vec![
                    notify(pm5_char::GENERAL_STATUS),
                    notify(pm5_char::ADDITIONAL_STATUS),
                    notify(pm5_char::ADDITIONAL_STATUS_2),
                    GattCharacteristic::new(
                        pm5_char_uuid(pm5_char::SAMPLE_RATE),
                        CharacteristicProperties::READ,
                    )
                    .with_value(vec![SAMPLE_RATE_500_MS]),
                    notify(pm5_char::STROKE_DATA),
                    notify(pm5_char::ADDITIONAL_STROKE_DATA),
                    notify(pm5_char::SPLIT_DATA),
                    notify(pm5_char::ADDITIONAL_SPLIT_DATA),
                    notify(pm5_char::WORKOUT_SUMMARY),
                    notify(pm5_char::ADDITIONAL_WORKOUT_SUMMARY),
                    GattCharacteristic::new(
                        pm5_char_uuid(pm5_char::HEART_RATE_BELT_INFO),
                        CharacteristicProperties::READ_NOTIFY,
                    )
                    .with_value(vec![0u8; 6]),
                    notify(pm5_char::ADDITIONAL_WORKOUT_SUMMARY_2),
                    notify(pm5_char::FORCE_CURVE),
                    notify(pm5_char::MULTIPLEXED),
                ],
            ),
        ]
    }

    fn advertisement(&self) -> Advertisement {
        Advertisement {
            local_name: format!("PM5 {} Row", self.config.identity.serial_number),
            service_uuids: Vec::new(),
            scan_response_uuids: vec![PM5_BASE_UUID],
            service_data: Vec::new(),
        }
    }

    async fn send(&self, frames: Vec<Outgoing>) {
        let session = self.session.read().await;
        let Some(session) = session.as_ref() else {
            return;
        };
        let multiplexed_uuid = pm5_char_uuid(pm5_char::MULTIPLEXED);

        for frame in frames {
            let result = match frame {
                Outgoing::Characteristic {
                    id,
                    direct,
                    multiplexed,
                } => {
                    let uuid = pm5_char_uuid(id);
                    if session.is_subscribed(uuid).await {
                        session.notify(uuid, &direct).await
                    } else {
                        let mut payload = Vec::with_capacity(multiplexed.len() + 1);
                        payload.push(id);
                        payload.extend_from_slice(&multiplexed);
                        session.notify(multiplexed_uuid, &payload).await
                    }
                }
                Outgoing::ForceCurve {
                    direct,
                    multiplexed,
                } => {
                    let uuid = pm5_char_uuid(pm5_char::FORCE_CURVE);
                    if session.is_subscribed(uuid).await {
                        send_all(session, uuid, direct, None).await
                    } else {
                        send_all(session, multiplexed_uuid, multiplexed, Some(pm5_char::FORCE_CURVE))
                            .await
                    }
                }
            };
            if let Err(e) = result {
                debug!("{} notification dropped: {}", PROFILE_NAME, e);
            }
        }
    }

    async fn heartbeat(&self) {
        let frames = self.state.lock().await.heartbeat();
        self.send(frames).await;
    }
}

async fn send_all(
    session: &GattSession,
    characteristic: Uuid,
    frames: Vec<Vec<u8>>,
    prefix: Option<u8>,
) -> BridgeResult<()> {
    for frame in frames {
        let payload = match prefix {
            Some(id) => std::iter::once(id).chain(frame).collect(),
            None => frame,
        };
        session.notify(characteristic, &payload).await?;
    }
    Ok(())
}

#[async_trait]
impl WriteHandler for Pm5Inner {
    async fn on_write(&self, characteristic: Uuid, value: Vec<u8>) {
        if characteristic == PM5_CONTROL_RECEIVE_UUID {
            info!("{} control command received: {}", PROFILE_NAME, hex::encode(&value));
        } else {
            debug!(
                "{} ignoring write to {}: {}",
                PROFILE_NAME,
                characteristic,
                hex::encode(&value)
            );
        }
    }
}

#[async_trait]
impl DeviceProfile for Pm5Peripheral {
    fn name(&self) -> &'static str {
        PROFILE_NAME
    }

    async fn attach(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        let handler: Arc<dyn WriteHandler> = Arc::clone(inner) as Arc<dyn WriteHandler>;
        let session = GattSession::open(
            PROFILE_NAME,
            Arc::clone(&inner.host),
            inner.services(),
            inner.advertisement(),
            Arc::downgrade(&handler),
        )
        .await?;
        *inner.session.write().await = Some(session);

        let weak = Arc::downgrade(inner);
        let timer = BroadcastTimer::spawn(inner.config.timing.pm5_heartbeat_interval(), move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.heartbeat().await;
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
            session.close(PROFILE_NAME).await;
        }
        info!("{} peripheral destroyed", PROFILE_NAME);
        Ok(())
    }

    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        let inner = &self.inner;
        let Some(frames) = inner.state.lock().await.dispatch(snapshot) else {
            return Ok(());
        };
        inner.send(frames).await;
        if let Some(timer) = inner.timer.lock().await.as_ref() {
            timer.rearm();
        }
        Ok(())
    }
}
