//! ANT+ Fitness Equipment profile for a rower
//!
//! Opens a master channel on the shared stick and broadcasts one page every channel period.
//! Snapshots only update the session data; the page scheduler decides what goes out.

use async_trait::async_trait;
use rowbridge_core::mapping::fitness_equipment_state;
use rowbridge_core::{
    BridgeResult, BroadcastTimer, DeviceProfile, FrameValue, MachineIdentity, MetricsSnapshot,
    PeripheralConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::manager::{AntPlusManager, ChannelConfig};
use crate::messages::{channel_type, AntPage, ANT_PLUS_RF_FREQUENCY};
use crate::pages::{self, FeSessionData};

const PROFILE_NAME: &str = "ANT+ FE";

pub const FE_CHANNEL: u8 = 1;
pub const FE_DEVICE_TYPE: u8 = 0x11;
pub const FE_TRANSMISSION_TYPE: u8 = 0x05;

const HARDWARE_REVISION: u8 = 1;
/// ANT+ manufacturer id reserved for development
const MANUFACTURER_ID: u16 = 255;
const MODEL_NUMBER: u16 = 2875;

/// Ticks in one scheduler cycle; the last two carry a common page
const CYCLE_TICKS: u8 = 66;

// ----------------------------------------------------------------------------
// Page Scheduling
// ----------------------------------------------------------------------------

/// Page sent on a scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FePage {
    GeneralFeData,
    GeneralSettings,
    RowerData,
    ManufacturerInfo,
    ProductInfo,
}

impl FePage {
    pub fn page_number(self) -> u8 {
        match self {
            Self::GeneralFeData => pages::GENERAL_FE_DATA,
            Self::GeneralSettings => pages::GENERAL_SETTINGS,
            Self::RowerData => pages::ROWER_DATA,
            Self::ManufacturerInfo => pages::MANUFACTURER_INFO,
            Self::ProductInfo => pages::PRODUCT_INFO,
        }
    }
}

/// 66-tick page rotation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScheduler {
    tick: u8,
    product_next: bool,
}

impl PageScheduler {
    pub fn next_page(&mut self) -> FePage {
        self.tick += 1;
        if self.tick >= CYCLE_TICKS - 1 {
            let page = if self.product_next {
                FePage::ProductInfo
            } else {
                FePage::ManufacturerInfo
            };
            if self.tick == CYCLE_TICKS {
                self.tick = 0;
                self.product_next = !self.product_next;
            }
            return page;
        }
        match self.tick % 8 {
            4 | 7 => FePage::GeneralSettings,
            3 | 0 => FePage::RowerData,
            _ => FePage::GeneralFeData,
        }
    }
}

// ----------------------------------------------------------------------------
// Accumulators
// ----------------------------------------------------------------------------

/// Running maxima of the accumulated fields
///
/// A session reset upstream never shows as a decrease; the fields only wrap at 256.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accumulators {
    quarter_seconds: u64,
    meters: u64,
    strokes: u64,
}

impl Accumulators {
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        let workout = &snapshot.workout;
        let raw = |value: f64| value.to_unsigned().unwrap_or(0);
        self.quarter_seconds = self
            .quarter_seconds
            .max(raw(workout.time_spent.total * 4.0));
        self.meters = self.meters.max(raw(workout.distance.from_start));
        self.strokes = self.strokes.max(u64::from(workout.number_of_strokes));
    }

    pub fn raw(&self) -> (u64, u64, u64) {
        (self.quarter_seconds, self.meters, self.strokes)
    }

    pub fn elapsed_time(&self) -> u8 {
        (self.quarter_seconds % 256) as u8
    }

    pub fn distance(&self) -> u8 {
        (self.meters % 256) as u8
    }

    pub fn strokes(&self) -> u8 {
        (self.strokes % 256) as u8
    }
}

fn session_data(accumulators: &Accumulators, snapshot: &MetricsSnapshot) -> FeSessionData {
    let moving = snapshot.is_moving();
    let instantaneous = |value: f64| if moving { value } else { 0.0 };
    FeSessionData {
        elapsed_time: accumulators.elapsed_time(),
        distance: accumulators.distance(),
        strokes: accumulators.strokes(),
        speed: instantaneous(snapshot.cycle_linear_velocity * 1000.0),
        cadence: instantaneous(snapshot.cycle_stroke_rate),
        power: instantaneous(snapshot.cycle_power),
        stroke_length: instantaneous(snapshot.cycle_distance * 100.0),
        state: fitness_equipment_state(snapshot.session_state),
    }
}

// ----------------------------------------------------------------------------
// Peripheral
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FeState {
    accumulators: Accumulators,
    data: FeSessionData,
    scheduler: PageScheduler,
}

struct FeInner {
    manager: Arc<AntPlusManager>,
    channel: ChannelConfig,
    page_interval: Duration,
    software_revision: u8,
    serial_number: u32,
    state: Mutex<FeState>,
    timer: Mutex<Option<BroadcastTimer>>,
    channel_open: AtomicBool,
}

impl FeInner {
    fn page(&self, page: FePage, data: &FeSessionData) -> AntPage {
        match page {
            FePage::GeneralFeData => pages::general_fe_data(data),
            FePage::GeneralSettings => pages::general_settings(data),
            FePage::RowerData => pages::rower_data(data),
            FePage::ManufacturerInfo => {
                pages::manufacturer_info(HARDWARE_REVISION, MANUFACTURER_ID, MODEL_NUMBER)
            }
            FePage::ProductInfo => pages::product_info(self.software_revision, self.serial_number),
        }
    }

    async fn broadcast_next(&self) {
        let page = {
            let mut state = self.state.lock().await;
            let next = state.scheduler.next_page();
            self.page(next, &state.data)
        };
        if let Err(e) = self.manager.broadcast(self.channel.channel, &page).await {
            warn!("{} page 0x{:02x} not sent: {}", PROFILE_NAME, page[0], e);
        }
    }
}

/// Major number of a dotted version, or 1
fn software_revision(identity: &MachineIdentity) -> u8 {
    identity
        .firmware_revision
        .split('.')
        .next()
        .and_then(|major| major.trim().parse().ok())
        .unwrap_or(1)
}

/// Rower broadcasting FE-C pages on the shared ANT+ stick
pub struct AntFePeripheral {
    inner: Arc<FeInner>,
}

impl AntFePeripheral {
    pub fn new(manager: Arc<AntPlusManager>, config: &PeripheralConfig) -> Self {
        let channel = ChannelConfig {
            channel: FE_CHANNEL,
            channel_type: channel_type::BIDIRECTIONAL_MASTER,
            device_number: config.ant_device_id,
            device_type: FE_DEVICE_TYPE,
            transmission_type: FE_TRANSMISSION_TYPE,
            period: config.timing.ant_channel_period,
            rf_frequency: ANT_PLUS_RF_FREQUENCY,
        };
        Self {
            inner: Arc::new(FeInner {
                manager,
                channel,
                page_interval: config.timing.ant_page_interval(),
                software_revision: software_revision(&config.identity),
                serial_number: config.identity.serial_number.parse().unwrap_or(u32::MAX),
                state: Mutex::new(FeState::default()),
                timer: Mutex::new(None),
                channel_open: AtomicBool::new(false),
            }),
        }
    }

    /// Session data the next FE pages will carry
    pub async fn session_data(&self) -> FeSessionData {
        self.inner.state.lock().await.data
    }

    pub async fn accumulators(&self) -> Accumulators {
        self.inner.state.lock().await.accumulators
    }
}

#[async_trait]
impl DeviceProfile for AntFePeripheral {
    fn name(&self) -> &'static str {
        PROFILE_NAME
    }

    async fn attach(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        inner.manager.open_channel(&inner.channel).await?;
        inner.channel_open.store(true, Ordering::SeqCst);

        let weak = Arc::downgrade(inner);
        let timer = BroadcastTimer::spawn(inner.page_interval, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.broadcast_next().await;
                }
            }
        });
        *inner.timer.lock().await = Some(timer);
        info!(
            "{} broadcasting as device {} every {:?}",
            PROFILE_NAME, inner.channel.device_number, inner.page_interval
        );
        Ok(())
    }

    async fn destroy(&self) -> BridgeResult<()> {
        let inner = &self.inner;
        if let Some(timer) = inner.timer.lock().await.take() {
            timer.cancel();
        }
        if inner.channel_open.swap(false, Ordering::SeqCst) {
            inner.manager.close_channel(inner.channel.channel).await?;
        }
        info!("{} peripheral destroyed", PROFILE_NAME);
        Ok(())
    }

    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        let mut state = self.inner.state.lock().await;
        state.accumulators.update(snapshot);
        state.data = session_data(&state.accumulators, snapshot);
        debug!("{} session data {:?}", PROFILE_NAME, state.data);
        Ok(())
    }
}
