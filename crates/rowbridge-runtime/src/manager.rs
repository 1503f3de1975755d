//! Peripheral manager
//!
//! Owns the active profile of every radio, switches them at runtime, fuses the watchdog's
//! heart rate into snapshots and routes commands. Mode switches are exclusive with each
//! other but not with notifications: a snapshot in flight may still reach a profile that is
//! being replaced.

use rowbridge_ant::{AntFitnessProfile, AntPlusManager};
use rowbridge_ble::BleFitnessProfile;
use rowbridge_core::{
    emit_control, AntMode, BleHost, BleMode, BridgeError, ControlCommand, DeviceProfile,
    EventSender, HeartRateMeasurement, HrmMode, MetricsSnapshot, MqttClient, PeripheralConfig,
    PeripheralMode, PeripheralStatus,
};
use rowbridge_mqtt::MqttBridge;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::arbiter::{SharedTransport, TransportArbiter, TransportRole};
use crate::heart_rate::{heart_rate_role, HeartRateProfile};
use crate::watchdog::HeartRateWatchdog;

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

/// Clears the switch flag when the switch ends, however it ends
struct SwitchGuard<'a>(&'a AtomicBool);

impl<'a> SwitchGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for SwitchGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

async fn attach_profile<P: DeviceProfile>(profile: P) -> Option<Arc<P>> {
    match profile.attach().await {
        Ok(()) => {
            info!("{} attached", profile.name());
            Some(Arc::new(profile))
        }
        Err(e) => {
            error!("{} failed to attach: {}", profile.name(), e);
            if let Err(e) = profile.destroy().await {
                warn!("{} cleanup after failed attach: {}", profile.name(), e);
            }
            None
        }
    }
}

async fn take<P: ?Sized>(slot: &RwLock<Option<Arc<P>>>) -> Option<Arc<P>> {
    slot.write().await.take()
}

async fn destroy_profile(profile: &dyn DeviceProfile) {
    if let Err(e) = profile.destroy().await {
        warn!("{} failed to shut down cleanly: {}", profile.name(), e);
    }
}

async fn release_role<T: SharedTransport + ?Sized + 'static>(
    arbiter: &TransportArbiter<T>,
    role: TransportRole,
) {
    if let Err(e) = arbiter.release(role).await {
        warn!("Closing {} failed: {}", arbiter.name(), e);
    }
}

async fn pump_measurements(
    mut measurements: mpsc::UnboundedReceiver<HeartRateMeasurement>,
    watchdog: Arc<HeartRateWatchdog>,
) {
    while let Some(measurement) = measurements.recv().await {
        watchdog.on_measurement(measurement);
    }
}

// ----------------------------------------------------------------------------
// Peripheral Manager
// ----------------------------------------------------------------------------

/// Runtime owner of every peripheral profile
pub struct PeripheralManager {
    config: RwLock<PeripheralConfig>,
    events: EventSender,
    ble_host: TransportArbiter<dyn BleHost>,
    ant_stick: TransportArbiter<AntPlusManager>,
    mqtt_client: Option<Arc<dyn MqttClient>>,
    ble_profile: RwLock<Option<Arc<BleFitnessProfile>>>,
    ant_profile: RwLock<Option<Arc<AntFitnessProfile>>>,
    hrm_profile: RwLock<Option<Arc<HeartRateProfile>>>,
    mqtt_bridge: RwLock<Option<Arc<MqttBridge>>>,
    watchdog: Arc<HeartRateWatchdog>,
    hrm_pump: Mutex<Option<JoinHandle<()>>>,
    switching: AtomicBool,
}

impl PeripheralManager {
    pub(crate) fn new(
        config: PeripheralConfig,
        events: EventSender,
        ble_host: TransportArbiter<dyn BleHost>,
        ant_stick: TransportArbiter<AntPlusManager>,
        mqtt_client: Option<Arc<dyn MqttClient>>,
    ) -> Self {
        let watchdog = Arc::new(HeartRateWatchdog::new(
            config.heart_rate,
            config.timing.heart_rate_timeout(),
            events.clone(),
        ));
        Self {
            config: RwLock::new(config),
            events,
            ble_host,
            ant_stick,
            mqtt_client,
            ble_profile: RwLock::new(None),
            ant_profile: RwLock::new(None),
            hrm_profile: RwLock::new(None),
            mqtt_bridge: RwLock::new(None),
            watchdog,
            hrm_pump: Mutex::new(None),
            switching: AtomicBool::new(false),
        }
    }

    /// Configuration with the modes currently in effect
    pub async fn config(&self) -> PeripheralConfig {
        self.config.read().await.clone()
    }

    pub async fn ble_mode(&self) -> BleMode {
        self.config.read().await.ble_mode
    }

    pub async fn ant_mode(&self) -> AntMode {
        self.config.read().await.ant_mode
    }

    pub async fn hrm_mode(&self) -> HrmMode {
        self.config.read().await.hrm_mode
    }

    pub fn ble_host(&self) -> &TransportArbiter<dyn BleHost> {
        &self.ble_host
    }

    pub fn ant_stick(&self) -> &TransportArbiter<AntPlusManager> {
        &self.ant_stick
    }

    /// Bring up the configured modes: ANT+, heart rate, BLE, then MQTT
    pub async fn start(&self) {
        let config = self.config().await;
        info!(
            "Starting peripherals (BLE {}, ANT+ {}, HRM {})",
            config.ble_mode, config.ant_mode, config.hrm_mode
        );
        // BLE before ANT+ upsets the stick driver
        if !config.ant_mode.is_off() {
            self.switch_ant_mode(Some(config.ant_mode)).await;
        }
        if !config.hrm_mode.is_off() {
            self.switch_hrm_mode(Some(config.hrm_mode)).await;
        }
        if !config.ble_mode.is_off() {
            self.switch_ble_mode(Some(config.ble_mode)).await;
        }
        self.start_mqtt().await;
    }

    async fn start_mqtt(&self) {
        let Some(client) = self.mqtt_client.clone() else {
            debug!("No MQTT client configured");
            return;
        };
        let config = self.config().await;
        let bridge = MqttBridge::new(client, &config, self.events.clone());
        if let Some(bridge) = attach_profile(bridge).await {
            *self.mqtt_bridge.write().await = Some(bridge);
        }
    }

    // ------------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------------

    async fn data_profiles(&self) -> Vec<Arc<dyn DeviceProfile>> {
        let mut profiles: Vec<Arc<dyn DeviceProfile>> = self.status_profiles().await;
        if let Some(bridge) = self.mqtt_bridge.read().await.as_ref() {
            profiles.push(Arc::clone(bridge) as Arc<dyn DeviceProfile>);
        }
        profiles
    }

    async fn status_profiles(&self) -> Vec<Arc<dyn DeviceProfile>> {
        let mut profiles: Vec<Arc<dyn DeviceProfile>> = Vec::with_capacity(3);
        if let Some(profile) = self.ble_profile.read().await.as_ref() {
            profiles.push(Arc::clone(profile) as Arc<dyn DeviceProfile>);
        }
        if let Some(profile) = self.ant_profile.read().await.as_ref() {
            profiles.push(Arc::clone(profile) as Arc<dyn DeviceProfile>);
        }
        profiles
    }

    /// Fuse the heart rate into `snapshot` and hand it to BLE, ANT+ and MQTT
    pub async fn notify_metrics(&self, snapshot: &MetricsSnapshot) {
        let (heartrate, battery_level) = if self.hrm_mode().await.is_off() {
            (None, None)
        } else {
            self.watchdog.current()
        };
        let fused = snapshot.with_heart_rate(heartrate, battery_level);
        for profile in self.data_profiles().await {
            if let Err(e) = profile.notify_data(&fused).await {
                warn!("{} rejected metrics: {}", profile.name(), e);
            }
        }
    }

    /// Forward a session status to BLE and ANT+
    pub async fn notify_status(&self, status: PeripheralStatus) {
        for profile in self.status_profiles().await {
            if let Err(e) = profile.notify_status(status).await {
                warn!("{} rejected status {:?}: {}", profile.name(), status, e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mode Switching
    // ------------------------------------------------------------------------

    fn begin_switch(&self, radio: &str) -> Option<SwitchGuard<'_>> {
        let guard = SwitchGuard::try_acquire(&self.switching);
        if guard.is_none() {
            info!("{} switch dropped, another switch is in progress", radio);
        }
        guard
    }

    fn announce_config(&self) {
        emit_control(&self.events, ControlCommand::RefreshPeripheralConfig);
    }

    /// Switch the BLE fitness profile; `None` advances to the next mode
    ///
    /// Returns the mode in effect afterwards, or `None` when another switch was running.
    pub async fn switch_ble_mode(&self, target: Option<BleMode>) -> Option<BleMode> {
        let _guard = self.begin_switch("BLE")?;
        let current = self.ble_mode().await;
        let requested = target.unwrap_or_else(|| current.next());

        if let Some(old) = take(&self.ble_profile).await {
            destroy_profile(old.as_ref()).await;
        }

        let mut effective = BleMode::Off;
        if !requested.is_off() {
            match self.ble_host.acquire(TransportRole::BleFitness).await {
                Ok(host) => {
                    let config = self.config().await;
                    match BleFitnessProfile::new(requested, host, &config, self.events.clone()) {
                        Ok(profile) => {
                            if let Some(profile) = attach_profile(profile).await {
                                *self.ble_profile.write().await = Some(profile);
                                effective = requested;
                            }
                        }
                        Err(e) => error!("Cannot build BLE profile {}: {}", requested, e),
                    }
                }
                Err(e) => error!("BLE host unavailable, BLE stays OFF: {}", e),
            }
        }
        if effective.is_off() {
            release_role(&self.ble_host, TransportRole::BleFitness).await;
        }

        self.config.write().await.ble_mode = effective;
        info!("BLE mode {} -> {}", current, effective);
        self.announce_config();
        Some(effective)
    }

    /// Switch the ANT+ fitness profile; `None` advances to the next mode
    pub async fn switch_ant_mode(&self, target: Option<AntMode>) -> Option<AntMode> {
        let _guard = self.begin_switch("ANT+")?;
        let current = self.ant_mode().await;
        let requested = target.unwrap_or_else(|| current.next());

        if let Some(old) = take(&self.ant_profile).await {
            destroy_profile(old.as_ref()).await;
        }

        let mut effective = AntMode::Off;
        if !requested.is_off() {
            match self.ant_stick.acquire(TransportRole::AntFitness).await {
                Ok(manager) => {
                    let config = self.config().await;
                    match AntFitnessProfile::new(requested, manager, &config) {
                        Ok(profile) => {
                            if let Some(profile) = attach_profile(profile).await {
                                *self.ant_profile.write().await = Some(profile);
                                effective = requested;
                            }
                        }
                        Err(e) => error!("Cannot build ANT+ profile {}: {}", requested, e),
                    }
                }
                Err(e) => error!("ANT+ stick unavailable, ANT+ stays OFF: {}", e),
            }
        }
        if effective.is_off() {
            release_role(&self.ant_stick, TransportRole::AntFitness).await;
        }

        self.config.write().await.ant_mode = effective;
        info!("ANT+ mode {} -> {}", current, effective);
        self.announce_config();
        Some(effective)
    }

    async fn stop_heart_rate(&self) {
        if let Some(pump) = self.hrm_pump.lock().await.take() {
            pump.abort();
        }
        if let Some(old) = take(&self.hrm_profile).await {
            destroy_profile(old.as_ref()).await;
        }
        self.watchdog.reset();
    }

    async fn release_heart_rate_role(&self, mode: HrmMode) {
        match heart_rate_role(mode) {
            Some(role @ TransportRole::BleHeartRate) => release_role(&self.ble_host, role).await,
            Some(role) => release_role(&self.ant_stick, role).await,
            None => {}
        }
    }

    async fn build_heart_rate(
        &self,
        mode: HrmMode,
        measurements: mpsc::UnboundedSender<HeartRateMeasurement>,
    ) -> Result<HeartRateProfile, BridgeError> {
        match mode {
            HrmMode::Ble => {
                let host = self.ble_host.acquire(TransportRole::BleHeartRate).await?;
                Ok(HeartRateProfile::ble(host, measurements))
            }
            HrmMode::Ant => {
                let manager = self.ant_stick.acquire(TransportRole::AntHeartRate).await?;
                Ok(HeartRateProfile::ant(manager, measurements))
            }
            HrmMode::Off => Err(BridgeError::invalid_configuration(
                "HRM mode OFF has no profile",
            )),
        }
    }

    /// Switch the heart-rate source; `None` advances to the next mode
    pub async fn switch_hrm_mode(&self, target: Option<HrmMode>) -> Option<HrmMode> {
        let _guard = self.begin_switch("HRM")?;
        let current = self.hrm_mode().await;
        let requested = target.unwrap_or_else(|| current.next());

        self.stop_heart_rate().await;
        if current != requested {
            self.release_heart_rate_role(current).await;
        }

        let mut effective = HrmMode::Off;
        if !requested.is_off() {
            let (tx, rx) = mpsc::unbounded_channel();
            match self.build_heart_rate(requested, tx).await {
                Ok(profile) => {
                    if let Some(profile) = attach_profile(profile).await {
                        *self.hrm_profile.write().await = Some(profile);
                        *self.hrm_pump.lock().await = Some(tokio::spawn(pump_measurements(
                            rx,
                            Arc::clone(&self.watchdog),
                        )));
                        effective = requested;
                    }
                }
                Err(e) => error!("Heart-rate source {} unavailable, HRM stays OFF: {}", requested, e),
            }
            if effective.is_off() {
                self.release_heart_rate_role(requested).await;
            }
        }

        self.config.write().await.hrm_mode = effective;
        info!("HRM mode {} -> {}", current, effective);
        self.announce_config();
        Some(effective)
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    /// Act on a command from the session layer
    pub async fn handle_command(&self, command: &ControlCommand) {
        match command {
            ControlCommand::StartOrResume => {
                self.notify_status(PeripheralStatus::StartedOrResumedByUser).await
            }
            ControlCommand::Pause | ControlCommand::Stop => {
                self.notify_status(PeripheralStatus::StoppedOrPausedByUser).await
            }
            ControlCommand::Reset => self.notify_status(PeripheralStatus::Reset).await,
            ControlCommand::SwitchBlePeripheralMode => {
                self.switch_ble_mode(None).await;
            }
            ControlCommand::SwitchAntPeripheralMode => {
                self.switch_ant_mode(None).await;
            }
            ControlCommand::SwitchHrmMode => {
                self.switch_hrm_mode(None).await;
            }
            ControlCommand::Shutdown => self.shutdown_all_peripherals().await,
            ControlCommand::RequestControl
            | ControlCommand::Start
            | ControlCommand::RefreshPeripheralConfig
            | ControlCommand::Upload
            | ControlCommand::UpdateIntervalSettings(_)
            | ControlCommand::SetIndoorBikeSimulationParameters(_) => {
                debug!("Command {} needs no peripheral action", command.name());
            }
        }
    }

    /// Act on a command given by name; unknown names are logged and ignored
    pub async fn handle_command_name(&self, name: &str, data: Option<&serde_json::Value>) {
        match ControlCommand::from_name(name, data) {
            Ok(command) => self.handle_command(&command).await,
            Err(BridgeError::UnknownCommand(name)) => warn!("Ignoring unknown command {}", name),
            Err(e) => warn!("Ignoring command {}: {}", name, e),
        }
    }

    /// Destroy every profile and close both radios
    pub async fn shutdown_all_peripherals(&self) {
        info!("Shutting down all peripherals");
        if let Some(bridge) = take(&self.mqtt_bridge).await {
            destroy_profile(bridge.as_ref()).await;
        }
        if let Some(profile) = take(&self.ble_profile).await {
            destroy_profile(profile.as_ref()).await;
        }
        if let Some(profile) = take(&self.ant_profile).await {
            destroy_profile(profile.as_ref()).await;
        }
        self.stop_heart_rate().await;
        for result in [self.ble_host.shutdown().await, self.ant_stick.shutdown().await] {
            if let Err(e) = result {
                warn!("Radio shutdown: {}", e);
            }
        }
    }
}
