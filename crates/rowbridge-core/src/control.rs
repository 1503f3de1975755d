//! Control vocabulary flowing from centrals back to the session layer
//!
//! Profiles translate protocol writes into `ControlCommand`s and send them as
//! `PeripheralEvent`s through the channel injected at construction.

use crate::errors::{BridgeError, BridgeResult};
use crate::metrics::SegmentKind;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

// ----------------------------------------------------------------------------
// Workout Plans
// ----------------------------------------------------------------------------

/// Split definition inside a planned interval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPlan {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_calories: Option<f64>,
}

/// One interval of a workout plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlanStep {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_calories: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split: Option<SplitPlan>,
}

impl WorkoutPlanStep {
    /// A step must carry the target its kind implies
    pub fn validate(&self) -> BridgeResult<()> {
        let positive = |target: Option<f64>| target.is_some_and(|v| v.is_finite() && v > 0.0);
        let valid = match self.kind {
            SegmentKind::JustRow => true,
            SegmentKind::Distance => positive(self.target_distance),
            SegmentKind::Time | SegmentKind::Rest => positive(self.target_time),
            SegmentKind::Calories => positive(self.target_calories),
        };
        if valid {
            Ok(())
        } else {
            Err(BridgeError::InvalidPayload(format!(
                "{:?} step without a positive target",
                self.kind
            )))
        }
    }
}

/// Parse and validate a JSON workout plan
pub fn parse_workout_plan(payload: &[u8]) -> BridgeResult<Vec<WorkoutPlanStep>> {
    let plan: Vec<WorkoutPlanStep> = serde_json::from_slice(payload)?;
    if plan.is_empty() {
        return Err(BridgeError::InvalidPayload("empty workout plan".to_string()));
    }
    plan.iter().try_for_each(WorkoutPlanStep::validate)?;
    Ok(plan)
}

/// Indoor bike simulation parameters written by a central
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BikeSimulationParameters {
    /// m/s
    pub windspeed: f64,
    /// percent
    pub grade: f64,
    pub coefficient_rr: f64,
    /// kg/m
    pub coefficient_wr: f64,
}

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Command understood by the peripheral manager and the session layer
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    RequestControl,
    Start,
    StartOrResume,
    Pause,
    Stop,
    Reset,
    SwitchBlePeripheralMode,
    SwitchAntPeripheralMode,
    SwitchHrmMode,
    RefreshPeripheralConfig,
    Upload,
    Shutdown,
    UpdateIntervalSettings(Vec<WorkoutPlanStep>),
    SetIndoorBikeSimulationParameters(BikeSimulationParameters),
}

impl ControlCommand {
    /// Name used on the command surface
    pub fn name(&self) -> &'static str {
        match self {
            Self::RequestControl => "requestControl",
            Self::Start => "start",
            Self::StartOrResume => "startOrResume",
            Self::Pause => "pause",
            Self::Stop => "stop",
            Self::Reset => "reset",
            Self::SwitchBlePeripheralMode => "switchBlePeripheralMode",
            Self::SwitchAntPeripheralMode => "switchAntPeripheralMode",
            Self::SwitchHrmMode => "switchHrmMode",
            Self::RefreshPeripheralConfig => "refreshPeripheralConfig",
            Self::Upload => "upload",
            Self::Shutdown => "shutdown",
            Self::UpdateIntervalSettings(_) => "updateIntervalSettings",
            Self::SetIndoorBikeSimulationParameters(_) => "setIndoorBikeSimulationParameters",
        }
    }

    /// Build a command from its name and optional JSON data
    pub fn from_name(name: &str, data: Option<&serde_json::Value>) -> BridgeResult<Self> {
        let command = match name {
            "requestControl" => Self::RequestControl,
            "start" => Self::Start,
            "startOrResume" => Self::StartOrResume,
            "pause" => Self::Pause,
            "stop" => Self::Stop,
            "reset" => Self::Reset,
            "switchBlePeripheralMode" => Self::SwitchBlePeripheralMode,
            "switchAntPeripheralMode" => Self::SwitchAntPeripheralMode,
            "switchHrmMode" => Self::SwitchHrmMode,
            "refreshPeripheralConfig" => Self::RefreshPeripheralConfig,
            "upload" => Self::Upload,
            "shutdown" => Self::Shutdown,
            "updateIntervalSettings" => {
                let data = data.ok_or_else(|| {
                    BridgeError::InvalidPayload("updateIntervalSettings without a plan".to_string())
                })?;
                let plan: Vec<WorkoutPlanStep> = serde_json::from_value(data.clone())?;
                plan.iter().try_for_each(WorkoutPlanStep::validate)?;
                Self::UpdateIntervalSettings(plan)
            }
            "setIndoorBikeSimulationParameters" => {
                let data = data.ok_or_else(|| {
                    BridgeError::InvalidPayload("simulation parameters missing".to_string())
                })?;
                Self::SetIndoorBikeSimulationParameters(serde_json::from_value(data.clone())?)
            }
            other => return Err(BridgeError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// Session status pushed from the session layer to the status-capable profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeripheralStatus {
    Reset,
    StartedOrResumedByUser,
    StoppedOrPausedByUser,
}

// ----------------------------------------------------------------------------
// Outbound Events
// ----------------------------------------------------------------------------

/// Heart-rate reading from a BLE or ANT+ monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateMeasurement {
    pub heartrate: Option<f64>,
    pub battery_level: Option<f64>,
    /// RR intervals in seconds
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rr_intervals: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy_expended: Option<u16>,
}

impl HeartRateMeasurement {
    /// The measurement that signals an unknown heart rate
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Event emitted by the bridge towards the session layer
#[derive(Debug, Clone, PartialEq)]
pub enum PeripheralEvent {
    Control(ControlCommand),
    HeartRateMeasurement(HeartRateMeasurement),
}

pub type EventSender = mpsc::UnboundedSender<PeripheralEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<PeripheralEvent>;

/// Channel carrying `PeripheralEvent`s out of the bridge
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Send a control command, logging when nobody listens anymore
pub fn emit_control(events: &EventSender, command: ControlCommand) {
    let name = command.name();
    if events.send(PeripheralEvent::Control(command)).is_err() {
        warn!("Dropping {} command, event receiver is gone", name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_names_roundtrip() {
        for command in [
            ControlCommand::RequestControl,
            ControlCommand::StartOrResume,
            ControlCommand::SwitchHrmMode,
            ControlCommand::Shutdown,
        ] {
            assert_eq!(ControlCommand::from_name(command.name(), None).unwrap(), command);
        }
    }

    #[test]
    fn test_unknown_command() {
        let err = ControlCommand::from_name("selfDestruct", None).unwrap_err();
        assert!(matches!(err, BridgeError::UnknownCommand(name) if name == "selfDestruct"));
    }

    #[test]
    fn test_interval_settings_from_json() {
        let data = json!([
            {"type": "distance", "targetDistance": 2000, "split": {"type": "distance", "targetDistance": 500}},
            {"type": "rest", "targetTime": 120}
        ]);
        let command = ControlCommand::from_name("updateIntervalSettings", Some(&data)).unwrap();
        let ControlCommand::UpdateIntervalSettings(plan) = command else {
            panic!("expected interval settings");
        };
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[1].kind, SegmentKind::Rest);
    }

    #[test]
    fn test_plan_validation() {
        assert!(parse_workout_plan(br#"[{"type":"time"}]"#).is_err());
        assert!(parse_workout_plan(b"[]").is_err());
        assert!(parse_workout_plan(b"not json").is_err());
        assert!(parse_workout_plan(br#"[{"type":"justrow"}]"#).is_ok());
    }

    #[test]
    fn test_emit_control_without_receiver() {
        let (tx, rx) = event_channel();
        drop(rx);
        emit_control(&tx, ControlCommand::Start);
    }
}
