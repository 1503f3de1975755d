//! Rowing metrics snapshot produced by the physics engine
//!
//! A `MetricsSnapshot` is created once per engine tick or stroke boundary and handed to
//! every active profile by reference. Profiles never mutate it; heart-rate fusion in the
//! manager produces a copy.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ----------------------------------------------------------------------------
// State Tags
// ----------------------------------------------------------------------------

/// Session state of the rowing engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    WaitingForStart,
    Rowing,
    Paused,
    Stopped,
}

/// Phase of the current stroke
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrokeState {
    #[default]
    WaitingForDrive,
    Drive,
    Recovery,
    Stopped,
}

/// Kind of a workout, interval or split segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    #[default]
    JustRow,
    Time,
    Distance,
    Calories,
    Rest,
}

// ----------------------------------------------------------------------------
// Edge Flags
// ----------------------------------------------------------------------------

/// Edge flags raised by the engine for this snapshot; several may be set at once
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsContext {
    pub is_moving: bool,
    pub is_drive_start: bool,
    pub is_recovery_start: bool,
    pub is_session_start: bool,
    pub is_interval_start: bool,
    pub is_interval_end: bool,
    pub is_split_end: bool,
    pub is_pause_start: bool,
    pub is_pause_end: bool,
    pub is_session_stop: bool,
}

impl MetricsContext {
    /// Whether any edge flag other than `is_moving` is set
    pub fn has_edge(&self) -> bool {
        self.is_drive_start
            || self.is_recovery_start
            || self.is_session_start
            || self.is_interval_start
            || self.is_interval_end
            || self.is_split_end
            || self.is_pause_start
            || self.is_pause_end
            || self.is_session_stop
    }
}

// ----------------------------------------------------------------------------
// Segment Aggregates
// ----------------------------------------------------------------------------

/// Average, minimum and maximum of one metric over a segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricStats {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl MetricStats {
    pub fn constant(value: f64) -> Self {
        Self {
            average: value,
            minimum: value,
            maximum: value,
        }
    }
}

/// Time spent in a segment, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSpent {
    pub total: f64,
    pub moving: f64,
    pub rest: f64,
    pub target: Option<f64>,
}

/// Distance covered in a segment, in meters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentDistance {
    pub from_start: f64,
    pub target: Option<f64>,
}

/// Energy spent in a segment, in kcal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentCalories {
    pub total_spent: f64,
    pub average_per_hour: f64,
    pub target: Option<f64>,
}

/// Aggregates for a workout, interval or split
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SegmentMetrics {
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub number: u32,
    pub number_of_strokes: u32,
    /// Only meaningful on the workout scope
    pub number_of_intervals: u32,
    pub time_spent: TimeSpent,
    pub distance: SegmentDistance,
    pub calories: SegmentCalories,
    pub linear_velocity: MetricStats,
    pub pace: MetricStats,
    pub power: MetricStats,
    pub stroke_distance: MetricStats,
    pub stroke_rate: MetricStats,
    pub drag_factor: MetricStats,
}

impl SegmentMetrics {
    /// Target size of the segment in its own unit (m, s or kcal), if it has one
    pub fn target_size(&self) -> Option<f64> {
        match self.kind {
            SegmentKind::Distance => self.distance.target,
            SegmentKind::Time | SegmentKind::Rest => self.time_spent.target,
            SegmentKind::Calories => self.calories.target,
            SegmentKind::JustRow => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Snapshot
// ----------------------------------------------------------------------------

/// One engine tick worth of rowing metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MetricsSnapshot {
    /// Monotonic engine time
    #[serde(with = "duration_secs")]
    pub timestamp: Duration,
    pub session_state: SessionState,
    pub stroke_state: StrokeState,
    pub metrics_context: MetricsContext,
    pub is_unplanned_pause: bool,

    pub cycle_power: f64,
    pub cycle_linear_velocity: f64,
    /// Seconds per 500 m, infinite when standing still
    #[serde(with = "finite_or_null")]
    pub cycle_pace: f64,
    pub cycle_stroke_rate: f64,
    pub cycle_distance: f64,
    pub cycle_duration: f64,
    pub drive_duration: f64,
    pub drive_length: f64,
    pub recovery_duration: f64,
    pub drive_peak_handle_force: f64,
    pub drive_average_handle_force: f64,
    pub work_per_stroke: f64,
    pub drag_factor: f64,

    pub heartrate: Option<f64>,
    pub battery_level: Option<f64>,

    pub workout: SegmentMetrics,
    pub interval: SegmentMetrics,
    pub split: SegmentMetrics,

    /// Handle force in newtons over the last drive
    pub drive_handle_force_curve: Vec<f64>,
}

impl MetricsSnapshot {
    /// Copy of this snapshot carrying the fused heart-rate monitor values
    pub fn with_heart_rate(&self, heartrate: Option<f64>, battery_level: Option<f64>) -> Self {
        Self {
            heartrate,
            battery_level,
            ..self.clone()
        }
    }

    pub fn is_moving(&self) -> bool {
        self.metrics_context.is_moving
    }

    /// Pace in seconds per 500 m if the rower is moving at all
    pub fn finite_pace(&self) -> Option<f64> {
        (self.cycle_pace.is_finite() && self.cycle_pace > 0.0).then_some(self.cycle_pace)
    }

    /// Projected time and distance at the end of the current interval
    pub fn interval_projection(&self) -> Option<(f64, f64)> {
        let velocity = self.cycle_linear_velocity;
        if !(velocity > 0.0) {
            return None;
        }
        let interval = &self.interval;
        match interval.kind {
            SegmentKind::Distance => {
                let target = interval.distance.target?;
                let remaining = (target - interval.distance.from_start).max(0.0);
                Some((interval.time_spent.moving + remaining / velocity, target))
            }
            SegmentKind::Time => {
                let target = interval.time_spent.target?;
                let remaining = (target - interval.time_spent.moving).max(0.0);
                Some((target, interval.distance.from_start + remaining * velocity))
            }
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Serde Helpers
// ----------------------------------------------------------------------------

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// JSON has no infinity, an unknown pace travels as `null`
mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}
