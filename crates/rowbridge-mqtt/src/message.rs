//! Flattened metrics message published to the broker

use rowbridge_core::{MetricsContext, MetricsSnapshot, SegmentKind, SessionState, StrokeState};
use serde::Serialize;

/// Root of every topic
pub const TOPIC_ROOT: &str = "OpenRowingMonitor";

pub fn metrics_topic(machine_name: &str) -> String {
    format!("{}/{}/metrics", TOPIC_ROOT, machine_name)
}

pub fn workout_plans_topic(machine_name: &str) -> String {
    format!("{}/{}/workoutplans", TOPIC_ROOT, machine_name)
}

/// Whether a snapshot carries an edge worth publishing
pub fn is_publish_edge(context: &MetricsContext) -> bool {
    context.is_session_start
        || context.is_session_stop
        || context.is_pause_start
        || context.is_pause_end
        || context.is_interval_end
        || context.is_split_end
        || context.is_recovery_start
}

fn session_type(kind: SegmentKind) -> &'static str {
    match kind {
        SegmentKind::JustRow => "justrow",
        SegmentKind::Time => "time",
        SegmentKind::Distance => "distance",
        SegmentKind::Calories => "calories",
        SegmentKind::Rest => "rest",
    }
}

fn session_status(state: SessionState) -> &'static str {
    match state {
        SessionState::WaitingForStart => "WaitingForStart",
        SessionState::Rowing => "Rowing",
        SessionState::Paused => "Paused",
        SessionState::Stopped => "Stopped",
    }
}

fn stroke_state(state: StrokeState) -> &'static str {
    match state {
        StrokeState::WaitingForDrive => "WaitingForDrive",
        StrokeState::Drive => "Drive",
        StrokeState::Recovery => "Recovery",
        StrokeState::Stopped => "Stopped",
    }
}

/// Metrics as one flat JSON object
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsMessage {
    pub timestamp: f64,
    pub session_type: &'static str,
    pub session_status: &'static str,
    pub stroke_state: &'static str,
    pub total_number_of_strokes: u32,
    pub total_moving_time: f64,
    pub total_distance: f64,
    pub total_calories: f64,
    pub split_number: u32,
    pub heartrate: Option<f64>,
    pub velocity: f64,
    /// Seconds per 500 m, null when standing still
    pub pace: Option<f64>,
    pub power: f64,
    pub stroke_distance: f64,
    pub drive_length: f64,
    pub drive_duration: f64,
    pub drive_handle_force_average: f64,
    pub drive_handle_force_peak: f64,
    pub recovery_duration: f64,
    pub stroke_duration: f64,
    pub stroke_rate: f64,
    pub work_per_stroke: f64,
    pub drag_factor: f64,
}

impl From<&MetricsSnapshot> for MetricsMessage {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        let workout = &snapshot.workout;
        Self {
            timestamp: snapshot.timestamp.as_secs_f64(),
            session_type: session_type(workout.kind),
            session_status: session_status(snapshot.session_state),
            stroke_state: stroke_state(snapshot.stroke_state),
            total_number_of_strokes: workout.number_of_strokes,
            total_moving_time: workout.time_spent.moving,
            total_distance: workout.distance.from_start,
            total_calories: workout.calories.total_spent,
            split_number: snapshot.split.number,
            heartrate: snapshot.heartrate,
            velocity: snapshot.cycle_linear_velocity,
            pace: snapshot.finite_pace(),
            power: snapshot.cycle_power,
            stroke_distance: snapshot.cycle_distance,
            drive_length: snapshot.drive_length,
            drive_duration: snapshot.drive_duration,
            drive_handle_force_average: snapshot.drive_average_handle_force,
            drive_handle_force_peak: snapshot.drive_peak_handle_force,
            recovery_duration: snapshot.recovery_duration,
            stroke_duration: snapshot.cycle_duration,
            stroke_rate: snapshot.cycle_stroke_rate,
            work_per_stroke: snapshot.work_per_stroke,
            drag_factor: snapshot.drag_factor,
        }
    }
}
