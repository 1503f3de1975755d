//! PM5 rowing service frames
//!
//! Every characteristic has two encoders. The direct layout is notified on the
//! characteristic itself when a central subscribed to it. The multiplexed layout travels on
//! 0x0080 behind a one-byte characteristic id and drops or adds fields to fit the frame.
//!
//! Units follow the PM5: elapsed time in 0.01 s, distances in 0.1 m unless noted, paces in
//! 0.01 s per 500 m, forces in 0.1 lbf.

use chrono::{Datelike, Local, Timelike};
use rowbridge_core::mapping::{
    duration_type, interval_type, pm5_stroke_state, rowing_state, segment_interval_type,
    workout_state, workout_type,
};
use rowbridge_core::{FrameBuilder, MetricsSnapshot, RollingSeries, SegmentMetrics};
use tracing::debug;

/// Newtons to pounds-force
pub const NEWTON_TO_POUND_FORCE: f64 = 0.224809;

/// Force values per frame on the force-curve characteristic
pub const FORCE_CURVE_VALUES_PER_FRAME: usize = 9;

/// Force values per frame on the multiplexed characteristic, one byte goes to the id
pub const FORCE_CURVE_VALUES_PER_MULTIPLEXED_FRAME: usize = 8;

/// Frame count is a 4-bit field in the force-curve header
pub const MAX_FORCE_CURVE_FRAMES: usize = 15;

/// Static D rower
const ERG_MACHINE_TYPE: u8 = 0;

const UNKNOWN_HEART_RATE: u8 = 255;

// ----------------------------------------------------------------------------
// Summary State
// ----------------------------------------------------------------------------

/// Wall-clock time a workout is logged under
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogTimestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
}

impl LogTimestamp {
    /// Calendar fields of any chrono date-time
    pub fn from_datetime<T: Datelike + Timelike>(time: &T) -> Self {
        Self {
            year: time.year().clamp(0, i32::from(u16::MAX)) as u16,
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    /// Current local wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Month in bits 0-3, day in bits 4-8, years since 2000 in bits 9-15
    pub fn date_field(&self) -> u16 {
        let years = self.year.saturating_sub(2000) & 0x7F;
        u16::from(self.month & 0x0F) | (u16::from(self.day & 0x1F) << 4) | (years << 9)
    }

    /// Minutes in the low byte, hours in the high byte
    pub fn time_field(&self) -> u16 {
        u16::from(self.minute) | (u16::from(self.hour) << 8)
    }
}

/// Heart-rate aggregates over one scope
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeartRateSummary {
    pub average: Option<f64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub last: Option<f64>,
}

impl From<&RollingSeries> for HeartRateSummary {
    fn from(series: &RollingSeries) -> Self {
        Self {
            average: series.average(),
            minimum: series.minimum(),
            maximum: series.maximum(),
            last: series.last(),
        }
    }
}

/// State the PM5 keeps next to the snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pm5Summary {
    pub log_time: LogTimestamp,
    /// Seconds
    pub previous_split_time: f64,
    /// Meters
    pub previous_split_distance: f64,
    pub split_heart_rate: HeartRateSummary,
    pub workout_heart_rate: HeartRateSummary,
    pub rest_heart_rate: Option<f64>,
}

// ----------------------------------------------------------------------------
// Field Helpers
// ----------------------------------------------------------------------------

fn elapsed(snapshot: &MetricsSnapshot) -> f64 {
    (snapshot.workout.time_spent.total * 100.0).round()
}

fn distance(snapshot: &MetricsSnapshot) -> f64 {
    (snapshot.workout.distance.from_start * 10.0).round()
}

/// Pace in the given resolution, zero when unknown
fn pace(seconds_per_500m: f64, per_second: f64) -> f64 {
    if seconds_per_500m.is_finite() && seconds_per_500m > 0.0 {
        (seconds_per_500m * per_second).round()
    } else {
        0.0
    }
}

fn heart_rate_or(value: Option<f64>, unknown: u8) -> f64 {
    value
        .filter(|hr| *hr > 0.0)
        .map(f64::round)
        .unwrap_or(f64::from(unknown))
}

fn force(newtons: f64) -> f64 {
    (newtons * NEWTON_TO_POUND_FORCE * 10.0).round()
}

/// Planned size of the workout in the unit of its duration type
fn workout_duration(segment: &SegmentMetrics) -> f64 {
    match segment.kind {
        rowbridge_core::SegmentKind::Time => segment
            .time_spent
            .target
            .map_or(0.0, |t| (t * 100.0).round()),
        _ => segment.target_size().map_or(0.0, f64::round),
    }
}

/// Calories per hour the PM5 shows for a stroke at `watts`
fn stroke_calories_per_hour(watts: f64) -> f64 {
    if watts > 0.0 {
        (watts * 4.0 * 0.8604 + 300.0).round()
    } else {
        0.0
    }
}

// ----------------------------------------------------------------------------
// Status (0x31, 0x32, 0x33)
// ----------------------------------------------------------------------------

/// General status, direct layout (19 bytes)
pub fn general_status(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u24_le(distance(snapshot))
        .write_u8(workout_type(snapshot).as_u8())
        .write_u8(interval_type(snapshot).as_u8())
        .write_u8(workout_state(snapshot).as_u8())
        .write_u8(rowing_state(snapshot).as_u8())
        .write_u8(pm5_stroke_state(snapshot.stroke_state).as_u8())
        .write_u24_le(snapshot.workout.distance.from_start.round())
        .write_u24_le(workout_duration(&snapshot.workout))
        .write_u8(duration_type(&snapshot.workout).as_u8())
        .write_u8(snapshot.drag_factor.round());
    frame.build()
}

/// General status, multiplexed layout; the PM5 uses the direct 19-byte layout on 0x0080 as well
pub fn general_status_multiplexed(snapshot: &MetricsSnapshot) -> Vec<u8> {
    general_status(snapshot)
}

fn additional_status_common(snapshot: &MetricsSnapshot) -> FrameBuilder {
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u16_le((snapshot.cycle_linear_velocity * 1000.0).round())
        .write_u8(snapshot.cycle_stroke_rate.round())
        .write_u8(heart_rate_or(snapshot.heartrate, UNKNOWN_HEART_RATE))
        .write_u16_le(pace(snapshot.cycle_pace, 100.0))
        .write_u16_le(pace(snapshot.workout.pace.average, 100.0))
        // rest distance is not tracked
        .write_u16_le(0)
        .write_u24_le((snapshot.interval.time_spent.rest * 100.0).round());
    frame
}

/// Additional status, direct layout (17 bytes) ending in the erg machine type
pub fn additional_status(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = additional_status_common(snapshot);
    frame.write_u8(ERG_MACHINE_TYPE);
    frame.build()
}

/// Additional status, multiplexed layout (18 bytes) ending in the average power
pub fn additional_status_multiplexed(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = additional_status_common(snapshot);
    frame.write_u16_le(snapshot.workout.power.average.round());
    frame.build()
}

/// Additional status 2, direct layout (20 bytes)
pub fn additional_status_2(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<u8> {
    let split = &snapshot.split;
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u8(snapshot.interval.number)
        .write_u16_le(snapshot.workout.power.average.round())
        .write_u16_le(snapshot.workout.calories.total_spent.round())
        .write_u16_le(pace(split.pace.average, 100.0))
        .write_u16_le(split.power.average.round())
        .write_u16_le(split.calories.average_per_hour.round())
        .write_u24_le((summary.previous_split_time * 10.0).round())
        .write_u24_le(summary.previous_split_distance.round());
    frame.build()
}

/// Additional status 2, multiplexed layout (18 bytes) without the average power
pub fn additional_status_2_multiplexed(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<u8> {
    let split = &snapshot.split;
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u8(snapshot.interval.number)
        .write_u16_le(snapshot.workout.calories.total_spent.round())
        .write_u16_le(pace(split.pace.average, 100.0))
        .write_u16_le(split.power.average.round())
        .write_u16_le(split.calories.average_per_hour.round())
        .write_u24_le((summary.previous_split_time * 10.0).round())
        .write_u24_le(summary.previous_split_distance.round());
    frame.build()
}

// ----------------------------------------------------------------------------
// Stroke (0x35, 0x36)
// ----------------------------------------------------------------------------

fn stroke_data_common(snapshot: &MetricsSnapshot) -> FrameBuilder {
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u24_le(distance(snapshot))
        .write_u8((snapshot.drive_length * 100.0).round())
        .write_u8((snapshot.drive_duration * 100.0).round())
        .write_u16_le((snapshot.recovery_duration * 100.0).round())
        .write_u16_le((snapshot.cycle_distance * 100.0).round())
        .write_u16_le(force(snapshot.drive_peak_handle_force))
        .write_u16_le(force(snapshot.drive_average_handle_force));
    frame
}

/// Stroke data, direct layout (20 bytes) with work per stroke
pub fn stroke_data(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = stroke_data_common(snapshot);
    frame
        .write_u16_le((snapshot.work_per_stroke * 10.0).round())
        .write_u16_le(snapshot.workout.number_of_strokes);
    frame.build()
}

/// Stroke data, multiplexed layout (18 bytes) without work per stroke
pub fn stroke_data_multiplexed(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = stroke_data_common(snapshot);
    frame.write_u16_le(snapshot.workout.number_of_strokes);
    frame.build()
}

fn additional_stroke_data_common(snapshot: &MetricsSnapshot) -> FrameBuilder {
    let (projected_time, projected_distance) = snapshot.interval_projection().unwrap_or_default();
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u16_le(snapshot.cycle_power.round())
        .write_u16_le(stroke_calories_per_hour(snapshot.cycle_power))
        .write_u16_le(snapshot.workout.number_of_strokes)
        .write_u24_le(projected_time.round())
        .write_u24_le(projected_distance.round());
    frame
}

/// Additional stroke data, direct layout (15 bytes)
pub fn additional_stroke_data(snapshot: &MetricsSnapshot) -> Vec<u8> {
    additional_stroke_data_common(snapshot).build()
}

/// Additional stroke data, multiplexed layout (17 bytes) adding work per stroke
pub fn additional_stroke_data_multiplexed(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = additional_stroke_data_common(snapshot);
    frame.write_u16_le((snapshot.work_per_stroke * 10.0).round());
    frame.build()
}

// ----------------------------------------------------------------------------
// Split (0x37, 0x38)
// ----------------------------------------------------------------------------

/// Split data, direct layout (18 bytes) for the reported `split`
pub fn split_data(snapshot: &MetricsSnapshot, split: &SegmentMetrics) -> Vec<u8> {
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u24_le(distance(snapshot))
        .write_u24_le((split.time_spent.total * 10.0).round())
        .write_u24_le(split.distance.from_start.round())
        .write_u16_le(split.time_spent.rest.round())
        // rest distance is not tracked
        .write_u16_le(0)
        .write_u8(segment_interval_type(split).as_u8())
        .write_u8(split.number);
    frame.build()
}

/// Split data, multiplexed layout; the PM5 uses the direct 18-byte layout on 0x0080 as well
pub fn split_data_multiplexed(snapshot: &MetricsSnapshot, split: &SegmentMetrics) -> Vec<u8> {
    split_data(snapshot, split)
}

fn additional_split_data_common(
    snapshot: &MetricsSnapshot,
    split: &SegmentMetrics,
    summary: &Pm5Summary,
) -> FrameBuilder {
    let mut frame = FrameBuilder::new();
    frame
        .write_u24_le(elapsed(snapshot))
        .write_u8(split.stroke_rate.average.round())
        .write_u8(heart_rate_or(summary.split_heart_rate.average, 0))
        .write_u8(heart_rate_or(summary.rest_heart_rate, 0))
        .write_u16_le(pace(split.pace.average, 10.0))
        .write_u16_le(split.calories.total_spent.round())
        .write_u16_le(split.calories.average_per_hour.round())
        .write_u16_le((split.linear_velocity.average * 1000.0).round())
        .write_u16_le(split.power.average.round())
        .write_u8(split.drag_factor.average.round())
        .write_u8(split.number);
    frame
}

/// Additional split data, direct layout (19 bytes) ending in the erg machine type
pub fn additional_split_data(
    snapshot: &MetricsSnapshot,
    split: &SegmentMetrics,
    summary: &Pm5Summary,
) -> Vec<u8> {
    let mut frame = additional_split_data_common(snapshot, split, summary);
    frame.write_u8(ERG_MACHINE_TYPE);
    frame.build()
}

/// Additional split data, multiplexed layout (18 bytes)
pub fn additional_split_data_multiplexed(
    snapshot: &MetricsSnapshot,
    split: &SegmentMetrics,
    summary: &Pm5Summary,
) -> Vec<u8> {
    additional_split_data_common(snapshot, split, summary).build()
}

// ----------------------------------------------------------------------------
// Workout Summary (0x39, 0x3A, 0x3C)
// ----------------------------------------------------------------------------

fn workout_summary_common(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> FrameBuilder {
    let workout = &snapshot.workout;
    let heart_rate = &summary.workout_heart_rate;
    let mut frame = FrameBuilder::new();
    frame
        .write_u16_le(summary.log_time.date_field())
        .write_u16_le(summary.log_time.time_field())
        .write_u24_le(elapsed(snapshot))
        .write_u24_le(distance(snapshot))
        .write_u8(workout.stroke_rate.average.round())
        .write_u8(heart_rate_or(heart_rate.last, 0))
        .write_u8(heart_rate_or(heart_rate.average, 0))
        .write_u8(heart_rate_or(heart_rate.minimum, 0))
        .write_u8(heart_rate_or(heart_rate.maximum, 0))
        .write_u8(workout.drag_factor.average.round())
        // recovery heart rate is measured a minute after the workout, never available here
        .write_u8(0)
        .write_u8(workout_type(snapshot).as_u8());
    frame
}

/// Workout summary, direct layout (20 bytes) ending in the average pace
pub fn workout_summary(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<u8> {
    let mut frame = workout_summary_common(snapshot, summary);
    frame.write_u16_le(pace(snapshot.workout.pace.average, 10.0));
    frame.build()
}

/// Workout summary, multiplexed layout (18 bytes) without the average pace
pub fn workout_summary_multiplexed(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<u8> {
    workout_summary_common(snapshot, summary).build()
}

fn additional_workout_summary_common(
    snapshot: &MetricsSnapshot,
    summary: &Pm5Summary,
) -> FrameBuilder {
    let workout = &snapshot.workout;
    let split = &snapshot.split;
    let mut frame = FrameBuilder::new();
    frame
        .write_u16_le(summary.log_time.date_field())
        .write_u16_le(summary.log_time.time_field())
        .write_u8(segment_interval_type(split).as_u8())
        .write_u16_le(split.target_size().map_or(0.0, f64::round))
        .write_u8(split.number + 1)
        .write_u16_le(workout.calories.total_spent.round())
        .write_u16_le(workout.power.average.round())
        // rest distance is not tracked
        .write_u24_le(0)
        .write_u16_le(workout.time_spent.rest.round());
    frame
}

/// Additional workout summary, direct layout (19 bytes) ending in the average calories
pub fn additional_workout_summary(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<u8> {
    let mut frame = additional_workout_summary_common(snapshot, summary);
    frame.write_u16_le(snapshot.workout.calories.average_per_hour.round());
    frame.build()
}

/// Additional workout summary, multiplexed layout (17 bytes)
pub fn additional_workout_summary_multiplexed(
    snapshot: &MetricsSnapshot,
    summary: &Pm5Summary,
) -> Vec<u8> {
    additional_workout_summary_common(snapshot, summary).build()
}

/// Additional workout summary 2 (10 bytes)
pub fn additional_workout_summary_2(snapshot: &MetricsSnapshot, summary: &Pm5Summary) -> Vec<u8> {
    let mut frame = FrameBuilder::new();
    frame
        .write_u16_le(summary.log_time.date_field())
        .write_u16_le(summary.log_time.time_field())
        .write_u16_le(pace(snapshot.workout.pace.average, 10.0))
        // game id and score
        .write_u8(0)
        .write_u16_le(0)
        .write_u8(ERG_MACHINE_TYPE);
    frame.build()
}

/// Additional workout summary 2, multiplexed layout; the PM5 sends the direct layout on 0x0080
pub fn additional_workout_summary_2_multiplexed(
    snapshot: &MetricsSnapshot,
    summary: &Pm5Summary,
) -> Vec<u8> {
    additional_workout_summary_2(snapshot, summary)
}

// ----------------------------------------------------------------------------
// Force Curve (0x3D)
// ----------------------------------------------------------------------------

/// Split a drive's force samples into frames of at most `values_per_frame` values
///
/// Each frame starts with `(frame_count << 4) | values_in_frame` and a zero-based sequence
/// number, followed by the samples in pounds-force as little-endian u16. An empty curve
/// yields no frames.
pub fn force_curve_frames(curve: &[f64], values_per_frame: usize) -> Vec<Vec<u8>> {
    if curve.is_empty() || values_per_frame == 0 {
        return Vec::new();
    }
    let capacity = MAX_FORCE_CURVE_FRAMES * values_per_frame;
    if curve.len() > capacity {
        debug!(
            "Force curve of {} samples truncated to {}",
            curve.len(),
            capacity
        );
    }
    let curve = &curve[..curve.len().min(capacity)];
    let chunks = curve.chunks(values_per_frame);
    let frame_count = chunks.len();
    chunks
        .enumerate()
        .map(|(sequence, chunk)| {
            let mut frame = FrameBuilder::new();
            frame
                .write_u8(((frame_count & 0x0F) << 4) | chunk.len())
                .write_u8(sequence);
            for newtons in chunk {
                frame.write_u16_le((newtons * NEWTON_TO_POUND_FORCE).round());
            }
            frame.build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowbridge_core::{
        MetricStats, SegmentCalories, SegmentDistance, SegmentKind, SessionState, StrokeState,
        TimeSpent,
    };

    fn rowing_snapshot() -> MetricsSnapshot {
        let mut snapshot = MetricsSnapshot {
            session_state: SessionState::Rowing,
            stroke_state: StrokeState::Recovery,
            cycle_power: 200.0,
            cycle_linear_velocity: 4.0,
            cycle_pace: 125.0,
            cycle_stroke_rate: 26.0,
            cycle_distance: 9.5,
            drive_duration: 0.8,
            drive_length: 1.42,
            recovery_duration: 1.5,
            drive_peak_handle_force: 600.0,
            drive_average_handle_force: 400.0,
            work_per_stroke: 512.3,
            drag_factor: 118.0,
            heartrate: Some(150.0),
            ..Default::default()
        };
        snapshot.workout.kind = SegmentKind::Distance;
        snapshot.workout.number_of_intervals = 1;
        snapshot.workout.number_of_strokes = 120;
        snapshot.workout.time_spent = TimeSpent {
            total: 300.0,
            moving: 300.0,
            rest: 0.0,
            target: None,
        };
        snapshot.workout.distance = SegmentDistance {
            from_start: 1250.0,
            target: Some(2000.0),
        };
        snapshot.workout.calories = SegmentCalories {
            total_spent: 80.0,
            average_per_hour: 960.0,
            target: None,
        };
        snapshot.workout.power = MetricStats::constant(195.0);
        snapshot.workout.pace = MetricStats::constant(126.0);
        snapshot.split = snapshot.workout;
        snapshot.split.distance.target = Some(500.0);
        snapshot.split.number = 2;
        snapshot.interval = snapshot.workout;
        snapshot
    }

    #[test]
    fn test_general_status_layout() {
        let frame = general_status(&rowing_snapshot());
        assert_eq!(frame.len(), 19);
        // 300 s in 0.01 s
        assert_eq!(&frame[0..3], &[0x30, 0x75, 0x00]);
        // 1250 m in 0.1 m
        assert_eq!(&frame[3..6], &[0xD4, 0x30, 0x00]);
        assert_eq!(frame[6], 3); // fixed distance with splits
        assert_eq!(frame[7], 1); // distance interval
        assert_eq!(frame[8], 1); // workout row
        assert_eq!(frame[9], 1); // active
        assert_eq!(frame[10], 4); // recovery
        assert_eq!(&frame[14..17], &[0xD0, 0x07, 0x00]); // 2000 m planned
        assert_eq!(frame[17], 0x80);
        assert_eq!(frame[18], 118);
        assert_eq!(general_status_multiplexed(&rowing_snapshot()), frame);
    }

    #[test]
    fn test_additional_status_layouts_differ() {
        let snapshot = rowing_snapshot();
        let direct = additional_status(&snapshot);
        let multiplexed = additional_status_multiplexed(&snapshot);
        assert_eq!(direct.len(), 17);
        assert_eq!(multiplexed.len(), 18);
        assert_eq!(&direct[..16], &multiplexed[..16]);
        assert_eq!(&direct[3..5], &4000u16.to_le_bytes());
        assert_eq!(direct[6], 150);
        assert_eq!(&multiplexed[16..18], &195u16.to_le_bytes());
    }

    #[test]
    fn test_unknown_heart_rate_is_255() {
        let mut snapshot = rowing_snapshot();
        snapshot.heartrate = None;
        assert_eq!(additional_status(&snapshot)[6], 255);
    }

    #[test]
    fn test_additional_status_2_layouts() {
        let summary = Pm5Summary {
            previous_split_time: 120.0,
            previous_split_distance: 500.0,
            ..Default::default()
        };
        let snapshot = rowing_snapshot();
        let direct = additional_status_2(&snapshot, &summary);
        let multiplexed = additional_status_2_multiplexed(&snapshot, &summary);
        assert_eq!(direct.len(), 20);
        assert_eq!(multiplexed.len(), 18);
        assert_eq!(&direct[14..17], &[0xB0, 0x04, 0x00]);
        assert_eq!(&multiplexed[12..15], &[0xB0, 0x04, 0x00]);
    }

    #[test]
    fn test_stroke_data_layouts() {
        let snapshot = rowing_snapshot();
        let direct = stroke_data(&snapshot);
        let multiplexed = stroke_data_multiplexed(&snapshot);
        assert_eq!(direct.len(), 20);
        assert_eq!(multiplexed.len(), 18);
        assert_eq!(direct[6], 142);
        assert_eq!(direct[7], 80);
        // 600 N = 134.9 lbf
        assert_eq!(&direct[12..14], &1349u16.to_le_bytes());
        assert_eq!(&direct[16..18], &5123u16.to_le_bytes());
        assert_eq!(&direct[18..20], &120u16.to_le_bytes());
        assert_eq!(&multiplexed[16..18], &120u16.to_le_bytes());
    }

    #[test]
    fn test_additional_stroke_data_projection() {
        let snapshot = rowing_snapshot();
        let direct = additional_stroke_data(&snapshot);
        let multiplexed = additional_stroke_data_multiplexed(&snapshot);
        assert_eq!(direct.len(), 15);
        assert_eq!(multiplexed.len(), 17);
        // 750 m left at 4 m/s after 300 s
        assert_eq!(&direct[9..12], &[0xE8, 0x01, 0x00]);
        assert_eq!(&direct[12..15], &[0xD0, 0x07, 0x00]);
        assert_eq!(&multiplexed[15..17], &5123u16.to_le_bytes());
    }

    #[test]
    fn test_split_layouts() {
        let snapshot = rowing_snapshot();
        let summary = Pm5Summary::default();
        assert_eq!(split_data(&snapshot, &snapshot.split).len(), 18);
        assert_eq!(
            split_data_multiplexed(&snapshot, &snapshot.split),
            split_data(&snapshot, &snapshot.split)
        );
        assert_eq!(
            additional_split_data(&snapshot, &snapshot.split, &summary).len(),
            19
        );
        assert_eq!(
            additional_split_data_multiplexed(&snapshot, &snapshot.split, &summary).len(),
            18
        );
    }

    #[test]
    fn test_workout_summary_layouts() {
        let snapshot = rowing_snapshot();
        let summary = Pm5Summary {
            log_time: LogTimestamp {
                year: 2024,
                month: 3,
                day: 17,
                hour: 18,
                minute: 5,
            },
            ..Default::default()
        };
        let direct = workout_summary(&snapshot, &summary);
        assert_eq!(direct.len(), 20);
        assert_eq!(workout_summary_multiplexed(&snapshot, &summary).len(), 18);
        assert_eq!(&direct[0..2], &summary.log_time.date_field().to_le_bytes());
        assert_eq!(&direct[2..4], &[5, 18]);
        assert_eq!(&direct[18..20], &1260u16.to_le_bytes());

        assert_eq!(additional_workout_summary(&snapshot, &summary).len(), 19);
        assert_eq!(
            additional_workout_summary_multiplexed(&snapshot, &summary).len(),
            17
        );
        assert_eq!(additional_workout_summary_2(&snapshot, &summary).len(), 10);
    }

    #[test]
    fn test_force_curve_chunking() {
        let curve: Vec<f64> = (0..73).map(|i| f64::from(i) * 10.0).collect();
        let frames = force_curve_frames(&curve, FORCE_CURVE_VALUES_PER_FRAME);
        assert_eq!(frames.len(), 9);

        let mut decoded = Vec::new();
        for (sequence, frame) in frames.iter().enumerate() {
            let count = usize::from(frame[0] & 0x0F);
            assert_eq!(frame[0] >> 4, 9);
            assert_eq!(usize::from(frame[1]), sequence);
            assert_eq!(frame.len(), 2 + count * 2);
            decoded.extend(
                frame[2..]
                    .chunks(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]])),
            );
        }
        let expected: Vec<u16> = curve
            .iter()
            .map(|n| (n * NEWTON_TO_POUND_FORCE).round() as u16)
            .collect();
        assert_eq!(decoded, expected);
        assert_eq!(frames[8][0] & 0x0F, 1);
    }

    #[test]
    fn test_force_curve_empty_and_multiplexed() {
        assert!(force_curve_frames(&[], FORCE_CURVE_VALUES_PER_FRAME).is_empty());
        let frames = force_curve_frames(&[100.0; 16], FORCE_CURVE_VALUES_PER_MULTIPLEXED_FRAME);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0][0], 0x28);
        assert_eq!(frames[0].len(), 18);
    }

    #[test]
    fn test_long_force_curve_is_capped_at_fifteen_frames() {
        let frames = force_curve_frames(&[100.0; 200], FORCE_CURVE_VALUES_PER_FRAME);
        assert_eq!(frames.len(), MAX_FORCE_CURVE_FRAMES);
        assert!(frames.iter().all(|frame| frame[0] >> 4 == 15));
        assert_eq!(frames.last().unwrap()[1], 14);
    }

    #[test]
    fn test_shared_layouts_match_direct_frames() {
        let snapshot = rowing_snapshot();
        let summary = Pm5Summary::default();
        assert_eq!(
            split_data_multiplexed(&snapshot, &snapshot.split),
            split_data(&snapshot, &snapshot.split)
        );
        assert_eq!(
            additional_workout_summary_2_multiplexed(&snapshot, &summary),
            additional_workout_summary_2(&snapshot, &summary)
        );
    }

    #[test]
    fn test_log_timestamp_fields() {
        let time = chrono::NaiveDate::from_ymd_opt(2024, 3, 17)
            .unwrap()
            .and_hms_opt(18, 5, 42)
            .unwrap();
        let stamp = LogTimestamp::from_datetime(&time);
        assert_eq!(
            stamp,
            LogTimestamp {
                year: 2024,
                month: 3,
                day: 17,
                hour: 18,
                minute: 5,
            }
        );
        assert_eq!(stamp.date_field(), 3 | (17 << 4) | (24 << 9));
        assert_eq!(stamp.time_field(), 5 | (18 << 8));
    }
}
