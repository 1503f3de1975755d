//! Segment merging for pauses the PM5 vocabulary cannot express
//!
//! Both functions take their inputs by reference and return a new record.

use crate::metrics::{MetricStats, SegmentMetrics};

/// Glue a planned rest onto the active interval before it
///
/// Moving time comes from the active record and rest time from the pause record; the total
/// time is the sum of both.
pub fn append_pause_interval_to_active_interval(
    active: &SegmentMetrics,
    pause: &SegmentMetrics,
) -> SegmentMetrics {
    let mut merged = *active;
    merged.time_spent.total = active.time_spent.total + pause.time_spent.total;
    merged.time_spent.moving = active.time_spent.moving;
    merged.time_spent.rest = pause.time_spent.rest;
    merged
}

/// Combine the splits before and after an unplanned pause as if they were one split
pub fn merge_two_splits(first: &SegmentMetrics, second: &SegmentMetrics) -> SegmentMetrics {
    let total_time = first.time_spent.total + second.time_spent.total;
    let (first_weight, second_weight) = if total_time > 0.0 {
        (
            first.time_spent.total / total_time,
            second.time_spent.total / total_time,
        )
    } else {
        (0.5, 0.5)
    };
    let weighted = |a: &MetricStats, b: &MetricStats| MetricStats {
        average: a.average * first_weight + b.average * second_weight,
        minimum: a.minimum.min(b.minimum),
        maximum: a.maximum.max(b.maximum),
    };

    let mut merged = *first;
    merged.number_of_strokes = first.number_of_strokes + second.number_of_strokes;
    merged.time_spent.total = total_time;
    merged.time_spent.moving = first.time_spent.moving + second.time_spent.moving;
    merged.time_spent.rest = first.time_spent.rest + second.time_spent.rest;
    merged.distance.from_start = first.distance.from_start + second.distance.from_start;
    merged.calories.total_spent = first.calories.total_spent + second.calories.total_spent;
    merged.calories.average_per_hour = first.calories.average_per_hour * first_weight
        + second.calories.average_per_hour * second_weight;

    merged.power = weighted(&first.power, &second.power);
    merged.stroke_rate = weighted(&first.stroke_rate, &second.stroke_rate);
    merged.stroke_distance = weighted(&first.stroke_distance, &second.stroke_distance);
    merged.drag_factor = weighted(&first.drag_factor, &second.drag_factor);

    // Velocity and pace are reciprocal, derive both from the combined distance
    let velocity = if total_time > 0.0 {
        merged.distance.from_start / total_time
    } else {
        0.0
    };
    merged.linear_velocity = MetricStats {
        average: velocity,
        minimum: first.linear_velocity.minimum.min(second.linear_velocity.minimum),
        maximum: first.linear_velocity.maximum.max(second.linear_velocity.maximum),
    };
    merged.pace = MetricStats {
        average: if velocity > 0.0 { 500.0 / velocity } else { f64::INFINITY },
        minimum: first.pace.minimum.min(second.pace.minimum),
        maximum: first.pace.maximum.max(second.pace.maximum),
    };
    merged
}
