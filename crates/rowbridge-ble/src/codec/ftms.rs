//! Fitness Machine Service frames

use rowbridge_core::{FrameBuilder, MetricsSnapshot, PeripheralStatus};

use crate::protocol::{ftms_op, FitnessMachineType, ResultCode};

/// Fitness machine features and target settings of the rower
pub const ROWER_FEATURES: [u8; 8] = [0x26, 0x56, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Fitness machine features and target settings of the indoor bike
pub const INDOOR_BIKE_FEATURES: [u8; 8] = [0x06, 0x56, 0x00, 0x00, 0x00, 0x20, 0x00, 0x00];

// Flag bits shared by both data characteristics
const FLAG_HEART_RATE: u8 = 0x02;

/// Rower Data (0x2AD1)
///
/// Stroke rate and count, total distance, instantaneous pace, power, expended energy,
/// heart rate when known and elapsed moving time.
pub fn rower_data(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let workout = &snapshot.workout;
    let heartrate = snapshot.heartrate.filter(|hr| *hr > 0.0);

    let mut frame = FrameBuilder::new();
    // average stroke rate, average pace and average power are not reported
    frame.write_u8(0x2C);
    frame.write_u8(if heartrate.is_some() { 0x09 | FLAG_HEART_RATE } else { 0x09 });

    frame.write_u8((snapshot.cycle_stroke_rate * 2.0).round());
    frame.write_u16_le(workout.number_of_strokes);
    frame.write_u24_le(workout.distance.from_start.round());
    // 0xFFFF when the pace is unknown or does not fit
    let pace = snapshot
        .finite_pace()
        .map(f64::round)
        .filter(|pace| *pace < 65535.0)
        .unwrap_or(65535.0);
    frame.write_u16_le(pace);
    frame.write_u16_le(snapshot.cycle_power.round());
    frame.write_u16_le(workout.calories.total_spent.round());
    frame.write_u16_le(workout.calories.average_per_hour.round());
    frame.write_u8((workout.calories.average_per_hour / 60.0).round());
    if let Some(hr) = heartrate {
        frame.write_u8(hr.round());
    }
    frame.write_u16_le(workout.time_spent.moving.round());
    frame.build()
}

/// Indoor Bike Data (0x2AD2)
///
/// The rower is presented as a bike: speed, stroke rate as cadence, distance, power,
/// energy, heart rate and elapsed time.
pub fn indoor_bike_data(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let workout = &snapshot.workout;
    let heartrate = snapshot.heartrate.filter(|hr| *hr > 0.0);

    let mut frame = FrameBuilder::new();
    frame.write_u8(0x54);
    frame.write_u8(if heartrate.is_some() { 0x09 | FLAG_HEART_RATE } else { 0x09 });

    // km/h with 0.01 resolution
    frame.write_u16_le((snapshot.cycle_linear_velocity * 3.6 * 100.0).round());
    // rpm with 0.5 resolution
    frame.write_u16_le((snapshot.cycle_stroke_rate * 2.0).round());
    frame.write_u24_le(workout.distance.from_start.round());
    frame.write_u16_le(snapshot.cycle_power.round());
    frame.write_u16_le(workout.calories.total_spent.round());
    frame.write_u16_le(workout.calories.average_per_hour.round());
    frame.write_u8((workout.calories.average_per_hour / 60.0).round());
    if let Some(hr) = heartrate {
        frame.write_u8(hr.round());
    }
    frame.write_u16_le(workout.time_spent.moving.round());
    frame.build()
}

/// Fitness Machine Status (0x2ADA) for a session status change
pub fn machine_status(status: PeripheralStatus) -> Vec<u8> {
    match status {
        PeripheralStatus::Reset => vec![0x01],
        PeripheralStatus::StoppedOrPausedByUser => vec![0x02, 0x01],
        PeripheralStatus::StartedOrResumedByUser => vec![0x04],
    }
}

/// Control point response indication
pub fn control_point_response(op_code: u8, result: ResultCode) -> Vec<u8> {
    vec![ftms_op::RESPONSE_CODE, op_code, result as u8]
}

/// Service data advertised with the Fitness Machine Service UUID
pub fn advertising_service_data(machine: FitnessMachineType) -> Vec<u8> {
    let mut frame = FrameBuilder::new();
    // fitness machine available
    frame.write_u8(0x01);
    frame.write_u16_le(machine.type_bits());
    frame.build()
}
