//! Cycling Power and Cycling Speed and Cadence frames
//!
//! The rower is presented as a bike: the wheel turns once per centimeter of distance and the
//! crank once per stroke. Event times are moving time in the unit of each field, wrapped at
//! the field width.

use rowbridge_core::{FrameBuilder, MetricsSnapshot};

/// Wheel and crank revolution data supported
pub const CYCLING_POWER_FEATURES: u32 = 0x0000_000C;

/// Wheel and crank revolution data supported
pub const CSC_FEATURES: u16 = 0x0003;

/// Sensor location "other"
pub const SENSOR_LOCATION_OTHER: u8 = 0x00;

const CPS_RESPONSE_CODE: u8 = 0x20;
const SC_RESPONSE_CODE: u8 = 0x10;
const OP_CODE_NOT_SUPPORTED: u8 = 0x02;

fn wheel_revolutions(snapshot: &MetricsSnapshot) -> f64 {
    (snapshot.workout.distance.from_start * 100.0).round() % 4_294_967_296.0
}

fn crank_revolutions(snapshot: &MetricsSnapshot) -> f64 {
    f64::from(snapshot.workout.number_of_strokes % 65_536)
}

fn event_time(snapshot: &MetricsSnapshot, ticks_per_second: f64) -> f64 {
    (snapshot.workout.time_spent.moving * ticks_per_second).round() % 65_536.0
}

/// Cycling Power Measurement (0x2A63)
pub fn cycling_power_measurement(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = FrameBuilder::new();
    frame.write_u16_le(0x0030);
    frame.write_u16_le(snapshot.cycle_power.round());
    frame.write_u32_le(wheel_revolutions(snapshot));
    frame.write_u16_le(event_time(snapshot, 2048.0));
    frame.write_u16_le(crank_revolutions(snapshot));
    frame.write_u16_le(event_time(snapshot, 1024.0));
    frame.build()
}

/// Cycling Power Feature (0x2A65)
pub fn cycling_power_feature() -> Vec<u8> {
    CYCLING_POWER_FEATURES.to_le_bytes().to_vec()
}

/// CSC Measurement (0x2A5B)
pub fn csc_measurement(snapshot: &MetricsSnapshot) -> Vec<u8> {
    let mut frame = FrameBuilder::new();
    frame.write_u8(0x03);
    frame.write_u32_le(wheel_revolutions(snapshot));
    frame.write_u16_le(event_time(snapshot, 1024.0));
    frame.write_u16_le(crank_revolutions(snapshot));
    frame.write_u16_le(event_time(snapshot, 1024.0));
    frame.build()
}

/// CSC Feature (0x2A5C)
pub fn csc_feature() -> Vec<u8> {
    CSC_FEATURES.to_le_bytes().to_vec()
}

/// Answer to any Cycling Power Control Point write
pub fn cycling_power_control_response(op_code: u8) -> Vec<u8> {
    vec![CPS_RESPONSE_CODE, op_code, OP_CODE_NOT_SUPPORTED]
}

/// Answer to any SC Control Point write
pub fn sc_control_response(op_code: u8) -> Vec<u8> {
    vec![SC_RESPONSE_CODE, op_code, OP_CODE_NOT_SUPPORTED]
}
