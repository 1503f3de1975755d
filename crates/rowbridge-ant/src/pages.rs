//! ANT+ FE-C data pages for a rower
//!
//! Every page is eight bytes. Byte 0 is the page number, the FE state sits in the upper
//! nibble of byte 7 on the FE specific pages.

use rowbridge_core::mapping::FitnessEquipmentState;
use rowbridge_core::FrameBuilder;

use crate::messages::AntPage;

pub const GENERAL_FE_DATA: u8 = 0x10;
pub const GENERAL_SETTINGS: u8 = 0x11;
pub const ROWER_DATA: u8 = 0x16;
pub const MANUFACTURER_INFO: u8 = 0x50;
pub const PRODUCT_INFO: u8 = 0x51;

/// Equipment type field of the general FE data page
pub const EQUIPMENT_TYPE_ROWER: u8 = 22;

/// Capability bit: distance traveled is reported
const CAPABILITY_DISTANCE: u8 = 0x04;

const INVALID: u8 = 0xFF;

// ----------------------------------------------------------------------------
// Session Data
// ----------------------------------------------------------------------------

/// Field values ready to be laid out into pages
///
/// Accumulators are already wrapped to their one-byte fields; instantaneous values are in
/// the unit of their field and written through `FrameBuilder`, which zeroes anything that
/// does not fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeSessionData {
    /// Elapsed time in 0.25 s
    pub elapsed_time: u8,
    /// Distance in meters
    pub distance: u8,
    pub strokes: u8,
    /// Speed in 0.001 m/s
    pub speed: f64,
    /// Strokes per minute
    pub cadence: f64,
    /// Watts
    pub power: f64,
    /// Stroke length in 0.01 m
    pub stroke_length: f64,
    pub state: FitnessEquipmentState,
}

impl Default for FeSessionData {
    fn default() -> Self {
        Self {
            elapsed_time: 0,
            distance: 0,
            strokes: 0,
            speed: 0.0,
            cadence: 0.0,
            power: 0.0,
            stroke_length: 0.0,
            state: FitnessEquipmentState::Ready,
        }
    }
}

fn finish(frame: &FrameBuilder) -> AntPage {
    let mut page = [0u8; 8];
    let bytes = frame.as_bytes();
    let len = bytes.len().min(page.len());
    page[..len].copy_from_slice(&bytes[..len]);
    page
}

// ----------------------------------------------------------------------------
// FE Specific Pages
// ----------------------------------------------------------------------------

/// Page 0x10: equipment type, elapsed time, distance, speed
pub fn general_fe_data(data: &FeSessionData) -> AntPage {
    let mut frame = FrameBuilder::new();
    frame
        .write_u8(GENERAL_FE_DATA)
        .write_u8(EQUIPMENT_TYPE_ROWER)
        .write_u8(data.elapsed_time)
        .write_u8(data.distance)
        .write_u16_le(data.speed)
        // heart rate comes from the strap's own channel
        .write_u8(INVALID)
        .write_u8(CAPABILITY_DISTANCE | data.state.as_u8());
    finish(&frame)
}

/// Page 0x11: stroke length, incline not supported, resistance
pub fn general_settings(data: &FeSessionData) -> AntPage {
    let mut frame = FrameBuilder::new();
    frame
        .write_u8(GENERAL_SETTINGS)
        .write_u8(INVALID)
        .write_u8(INVALID)
        .write_u8(data.stroke_length)
        // incline 0x7FFF means invalid
        .write_u16_le(0x7FFFu16)
        .write_u8(0u8)
        .write_u8(data.state.as_u8());
    finish(&frame)
}

/// Page 0x16: stroke count, cadence, instantaneous power
pub fn rower_data(data: &FeSessionData) -> AntPage {
    let mut frame = FrameBuilder::new();
    frame
        .write_u8(ROWER_DATA)
        .write_u8(INVALID)
        .write_u8(INVALID)
        .write_u8(data.strokes)
        .write_u8(data.cadence)
        .write_u16_le(data.power)
        .write_u8(data.state.as_u8());
    finish(&frame)
}

// ----------------------------------------------------------------------------
// Common Pages
// ----------------------------------------------------------------------------

/// Page 0x50: hardware revision, manufacturer and model number
pub fn manufacturer_info(hardware_revision: u8, manufacturer_id: u16, model_number: u16) -> AntPage {
    let mut frame = FrameBuilder::new();
    frame
        .write_u8(MANUFACTURER_INFO)
        .write_u8(INVALID)
        .write_u8(INVALID)
        .write_u8(hardware_revision)
        .write_u16_le(manufacturer_id)
        .write_u16_le(model_number);
    finish(&frame)
}

/// Page 0x51: software revision and serial number
pub fn product_info(software_revision: u8, serial_number: u32) -> AntPage {
    let mut frame = FrameBuilder::new();
    frame
        .write_u8(PRODUCT_INFO)
        .write_u8(INVALID)
        .write_u8(INVALID)
        .write_u8(software_revision)
        .write_u32_le(serial_number);
    finish(&frame)
}
