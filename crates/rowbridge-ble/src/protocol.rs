//! GATT UUIDs and protocol constants for the BLE fitness profiles

use uuid::Uuid;

/// Expand a 16-bit SIG-assigned UUID onto the Bluetooth base UUID
pub const fn uuid16(short: u16) -> Uuid {
    Uuid::from_u128(0x0000_0000_0000_1000_8000_0080_5F9B_34FB | ((short as u128) << 96))
}

/// Expand a PM5 short id onto the Concept2 base UUID
pub const fn pm5_uuid(short: u16) -> Uuid {
    Uuid::from_u128(0xCE06_0000_43E5_11E4_916C_0800_200C_9A66 | ((short as u128) << 96))
}

// ----------------------------------------------------------------------------
// Standard Services
// ----------------------------------------------------------------------------

pub const DEVICE_INFORMATION_SERVICE_UUID: Uuid = uuid16(0x180A);
pub const HEART_RATE_SERVICE_UUID: Uuid = uuid16(0x180D);
pub const BATTERY_SERVICE_UUID: Uuid = uuid16(0x180F);
pub const CYCLING_SPEED_CADENCE_SERVICE_UUID: Uuid = uuid16(0x1816);
pub const CYCLING_POWER_SERVICE_UUID: Uuid = uuid16(0x1818);
pub const FITNESS_MACHINE_SERVICE_UUID: Uuid = uuid16(0x1826);

// Device Information
pub const MODEL_NUMBER_UUID: Uuid = uuid16(0x2A24);
pub const SERIAL_NUMBER_UUID: Uuid = uuid16(0x2A25);
pub const FIRMWARE_REVISION_UUID: Uuid = uuid16(0x2A26);
pub const HARDWARE_REVISION_UUID: Uuid = uuid16(0x2A27);
pub const MANUFACTURER_NAME_UUID: Uuid = uuid16(0x2A29);

// Heart rate and battery
pub const HEART_RATE_MEASUREMENT_UUID: Uuid = uuid16(0x2A37);
pub const BATTERY_LEVEL_UUID: Uuid = uuid16(0x2A19);

// Cycling speed and cadence
pub const CSC_MEASUREMENT_UUID: Uuid = uuid16(0x2A5B);
pub const CSC_FEATURE_UUID: Uuid = uuid16(0x2A5C);
pub const SENSOR_LOCATION_UUID: Uuid = uuid16(0x2A5D);
pub const SC_CONTROL_POINT_UUID: Uuid = uuid16(0x2A55);

// Cycling power
pub const CYCLING_POWER_MEASUREMENT_UUID: Uuid = uuid16(0x2A63);
pub const CYCLING_POWER_FEATURE_UUID: Uuid = uuid16(0x2A65);
pub const CYCLING_POWER_CONTROL_POINT_UUID: Uuid = uuid16(0x2A66);

// Fitness machine
pub const FITNESS_MACHINE_FEATURE_UUID: Uuid = uuid16(0x2ACC);
pub const ROWER_DATA_UUID: Uuid = uuid16(0x2AD1);
pub const INDOOR_BIKE_DATA_UUID: Uuid = uuid16(0x2AD2);
pub const FITNESS_MACHINE_CONTROL_POINT_UUID: Uuid = uuid16(0x2AD9);
pub const FITNESS_MACHINE_STATUS_UUID: Uuid = uuid16(0x2ADA);

// ----------------------------------------------------------------------------
// PM5 Services
// ----------------------------------------------------------------------------

/// Advertised in the scan response of the PM5 profile
pub const PM5_BASE_UUID: Uuid = pm5_uuid(0x0000);
pub const PM5_DEVICE_INFORMATION_SERVICE_UUID: Uuid = pm5_uuid(0x0010);
pub const PM5_CONTROL_SERVICE_UUID: Uuid = pm5_uuid(0x0020);
pub const PM5_ROWING_SERVICE_UUID: Uuid = pm5_uuid(0x0030);

pub const PM5_MODEL_UUID: Uuid = pm5_uuid(0x0011);
pub const PM5_SERIAL_UUID: Uuid = pm5_uuid(0x0012);
pub const PM5_HARDWARE_REVISION_UUID: Uuid = pm5_uuid(0x0013);
pub const PM5_FIRMWARE_REVISION_UUID: Uuid = pm5_uuid(0x0014);
pub const PM5_MANUFACTURER_UUID: Uuid = pm5_uuid(0x0015);

pub const PM5_CONTROL_RECEIVE_UUID: Uuid = pm5_uuid(0x0021);
pub const PM5_CONTROL_TRANSMIT_UUID: Uuid = pm5_uuid(0x0022);

/// Rowing characteristics by their short id
pub mod pm5_char {
    pub const GENERAL_STATUS: u8 = 0x31;
    pub const ADDITIONAL_STATUS: u8 = 0x32;
    pub const ADDITIONAL_STATUS_2: u8 = 0x33;
    pub const SAMPLE_RATE: u8 = 0x34;
    pub const STROKE_DATA: u8 = 0x35;
    pub const ADDITIONAL_STROKE_DATA: u8 = 0x36;
    pub const SPLIT_DATA: u8 = 0x37;
    pub const ADDITIONAL_SPLIT_DATA: u8 = 0x38;
    pub const WORKOUT_SUMMARY: u8 = 0x39;
    pub const ADDITIONAL_WORKOUT_SUMMARY: u8 = 0x3A;
    pub const HEART_RATE_BELT_INFO: u8 = 0x3B;
    pub const ADDITIONAL_WORKOUT_SUMMARY_2: u8 = 0x3C;
    pub const FORCE_CURVE: u8 = 0x3D;
    pub const MULTIPLEXED: u8 = 0x80;
}

/// Full UUID of a PM5 rowing characteristic
pub const fn pm5_char_uuid(id: u8) -> Uuid {
    pm5_uuid(id as u16)
}

// ----------------------------------------------------------------------------
// Fitness Machine Control Point
// ----------------------------------------------------------------------------

pub mod ftms_op {
    pub const REQUEST_CONTROL: u8 = 0x00;
    pub const RESET: u8 = 0x01;
    pub const START_OR_RESUME: u8 = 0x07;
    pub const STOP_OR_PAUSE: u8 = 0x08;
    pub const SET_INDOOR_BIKE_SIMULATION: u8 = 0x11;
    pub const RESPONSE_CODE: u8 = 0x80;
}

/// Result codes of the fitness machine control point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultCode {
    Success = 0x01,
    OpCodeNotSupported = 0x02,
    InvalidParameter = 0x03,
    OperationFailed = 0x04,
    ControlNotPermitted = 0x05,
}

/// Machine type bits carried in the FTMS advertising service data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitnessMachineType {
    Rower,
    IndoorBike,
}

impl FitnessMachineType {
    pub fn type_bits(self) -> u16 {
        match self {
            Self::Rower => 1 << 4,
            Self::IndoorBike => 1 << 5,
        }
    }
}
