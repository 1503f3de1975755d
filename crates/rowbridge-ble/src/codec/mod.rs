//! Wire codecs of the BLE profiles
//!
//! Every encoder is a pure function from a snapshot to the bytes of one characteristic.

pub mod cycling;
pub mod ftms;
pub mod heart_rate;
pub mod pm5;
