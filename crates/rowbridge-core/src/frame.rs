//! Little-endian frame builder shared by every wire codec
//!
//! Each write appends exactly the width of its field. Anything that cannot be represented
//! in that width (negative, NaN, infinite, absent or too large) is written as zero bytes so
//! that fixed-offset parsers on the other side never lose alignment.

use smallvec::SmallVec;
use tracing::debug;

/// Largest frame most BLE centrals accept without MTU negotiation
pub const DEFAULT_FRAME_CAPACITY: usize = 20;

// ----------------------------------------------------------------------------
// Value Conversion
// ----------------------------------------------------------------------------

/// A value that can be written into an unsigned frame field
pub trait FrameValue: Copy {
    /// The non-negative integer to encode, or `None` when the value is not representable
    fn to_unsigned(self) -> Option<u64>;
}

impl FrameValue for f64 {
    fn to_unsigned(self) -> Option<u64> {
        if !self.is_finite() || self < 0.0 {
            return None;
        }
        let truncated = self.trunc();
        // 2^64 is the first value that no longer fits
        if truncated >= 18_446_744_073_709_551_616.0 {
            return None;
        }
        Some(truncated as u64)
    }
}

impl FrameValue for f32 {
    fn to_unsigned(self) -> Option<u64> {
        f64::from(self).to_unsigned()
    }
}

macro_rules! unsigned_frame_value {
    ($($ty:ty),*) => {
        $(impl FrameValue for $ty {
            fn to_unsigned(self) -> Option<u64> {
                Some(self as u64)
            }
        })*
    };
}

macro_rules! signed_frame_value {
    ($($ty:ty),*) => {
        $(impl FrameValue for $ty {
            fn to_unsigned(self) -> Option<u64> {
                u64::try_from(self).ok()
            }
        })*
    };
}

unsigned_frame_value!(u8, u16, u32, u64, usize);
signed_frame_value!(i8, i16, i32, i64, isize);

impl<T: FrameValue> FrameValue for Option<T> {
    fn to_unsigned(self) -> Option<u64> {
        self.and_then(FrameValue::to_unsigned)
    }
}

// ----------------------------------------------------------------------------
// Frame Builder
// ----------------------------------------------------------------------------

/// Append-only little-endian frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuilder {
    bytes: SmallVec<[u8; DEFAULT_FRAME_CAPACITY]>,
}

impl FrameBuilder {
    /// Create an empty frame
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_u8(&mut self, value: impl FrameValue) -> &mut Self {
        self.write_le(value.to_unsigned(), 1)
    }

    pub fn write_u16_le(&mut self, value: impl FrameValue) -> &mut Self {
        self.write_le(value.to_unsigned(), 2)
    }

    pub fn write_u24_le(&mut self, value: impl FrameValue) -> &mut Self {
        self.write_le(value.to_unsigned(), 3)
    }

    pub fn write_u32_le(&mut self, value: impl FrameValue) -> &mut Self {
        self.write_le(value.to_unsigned(), 4)
    }

    /// Append raw bytes as they are
    pub fn write_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(data);
        self
    }

    fn write_le(&mut self, value: Option<u64>, width: usize) -> &mut Self {
        let max = u64::MAX >> (64 - width * 8);
        let raw = match value {
            Some(v) if v <= max => v,
            other => {
                debug!(?other, width, "Unrepresentable frame value, writing zero bytes");
                0
            }
        };
        self.bytes.extend_from_slice(&raw.to_le_bytes()[..width]);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Finish the frame
    pub fn build(self) -> Vec<u8> {
        self.bytes.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_max_values_fill_all_bytes() {
        let mut frame = FrameBuilder::new();
        frame.write_u8(255).write_u16_le(65535).write_u24_le(16_777_215);
        assert_eq!(frame.as_bytes(), &[0xFF; 6]);

        let mut zeros = FrameBuilder::new();
        zeros.write_u8(0).write_u16_le(0).write_u24_le(0);
        assert_eq!(zeros.build(), vec![0u8; 6]);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut frame = FrameBuilder::new();
        frame.write_u16_le(0x1234).write_u24_le(0x0A0B0C).write_u32_le(0x01020304u32);
        assert_eq!(
            frame.build(),
            vec![0x34, 0x12, 0x0C, 0x0B, 0x0A, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_fractions_round_toward_zero() {
        let mut frame = FrameBuilder::new();
        frame.write_u8(3.99).write_u16_le(256.5);
        assert_eq!(frame.build(), vec![3, 0x00, 0x01]);
    }

    #[test]
    fn test_malformed_values_write_zeros() {
        let mut frame = FrameBuilder::new();
        frame
            .write_u8(-1.0)
            .write_u16_le(f64::NAN)
            .write_u24_le(f64::INFINITY)
            .write_u32_le(None::<f64>);
        assert_eq!(frame.build(), vec![0u8; 10]);
    }

    #[test]
    fn test_too_large_values_write_zeros() {
        let mut frame = FrameBuilder::new();
        frame.write_u8(256).write_u16_le(70_000.0).write_u24_le(16_777_216u32);
        assert_eq!(frame.build(), vec![0u8; 6]);
    }

    proptest! {
        #[test]
        fn test_width_is_fixed(value in proptest::num::f64::ANY) {
            let mut frame = FrameBuilder::new();
            frame.write_u8(value).write_u16_le(value).write_u24_le(value).write_u32_le(value);
            prop_assert_eq!(frame.len(), 10);
        }

        #[test]
        fn test_negative_values_are_zero(value in i64::MIN..0i64) {
            let mut frame = FrameBuilder::new();
            frame.write_u16_le(value).write_u32_le(value as f64);
            prop_assert_eq!(frame.build(), vec![0u8; 6]);
        }

        #[test]
        fn test_out_of_range_u16_is_zero(value in 65_536u64..u64::MAX) {
            let mut frame = FrameBuilder::new();
            frame.write_u16_le(value);
            prop_assert_eq!(frame.build(), vec![0u8; 2]);
        }

        #[test]
        fn test_in_range_u24_roundtrips(value in 0u32..16_777_216u32) {
            let mut frame = FrameBuilder::new();
            frame.write_u24_le(value);
            let bytes = frame.build();
            let decoded = u32::from(bytes[0]) | u32::from(bytes[1]) << 8 | u32::from(bytes[2]) << 16;
            prop_assert_eq!(decoded, value);
        }
    }
}
