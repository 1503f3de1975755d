//! Heart Rate Measurement and Battery Level parsing

use rowbridge_core::HeartRateMeasurement;

const FLAG_VALUE_U16: u8 = 0x01;
const FLAG_ENERGY_EXPENDED: u8 = 0x08;
const FLAG_RR_INTERVALS: u8 = 0x10;

/// Parse a Heart Rate Measurement (0x2A37) notification
///
/// Returns `None` for frames too short for the fields their flags announce.
pub fn parse_heart_rate_measurement(value: &[u8]) -> Option<HeartRateMeasurement> {
    let (&flags, mut rest) = value.split_first()?;

    let heartrate = if flags & FLAG_VALUE_U16 != 0 {
        let (bytes, tail) = split_u16(rest)?;
        rest = tail;
        f64::from(bytes)
    } else {
        let (&byte, tail) = rest.split_first()?;
        rest = tail;
        f64::from(byte)
    };

    let energy_expended = if flags & FLAG_ENERGY_EXPENDED != 0 {
        let (energy, tail) = split_u16(rest)?;
        rest = tail;
        Some(energy)
    } else {
        None
    };

    let rr_intervals = if flags & FLAG_RR_INTERVALS != 0 {
        rest.chunks_exact(2)
            .map(|pair| f64::from(u16::from_le_bytes([pair[0], pair[1]])) / 1024.0)
            .collect()
    } else {
        Vec::new()
    };

    Some(HeartRateMeasurement {
        heartrate: (heartrate > 0.0).then_some(heartrate),
        battery_level: None,
        rr_intervals,
        energy_expended,
    })
}

/// Parse a Battery Level (0x2A19) value in percent
pub fn parse_battery_level(value: &[u8]) -> Option<f64> {
    value
        .first()
        .filter(|level| **level <= 100)
        .map(|level| f64::from(*level))
}

fn split_u16(bytes: &[u8]) -> Option<(u16, &[u8])> {
    match bytes {
        [lo, hi, rest @ ..] => Some((u16::from_le_bytes([*lo, *hi]), rest)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uint8_value() {
        let measurement = parse_heart_rate_measurement(&[0x00, 72]).unwrap();
        assert_eq!(measurement.heartrate, Some(72.0));
        assert!(measurement.rr_intervals.is_empty());
        assert_eq!(measurement.energy_expended, None);
    }

    #[test]
    fn test_uint16_value_with_energy_and_rr() {
        let frame = [0x19, 0x2C, 0x01, 0x10, 0x00, 0x00, 0x04, 0x00, 0x02];
        let measurement = parse_heart_rate_measurement(&frame).unwrap();
        assert_eq!(measurement.heartrate, Some(300.0));
        assert_eq!(measurement.energy_expended, Some(16));
        assert_eq!(measurement.rr_intervals, vec![1.0, 0.5]);
    }

    #[test]
    fn test_truncated_frames() {
        assert!(parse_heart_rate_measurement(&[]).is_none());
        assert!(parse_heart_rate_measurement(&[0x01, 0x50]).is_none());
        assert!(parse_heart_rate_measurement(&[0x08, 0x50, 0x01]).is_none());
    }

    #[test]
    fn test_zero_means_no_contact() {
        let measurement = parse_heart_rate_measurement(&[0x00, 0]).unwrap();
        assert_eq!(measurement.heartrate, None);
    }

    #[test]
    fn test_battery_level() {
        assert_eq!(parse_battery_level(&[87]), Some(87.0));
        assert_eq!(parse_battery_level(&[101]), None);
        assert_eq!(parse_battery_level(&[]), None);
    }
}
