//! ANT serial message framing
//!
//! Every message travels as `[0xA4][length][id][content...][checksum]` where the checksum
//! is the XOR of all preceding bytes.

use smallvec::SmallVec;

use crate::error::AntError;

pub const SYNC: u8 = 0xA4;

/// Longest content any message of this crate carries
pub const MAX_CONTENT_LEN: usize = 13;

/// Public ANT+ network key
pub const ANT_PLUS_NETWORK_KEY: [u8; 8] = [0xB9, 0xA5, 0x21, 0xFB, 0xBD, 0x72, 0xC3, 0x45];

/// ANT+ radio frequency, 2457 MHz
pub const ANT_PLUS_RF_FREQUENCY: u8 = 57;

/// Network number the ANT+ key is loaded into
pub const ANT_PLUS_NETWORK: u8 = 0;

/// Message identifiers
pub mod message_id {
    pub const CHANNEL_EVENT: u8 = 0x40;
    pub const UNASSIGN_CHANNEL: u8 = 0x41;
    pub const ASSIGN_CHANNEL: u8 = 0x42;
    pub const CHANNEL_PERIOD: u8 = 0x43;
    pub const CHANNEL_RF_FREQUENCY: u8 = 0x45;
    pub const NETWORK_KEY: u8 = 0x46;
    pub const RESET_SYSTEM: u8 = 0x4A;
    pub const OPEN_CHANNEL: u8 = 0x4B;
    pub const CLOSE_CHANNEL: u8 = 0x4C;
    pub const BROADCAST_DATA: u8 = 0x4E;
    pub const CHANNEL_ID: u8 = 0x51;
}

/// Channel types for assignment
pub mod channel_type {
    pub const BIDIRECTIONAL_SLAVE: u8 = 0x00;
    pub const BIDIRECTIONAL_MASTER: u8 = 0x10;
}

/// Eight-byte ANT+ data page
pub type AntPage = [u8; 8];

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

// ----------------------------------------------------------------------------
// Messages
// ----------------------------------------------------------------------------

/// One ANT serial message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AntMessage {
    pub id: u8,
    pub content: SmallVec<[u8; MAX_CONTENT_LEN]>,
}

impl AntMessage {
    pub fn new(id: u8, content: &[u8]) -> Self {
        Self {
            id,
            content: SmallVec::from_slice(content),
        }
    }

    /// Framed bytes ready for the stick
    pub fn encode(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.content.len() + 4);
        frame.push(SYNC);
        frame.push(self.content.len() as u8);
        frame.push(self.id);
        frame.extend_from_slice(&self.content);
        frame.push(checksum(&frame));
        frame
    }

    /// Parse one framed message
    pub fn decode(frame: &[u8]) -> Result<Self, AntError> {
        let (&sync, rest) = frame.split_first().ok_or(AntError::Truncated {
            expected: 4,
            actual: 0,
        })?;
        if sync != SYNC {
            return Err(AntError::InvalidSync(sync));
        }
        let length = usize::from(rest.first().copied().unwrap_or_default());
        if length > MAX_CONTENT_LEN {
            return Err(AntError::ContentTooLong(length));
        }
        let expected = length + 4;
        if frame.len() < expected {
            return Err(AntError::Truncated {
                expected,
                actual: frame.len(),
            });
        }
        let computed = checksum(&frame[..expected - 1]);
        let received = frame[expected - 1];
        if computed != received {
            return Err(AntError::ChecksumMismatch {
                expected: computed,
                actual: received,
            });
        }
        Ok(Self::new(frame[2], &frame[3..expected - 1]))
    }

    pub fn reset_system() -> Self {
        Self::new(message_id::RESET_SYSTEM, &[0x00])
    }

    pub fn set_network_key(network: u8, key: &[u8; 8]) -> Self {
        let mut content = [0u8; 9];
        content[0] = network;
        content[1..].copy_from_slice(key);
        Self::new(message_id::NETWORK_KEY, &content)
    }

    pub fn assign_channel(channel: u8, channel_type: u8, network: u8) -> Self {
        Self::new(message_id::ASSIGN_CHANNEL, &[channel, channel_type, network])
    }

    pub fn channel_id(
        channel: u8,
        device_number: u16,
        device_type: u8,
        transmission_type: u8,
    ) -> Self {
        let [lo, hi] = device_number.to_le_bytes();
        Self::new(
            message_id::CHANNEL_ID,
            &[channel, lo, hi, device_type, transmission_type],
        )
    }

    pub fn channel_rf_frequency(channel: u8, frequency: u8) -> Self {
        Self::new(message_id::CHANNEL_RF_FREQUENCY, &[channel, frequency])
    }

    pub fn channel_period(channel: u8, period: u16) -> Self {
        let [lo, hi] = period.to_le_bytes();
        Self::new(message_id::CHANNEL_PERIOD, &[channel, lo, hi])
    }

    pub fn open_channel(channel: u8) -> Self {
        Self::new(message_id::OPEN_CHANNEL, &[channel])
    }

    pub fn close_channel(channel: u8) -> Self {
        Self::new(message_id::CLOSE_CHANNEL, &[channel])
    }

    pub fn unassign_channel(channel: u8) -> Self {
        Self::new(message_id::UNASSIGN_CHANNEL, &[channel])
    }

    pub fn broadcast_data(channel: u8, page: &AntPage) -> Self {
        let mut content = [0u8; 9];
        content[0] = channel;
        content[1..].copy_from_slice(page);
        Self::new(message_id::BROADCAST_DATA, &content)
    }

    /// Channel and page of a broadcast data message
    pub fn broadcast_page(&self) -> Option<(u8, AntPage)> {
        if self.id != message_id::BROADCAST_DATA {
            return None;
        }
        match self.content.as_slice() {
            [channel, page @ ..] if page.len() >= 8 => {
                let mut data = [0u8; 8];
                data.copy_from_slice(&page[..8]);
                Some((*channel, data))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_frame() {
        assert_eq!(
            AntMessage::reset_system().encode(),
            vec![0xA4, 0x01, 0x4A, 0x00, 0xEF]
        );
    }

    #[test]
    fn test_channel_id_layout() {
        let frame = AntMessage::channel_id(1, 57063, 0x11, 0x05).encode();
        assert_eq!(&frame[..3], &[0xA4, 0x05, 0x51]);
        assert_eq!(&frame[3..8], &[0x01, 0xE7, 0xDE, 0x11, 0x05]);
    }

    #[test]
    fn test_decode_round_trip_and_checksum() {
        let message = AntMessage::broadcast_data(0, &[0x04, 0, 0, 0, 0, 0, 0, 72]);
        let mut frame = message.encode();
        assert_eq!(AntMessage::decode(&frame).unwrap(), message);
        assert_eq!(message.broadcast_page(), Some((0, [0x04, 0, 0, 0, 0, 0, 0, 72])));

        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(matches!(
            AntMessage::decode(&frame),
            Err(AntError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(AntMessage::decode(&[0x00, 0x01]), Err(AntError::InvalidSync(0x00)));
        assert!(matches!(
            AntMessage::decode(&[SYNC, 0x09, 0x4E, 0x00]),
            Err(AntError::Truncated { expected: 13, .. })
        ));
        assert!(AntMessage::decode(&[]).is_err());
    }

    #[test]
    fn test_non_broadcast_has_no_page() {
        assert_eq!(AntMessage::open_channel(1).broadcast_page(), None);
    }
}
