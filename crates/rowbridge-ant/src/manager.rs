//! ANT+ stick manager
//!
//! Wraps the stick shared by the FE and heart-rate channels: loads the ANT+ network key
//! once, sets channels up and tears them down, and exposes the inbound message stream.

use rowbridge_core::{AntStick, BridgeResult};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::messages::{
    AntMessage, AntPage, ANT_PLUS_NETWORK, ANT_PLUS_NETWORK_KEY, ANT_PLUS_RF_FREQUENCY,
};

/// Parameters of one ANT channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub channel: u8,
    pub channel_type: u8,
    /// Zero on a slave channel matches any device
    pub device_number: u16,
    pub device_type: u8,
    pub transmission_type: u8,
    /// Message period in 1/32768 s
    pub period: u16,
    pub rf_frequency: u8,
}

impl ChannelConfig {
    /// Messages that set the channel up, in order
    pub fn setup_messages(&self) -> Vec<AntMessage> {
        vec![
            AntMessage::assign_channel(self.channel, self.channel_type, ANT_PLUS_NETWORK),
            AntMessage::channel_id(
                self.channel,
                self.device_number,
                self.device_type,
                self.transmission_type,
            ),
            AntMessage::channel_rf_frequency(self.channel, self.rf_frequency),
            AntMessage::channel_period(self.channel, self.period),
            AntMessage::open_channel(self.channel),
        ]
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel: 0,
            channel_type: 0,
            device_number: 0,
            device_type: 0,
            transmission_type: 0,
            period: 8192,
            rf_frequency: ANT_PLUS_RF_FREQUENCY,
        }
    }
}

// ----------------------------------------------------------------------------
// Manager
// ----------------------------------------------------------------------------

/// ANT+ stick shared by the FE and heart-rate roles
pub struct AntPlusManager {
    stick: Arc<dyn AntStick>,
}

impl AntPlusManager {
    pub fn new(stick: Arc<dyn AntStick>) -> Self {
        Self { stick }
    }

    /// Reset the stick and load the ANT+ network key
    pub async fn open(&self) -> BridgeResult<()> {
        self.send(&AntMessage::reset_system()).await?;
        self.send(&AntMessage::set_network_key(
            ANT_PLUS_NETWORK,
            &ANT_PLUS_NETWORK_KEY,
        ))
        .await?;
        info!("ANT+ stick ready");
        Ok(())
    }

    pub async fn send(&self, message: &AntMessage) -> BridgeResult<()> {
        let frame = message.encode();
        debug!("ANT+ out {}", hex::encode(&frame));
        self.stick.write(&frame).await
    }

    pub async fn open_channel(&self, config: &ChannelConfig) -> BridgeResult<()> {
        for message in config.setup_messages() {
            self.send(&message).await?;
        }
        info!(
            "ANT+ channel {} open (device type 0x{:02x}, device {})",
            config.channel, config.device_type, config.device_number
        );
        Ok(())
    }

    /// Close and unassign a channel; both steps run even if the first fails
    pub async fn close_channel(&self, channel: u8) -> BridgeResult<()> {
        let closed = self.send(&AntMessage::close_channel(channel)).await;
        if let Err(e) = &closed {
            warn!("ANT+ channel {} close failed: {}", channel, e);
        }
        self.send(&AntMessage::unassign_channel(channel)).await?;
        closed
    }

    pub async fn broadcast(&self, channel: u8, page: &AntPage) -> BridgeResult<()> {
        self.send(&AntMessage::broadcast_data(channel, page)).await
    }

    /// Framed messages received from the stick
    pub fn inbound(&self) -> broadcast::Receiver<Vec<u8>> {
        self.stick.inbound()
    }

    /// Release the stick
    pub async fn close(&self) -> BridgeResult<()> {
        self.send(&AntMessage::reset_system()).await?;
        self.stick.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::message_id;
    use rowbridge_core::testing::LoopbackAntStick;

    fn ids(stick: &LoopbackAntStick) -> Vec<u8> {
        stick.written().iter().map(|frame| frame[2]).collect()
    }

    #[tokio::test]
    async fn test_open_loads_network_key() {
        let stick = Arc::new(LoopbackAntStick::new());
        let manager = AntPlusManager::new(stick.clone());
        manager.open().await.unwrap();
        assert_eq!(ids(&stick), vec![message_id::RESET_SYSTEM, message_id::NETWORK_KEY]);
        assert_eq!(&stick.written()[1][4..12], &ANT_PLUS_NETWORK_KEY);
    }

    #[tokio::test]
    async fn test_channel_lifecycle() {
        let stick = Arc::new(LoopbackAntStick::new());
        let manager = AntPlusManager::new(stick.clone());
        let config = ChannelConfig {
            channel: 1,
            ..Default::default()
        };
        manager.open_channel(&config).await.unwrap();
        manager.close_channel(1).await.unwrap();
        assert_eq!(
            ids(&stick),
            vec![
                message_id::ASSIGN_CHANNEL,
                message_id::CHANNEL_ID,
                message_id::CHANNEL_RF_FREQUENCY,
                message_id::CHANNEL_PERIOD,
                message_id::OPEN_CHANNEL,
                message_id::CLOSE_CHANNEL,
                message_id::UNASSIGN_CHANNEL,
            ]
        );
    }

    #[tokio::test]
    async fn test_close_releases_stick() {
        let stick = Arc::new(LoopbackAntStick::new());
        let manager = AntPlusManager::new(stick.clone());
        manager.close().await.unwrap();
        assert_eq!(stick.close_calls(), 1);
    }
}
