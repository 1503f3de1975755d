//! Logging transports
//!
//! Stand-ins for the ANT+ USB stick and the MQTT broker connection that write their
//! traffic to the log. They let the bridge run end to end on a host without the hardware.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use rowbridge_core::{AntStick, BridgeResult, MqttClient, TransportError};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ----------------------------------------------------------------------------
// ANT+
// ----------------------------------------------------------------------------

/// ANT stick that logs every frame it is asked to send
pub struct LoggingAntStick {
    inbound: broadcast::Sender<Vec<u8>>,
    frames: AtomicUsize,
}

impl Default for LoggingAntStick {
    fn default() -> Self {
        let (inbound, _) = broadcast::channel(16);
        Self {
            inbound,
            frames: AtomicUsize::new(0),
        }
    }
}

impl LoggingAntStick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames written since the stick was created
    pub fn frames_written(&self) -> usize {
        self.frames.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AntStick for LoggingAntStick {
    async fn write(&self, message: &[u8]) -> BridgeResult<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        debug!("ANT stick <- {}", hex::encode(message));
        Ok(())
    }

    fn inbound(&self) -> broadcast::Receiver<Vec<u8>> {
        self.inbound.subscribe()
    }

    async fn close(&self) -> BridgeResult<()> {
        info!(
            "ANT stick closed after {} frames",
            self.frames.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// MQTT
// ----------------------------------------------------------------------------

/// MQTT client that logs publications and lets the CLI deliver messages
#[derive(Default)]
pub struct LoggingMqttClient {
    subscriptions: Mutex<HashMap<String, mpsc::UnboundedSender<Vec<u8>>>>,
    published: AtomicUsize,
    disconnected: AtomicBool,
}

impl LoggingMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` on `topic`; false when nobody subscribed
    pub fn inject(&self, topic: &str, payload: Vec<u8>) -> bool {
        guard(&self.subscriptions)
            .get(topic)
            .is_some_and(|tx| tx.send(payload).is_ok())
    }

    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        guard(&self.subscriptions).keys().cloned().collect()
    }
}

#[async_trait]
impl MqttClient for LoggingMqttClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> BridgeResult<()> {
        if self.disconnected.load(Ordering::Relaxed) {
            return Err(TransportError::Closed.into());
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        info!("MQTT {} {}", topic, String::from_utf8_lossy(&payload));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> BridgeResult<mpsc::UnboundedReceiver<Vec<u8>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        guard(&self.subscriptions).insert(topic.to_string(), tx);
        self.disconnected.store(false, Ordering::Relaxed);
        debug!("MQTT subscribed to {}", topic);
        Ok(rx)
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        guard(&self.subscriptions).clear();
        self.disconnected.store(true, Ordering::Relaxed);
        info!(
            "MQTT disconnected after {} messages",
            self.published.load(Ordering::Relaxed)
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inject_reaches_subscriber() {
        let client = LoggingMqttClient::new();
        assert!(!client.inject("a/b", b"x".to_vec()));

        let mut rx = client.subscribe("a/b").await.unwrap();
        assert!(client.inject("a/b", b"x".to_vec()));
        assert_eq!(rx.recv().await, Some(b"x".to_vec()));
    }

    #[tokio::test]
    async fn test_publish_after_disconnect_fails() {
        let client = LoggingMqttClient::new();
        client.publish("t", b"{}".to_vec()).await.unwrap();
        client.disconnect().await.unwrap();
        assert!(client.publish("t", b"{}".to_vec()).await.is_err());
        assert_eq!(client.published_count(), 1);
        assert!(client.subscribed_topics().is_empty());
    }

    #[tokio::test]
    async fn test_stick_counts_frames() {
        let stick = LoggingAntStick::new();
        stick.write(&[0xA4, 0x01, 0x4A, 0x00, 0xEF]).await.unwrap();
        assert_eq!(stick.frames_written(), 1);
    }
}
