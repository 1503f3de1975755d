//! MQTT bridge profile
//!
//! Publishes metrics on the edges a dashboard cares about and turns workout plans received on
//! the plans topic into `UpdateIntervalSettings` commands.

use async_trait::async_trait;
use rowbridge_core::{
    emit_control, parse_workout_plan, BridgeResult, ControlCommand, DeviceProfile, EventSender,
    MetricsSnapshot, MqttClient, PeripheralConfig,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::MqttBridgeError;
use crate::message::{is_publish_edge, metrics_topic, workout_plans_topic, MetricsMessage};

const PROFILE_NAME: &str = "MQTT";

/// Bridge between the rower and an MQTT broker
pub struct MqttBridge {
    client: Arc<dyn MqttClient>,
    metrics_topic: String,
    plans_topic: String,
    events: EventSender,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl MqttBridge {
    pub fn new(client: Arc<dyn MqttClient>, config: &PeripheralConfig, events: EventSender) -> Self {
        Self {
            client,
            metrics_topic: metrics_topic(&config.mqtt_machine_name),
            plans_topic: workout_plans_topic(&config.mqtt_machine_name),
            events,
            listener: Mutex::new(None),
        }
    }

    pub fn metrics_topic(&self) -> &str {
        &self.metrics_topic
    }

    pub fn plans_topic(&self) -> &str {
        &self.plans_topic
    }
}

async fn run_plan_listener(mut plans: mpsc::UnboundedReceiver<Vec<u8>>, events: EventSender) {
    while let Some(payload) = plans.recv().await {
        match parse_workout_plan(&payload) {
            Ok(plan) => {
                info!("{} received workout plan with {} intervals", PROFILE_NAME, plan.len());
                emit_control(&events, ControlCommand::UpdateIntervalSettings(plan));
            }
            Err(e) => {
                let err = MqttBridgeError::InvalidWorkoutPlan(e.to_string());
                warn!("{} dropping message: {}", PROFILE_NAME, err);
            }
        }
        if events.is_closed() {
            return;
        }
    }
    debug!("{} plan subscription ended", PROFILE_NAME);
}

#[async_trait]
impl DeviceProfile for MqttBridge {
    fn name(&self) -> &'static str {
        PROFILE_NAME
    }

    async fn attach(&self) -> BridgeResult<()> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Ok(());
        }
        let plans = self
            .client
            .subscribe(&self.plans_topic)
            .await
            .map_err(|e| MqttBridgeError::BrokerUnavailable(e.to_string()))?;
        *listener = Some(tokio::spawn(run_plan_listener(plans, self.events.clone())));
        info!("{} publishing to {}", PROFILE_NAME, self.metrics_topic);
        Ok(())
    }

    async fn destroy(&self) -> BridgeResult<()> {
        if let Some(listener) = self.listener.lock().await.take() {
            listener.abort();
        }
        self.client.disconnect().await?;
        info!("{} bridge stopped", PROFILE_NAME);
        Ok(())
    }

    async fn notify_data(&self, snapshot: &MetricsSnapshot) -> BridgeResult<()> {
        if !is_publish_edge(&snapshot.metrics_context) {
            return Ok(());
        }
        let payload = serde_json::to_vec(&MetricsMessage::from(snapshot))
            .map_err(MqttBridgeError::from)?;
        self.client.publish(&self.metrics_topic, payload).await
    }
}
