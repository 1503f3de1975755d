//! Publishing a whole rowing session through the MQTT bridge

use std::sync::Arc;

use rowbridge_core::testing::LoopbackMqttClient;
use rowbridge_core::{
    event_channel, DeviceProfile, MetricsContext, MetricsSnapshot, PeripheralConfig,
};
use rowbridge_mqtt::MqttBridge;
use serde_json::Value;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn at(strokes: u32, context: MetricsContext) -> MetricsSnapshot {
    let mut snapshot = MetricsSnapshot {
        metrics_context: context,
        cycle_pace: 125.0,
        ..Default::default()
    };
    snapshot.workout.number_of_strokes = strokes;
    snapshot
}

// ----------------------------------------------------------------------------
// Session
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_session_edges_are_published_in_order() {
    let client = Arc::new(LoopbackMqttClient::new());
    let (tx, _rx) = event_channel();
    let bridge = MqttBridge::new(client.clone(), &PeripheralConfig::default(), tx);
    bridge.attach().await.unwrap();

    let sequence = [
        MetricsContext { is_session_start: true, ..Default::default() },
        MetricsContext { is_drive_start: true, is_moving: true, ..Default::default() },
        MetricsContext { is_recovery_start: true, is_moving: true, ..Default::default() },
        MetricsContext { is_moving: true, ..Default::default() },
        MetricsContext { is_pause_start: true, ..Default::default() },
        MetricsContext { is_pause_end: true, ..Default::default() },
        MetricsContext { is_split_end: true, is_interval_end: true, ..Default::default() },
        MetricsContext { is_session_stop: true, ..Default::default() },
    ];
    for (strokes, context) in sequence.into_iter().enumerate() {
        bridge.notify_data(&at(strokes as u32, context)).await.unwrap();
    }

    let strokes: Vec<u64> = client
        .published()
        .iter()
        .map(|(topic, payload)| {
            assert_eq!(topic, "OpenRowingMonitor/rower/metrics");
            let json: Value = serde_json::from_slice(payload).unwrap();
            assert_eq!(json["pace"], 125.0);
            json["totalNumberOfStrokes"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(strokes, vec![0, 2, 4, 5, 6, 7]);

    bridge.destroy().await.unwrap();
}
