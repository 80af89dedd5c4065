//! Typed channel for event egress messages
//!
//! Provides a non-blocking way to hand attributed events to the publishers.
//! Uses bounded mpsc channels to prevent unbounded memory growth.

use crate::domain::types::{AttributedEvent, LogRecord};
use crate::infra::metrics::Metrics;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Messages that can be sent to the publishers
#[derive(Debug)]
pub enum EgressMessage {
    /// Keypad access event (PIN / fingerprint)
    Keypad(KeypadEventPayload),
    /// Manual operation event (handle / external key)
    Manual(ManualEventPayload),
}

/// Payload for keypad access events
#[derive(Debug, Clone, Serialize)]
pub struct KeypadEventPayload {
    pub smartlock_id: i64,
    /// Lock action code from the record
    pub action: i64,
    /// Resolved user identity (never empty)
    pub user: String,
    /// User label exactly as the device reported it
    pub original_user_name: String,
    /// "pin_code" or "fingerprint"
    pub access_method: String,
    /// Original timestamp string from the record
    pub timestamp: String,
    pub time_diff_seconds: f64,
    pub trigger_type: i64,
    pub source: i64,
    pub auth_id: String,
    pub state: i64,
    pub detection_reason: String,
    /// 1-based position in the batch; 1 is the newest event
    pub sequence_number: usize,
    pub total_events: usize,
    /// The raw log entry for downstream consumers
    pub raw_entry: LogRecord,
}

impl KeypadEventPayload {
    pub fn from_event(smartlock_id: i64, event: &AttributedEvent) -> Self {
        Self {
            smartlock_id,
            action: event.record.action,
            user: event.resolved_user.clone(),
            original_user_name: event.record.name.clone(),
            access_method: event.access_method.as_str().to_string(),
            timestamp: event.record.date.clone(),
            time_diff_seconds: event.age_seconds,
            trigger_type: event.record.trigger,
            source: event.record.source,
            auth_id: event.record.auth_id.clone(),
            state: event.record.state,
            detection_reason: event.detection_reason.label(),
            sequence_number: event.sequence_number,
            total_events: event.total_in_batch,
            raw_entry: event.record.clone(),
        }
    }
}

/// Payload for manual operation events
#[derive(Debug, Clone, Serialize)]
pub struct ManualEventPayload {
    pub smartlock_id: i64,
    pub action: i64,
    /// "manual_inside_handle", "manual_external_key", or "unknown"
    pub manual_type: String,
    /// Original timestamp string from the record
    pub timestamp: String,
    pub time_diff_seconds: f64,
    pub trigger_type: i64,
    pub user_name: String,
    /// The raw log entry for downstream consumers
    pub raw_entry: LogRecord,
}

impl ManualEventPayload {
    pub fn from_event(smartlock_id: i64, event: &AttributedEvent) -> Self {
        Self {
            smartlock_id,
            action: event.record.action,
            manual_type: event.access_method.as_str().to_string(),
            timestamp: event.record.date.clone(),
            time_diff_seconds: event.age_seconds,
            trigger_type: event.record.trigger,
            user_name: event.resolved_user.clone(),
            raw_entry: event.record.clone(),
        }
    }
}

/// Sender handle for egress messages
///
/// Clone this to share across multiple producers.
/// Non-blocking - if the channel is full, messages are dropped and counted.
#[derive(Clone)]
pub struct EgressSender {
    tx: mpsc::Sender<EgressMessage>,
    metrics: Arc<Metrics>,
}

impl EgressSender {
    pub fn new(tx: mpsc::Sender<EgressMessage>, metrics: Arc<Metrics>) -> Self {
        Self { tx, metrics }
    }

    /// Send a keypad access event for publishing
    pub fn send_keypad(&self, payload: KeypadEventPayload) {
        if self.tx.try_send(EgressMessage::Keypad(payload)).is_err() {
            self.metrics.record_payload_dropped();
        }
    }

    /// Send a manual operation event for publishing
    pub fn send_manual(&self, payload: ManualEventPayload) {
        if self.tx.try_send(EgressMessage::Manual(payload)).is_err() {
            self.metrics.record_payload_dropped();
        }
    }
}

/// Create a new egress channel pair
///
/// Returns (sender, receiver) where sender can be cloned and shared.
/// Buffer size determines how many messages can be queued.
pub fn create_egress_channel(
    buffer_size: usize,
    metrics: Arc<Metrics>,
) -> (EgressSender, mpsc::Receiver<EgressMessage>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EgressSender::new(tx, metrics), rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{AccessMethod, DetectionReason};
    use chrono::{TimeZone, Utc};

    fn sample_event() -> AttributedEvent {
        AttributedEvent {
            record: LogRecord {
                smartlock_id: 7,
                trigger: 255,
                source: 2,
                action: 1,
                state: 0,
                date: "2024-01-01T10:00:00Z".to_string(),
                name: "Nuki Keypad".to_string(),
                auth_id: "abc123".to_string(),
            },
            occurred_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
            age_seconds: 30.0,
            access_method: AccessMethod::Fingerprint,
            resolved_user: "Alice".to_string(),
            detection_reason: DetectionReason::SourceWithUser(2),
            sequence_number: 1,
            total_in_batch: 2,
        }
    }

    #[test]
    fn test_keypad_payload_from_event() {
        let payload = KeypadEventPayload::from_event(7, &sample_event());

        assert_eq!(payload.smartlock_id, 7);
        assert_eq!(payload.user, "Alice");
        assert_eq!(payload.original_user_name, "Nuki Keypad");
        assert_eq!(payload.access_method, "fingerprint");
        assert_eq!(payload.timestamp, "2024-01-01T10:00:00Z");
        assert_eq!(payload.detection_reason, "source_2_with_user");
        assert_eq!(payload.sequence_number, 1);
        assert_eq!(payload.total_events, 2);
    }

    #[test]
    fn test_keypad_payload_serializes() {
        let payload = KeypadEventPayload::from_event(7, &sample_event());
        let json = serde_json::to_string(&payload).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["user"], "Alice");
        assert_eq!(parsed["access_method"], "fingerprint");
        assert_eq!(parsed["raw_entry"]["name"], "Nuki Keypad");
        assert_eq!(parsed["raw_entry"]["authId"], "abc123");
    }

    #[test]
    fn test_manual_payload_from_event() {
        let mut event = sample_event();
        event.access_method = AccessMethod::ManualInsideHandle;
        event.resolved_user = "Unknown User".to_string();

        let payload = ManualEventPayload::from_event(7, &event);
        assert_eq!(payload.manual_type, "manual_inside_handle");
        assert_eq!(payload.user_name, "Unknown User");
    }

    #[tokio::test]
    async fn test_channel_round_trip() {
        let metrics = Arc::new(Metrics::new());
        let (sender, mut rx) = create_egress_channel(4, metrics);

        sender.send_keypad(KeypadEventPayload::from_event(7, &sample_event()));

        match rx.recv().await {
            Some(EgressMessage::Keypad(payload)) => assert_eq!(payload.user, "Alice"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_full_channel_drops_and_counts() {
        let metrics = Arc::new(Metrics::new());
        let (sender, _rx) = create_egress_channel(1, metrics.clone());

        sender.send_keypad(KeypadEventPayload::from_event(7, &sample_event()));
        sender.send_keypad(KeypadEventPayload::from_event(7, &sample_event()));

        let summary = metrics.report();
        assert_eq!(summary.payloads_dropped_total, 1);
    }
}
