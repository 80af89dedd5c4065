//! Per-poll batch processing of keypad events
//!
//! Classifies every record of one poll cycle, attributes and admits the
//! keypad ones, and emits attributed events ordered most-recent-first with
//! 1-based sequence numbers. The keypad watermark advances once per batch,
//! after collection, so a failure on one record can never leave the
//! watermark partially advanced.

use crate::domain::timestamp::normalize;
use crate::domain::types::{AttributedEvent, EngineState, LogRecord};
use crate::services::admission::admit;
use crate::services::attribution::resolve;
use crate::services::classifier::classify;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Process one poll cycle's records and return the attributed keypad events,
/// newest first.
///
/// `records` is the activity log as returned by the API (newest first).
/// An error on one record (malformed timestamp) skips only that record;
/// partial-batch success is the required behavior.
pub fn process_batch(
    records: &[LogRecord],
    now: DateTime<Utc>,
    state: &mut EngineState,
    window_seconds: i64,
    mapping: &HashMap<String, String>,
) -> Vec<AttributedEvent> {
    let mut working: Vec<AttributedEvent> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        let classification = classify(record);
        if !classification.is_keypad {
            continue;
        }

        let occurred_at = match normalize(&record.date) {
            Ok(instant) => instant,
            Err(e) => {
                warn!(index = %index, error = %e, "log_timestamp_unparsable");
                continue;
            }
        };

        let age_seconds = (now - occurred_at).num_milliseconds() as f64 / 1000.0;
        let decision = admit(
            &record.date,
            age_seconds,
            window_seconds,
            state.last_keypad_event_timestamp.as_deref(),
        );
        if !decision.is_admitted() {
            debug!(
                index = %index,
                date = %record.date,
                decision = %decision.as_str(),
                "keypad_record_rejected"
            );
            continue;
        }

        let (access_method, resolved_user) = resolve(record, records, index, mapping);

        working.push(AttributedEvent {
            record: record.clone(),
            occurred_at,
            age_seconds,
            access_method,
            resolved_user,
            detection_reason: classification.reason,
            sequence_number: 0, // assigned after sorting
            total_in_batch: 0,
        });
    }

    if working.is_empty() {
        return working;
    }

    // Most recent first; sequence 1 is the newest qualifying event. The sort
    // is stable, so records with identical instants keep API order.
    working.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));

    let total = working.len();
    for (idx, event) in working.iter_mut().enumerate() {
        event.sequence_number = idx + 1;
        event.total_in_batch = total;
    }

    // Single watermark advance per batch: the newest admitted record's
    // original date string, compared lexicographically on the next cycle
    state.last_keypad_event_timestamp = Some(working[0].record.date.clone());
    state.last_keypad_event_user = Some(working[0].resolved_user.clone());

    working
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{
        AccessMethod, SOURCE_FINGERPRINT, SOURCE_PIN, STATE_SUCCESS, TRIGGER_KEYPAD,
    };
    use chrono::TimeZone;

    fn keypad(source: i64, name: &str, auth_id: &str, date: &str) -> LogRecord {
        LogRecord {
            trigger: TRIGGER_KEYPAD,
            source,
            state: STATE_SUCCESS,
            action: 1,
            name: name.to_string(),
            auth_id: auth_id.to_string(),
            date: date.to_string(),
            ..Default::default()
        }
    }

    fn poll_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 30).unwrap()
    }

    #[test]
    fn test_empty_input_no_events_no_state_change() {
        let mut state = EngineState::default();
        let events = process_batch(&[], poll_time(), &mut state, 120, &HashMap::new());
        assert!(events.is_empty());
        assert!(state.last_keypad_event_timestamp.is_none());
    }

    #[test]
    fn test_cross_method_attribution_scenario() {
        // Fingerprint placeholder record plus a PIN record sharing the auth
        // id: the fingerprint resolves to the PIN user. Window is wide
        // enough that both records are admitted.
        let records = vec![
            keypad(SOURCE_FINGERPRINT, "Nuki Keypad", "abc123", "2024-01-01T10:00:00Z"),
            keypad(SOURCE_PIN, "Alice", "abc123", "2024-01-01T09:58:00Z"),
        ];
        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 600, &HashMap::new());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].access_method, AccessMethod::Fingerprint);
        assert_eq!(events[0].resolved_user, "Alice");
        assert_eq!(events[1].access_method, AccessMethod::PinCode);
        assert_eq!(events[1].resolved_user, "Alice");
    }

    #[test]
    fn test_watermark_idempotence() {
        let records = vec![
            keypad(SOURCE_FINGERPRINT, "Nuki Keypad", "abc123", "2024-01-01T10:00:00Z"),
            keypad(SOURCE_PIN, "Alice", "abc123", "2024-01-01T09:58:00Z"),
        ];
        let mut state = EngineState::default();

        let first = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());
        assert!(!first.is_empty());
        assert_eq!(
            state.last_keypad_event_timestamp.as_deref(),
            Some("2024-01-01T10:00:00Z")
        );

        // Same input, same now: zero events the second time
        let second = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());
        assert!(second.is_empty());
        // State unchanged by the empty batch
        assert_eq!(
            state.last_keypad_event_timestamp.as_deref(),
            Some("2024-01-01T10:00:00Z")
        );
    }

    #[test]
    fn test_descending_order_and_sequence_numbers() {
        let records = vec![
            keypad(SOURCE_PIN, "Bob", "b1", "2024-01-01T09:59:00Z"),
            keypad(SOURCE_PIN, "Alice", "a1", "2024-01-01T10:00:00Z"),
            keypad(SOURCE_PIN, "Carol", "c1", "2024-01-01T09:58:30Z"),
        ];
        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 600, &HashMap::new());

        assert_eq!(events.len(), 3);
        for window in events.windows(2) {
            assert!(window[0].occurred_at >= window[1].occurred_at);
        }
        assert_eq!(events[0].resolved_user, "Alice");
        assert_eq!(events[0].sequence_number, 1);
        assert_eq!(events[1].sequence_number, 2);
        assert_eq!(events[2].sequence_number, 3);
        assert!(events.iter().all(|e| e.total_in_batch == 3));

        // Watermark follows the newest event, not the last processed one
        assert_eq!(
            state.last_keypad_event_timestamp.as_deref(),
            Some("2024-01-01T10:00:00Z")
        );
        assert_eq!(state.last_keypad_event_user.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_window_rejects_old_records() {
        let records = vec![
            keypad(SOURCE_PIN, "Alice", "a1", "2024-01-01T10:00:00Z"),
            keypad(SOURCE_PIN, "Bob", "b1", "2024-01-01T09:00:00Z"), // an hour old
        ];
        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resolved_user, "Alice");
    }

    #[test]
    fn test_future_record_rejected() {
        let records = vec![keypad(SOURCE_PIN, "Alice", "a1", "2024-01-01T10:05:00Z")];
        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());
        assert!(events.is_empty());
        assert!(state.last_keypad_event_timestamp.is_none());
    }

    #[test]
    fn test_bad_timestamp_isolated() {
        // Five records, the middle one unparsable: four still process
        let records = vec![
            keypad(SOURCE_PIN, "A", "a", "2024-01-01T10:00:20Z"),
            keypad(SOURCE_PIN, "B", "b", "2024-01-01T10:00:15Z"),
            keypad(SOURCE_PIN, "C", "c", "garbage"),
            keypad(SOURCE_PIN, "D", "d", "2024-01-01T10:00:05Z"),
            keypad(SOURCE_PIN, "E", "e", "2024-01-01T10:00:00Z"),
        ];

        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());
        assert_eq!(events.len(), 4);
        let users: Vec<&str> = events.iter().map(|e| e.resolved_user.as_str()).collect();
        assert_eq!(users, vec!["A", "B", "D", "E"]);
    }

    #[test]
    fn test_non_keypad_records_ignored() {
        let manual = LogRecord {
            trigger: 1,
            action: 2,
            date: "2024-01-01T10:00:10Z".to_string(),
            ..Default::default()
        };
        let records = vec![manual, keypad(SOURCE_PIN, "Alice", "a1", "2024-01-01T10:00:00Z")];
        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resolved_user, "Alice");
    }

    #[test]
    fn test_age_seconds_computed_from_poll_time() {
        let records = vec![keypad(SOURCE_PIN, "Alice", "a1", "2024-01-01T10:00:00Z")];
        let mut state = EngineState::default();
        let events = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());
        assert_eq!(events[0].age_seconds, 30.0);
    }

    #[test]
    fn test_watermark_boundary_record_not_reemitted() {
        let records = vec![keypad(SOURCE_PIN, "Alice", "a1", "2024-01-01T10:00:00Z")];
        let mut state = EngineState {
            last_keypad_event_timestamp: Some("2024-01-01T10:00:00Z".to_string()),
            ..Default::default()
        };
        let events = process_batch(&records, poll_time(), &mut state, 120, &HashMap::new());
        assert!(events.is_empty());
    }
}
