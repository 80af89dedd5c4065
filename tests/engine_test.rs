//! End-to-end tests for the access log attribution engine
//!
//! Exercises the public engine API the way the poller drives it: one batch
//! of newest-first records per cycle, engine state threaded across cycles.

use chrono::{DateTime, TimeZone, Utc};
use lockwatch::domain::types::{AccessMethod, EngineState, LogRecord};
use lockwatch::services::{detect_manual, process_batch};
use std::collections::HashMap;

fn record(
    trigger: i64,
    source: i64,
    state: i64,
    name: &str,
    auth_id: &str,
    date: &str,
) -> LogRecord {
    LogRecord {
        smartlock_id: 1,
        trigger,
        source,
        action: 1,
        state,
        name: name.to_string(),
        auth_id: auth_id.to_string(),
        date: date.to_string(),
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 30).unwrap()
}

#[test]
fn cross_method_auth_id_scenario() {
    // Fingerprint reported as the generic keypad placeholder, corroborated
    // by a PIN record two minutes earlier with the same credential
    let records = vec![
        record(255, 2, 0, "Nuki Keypad", "abc123", "2024-01-01T10:00:00Z"),
        record(255, 1, 0, "Alice", "abc123", "2024-01-01T09:58:00Z"),
    ];
    let mut state = EngineState::default();

    let events = process_batch(&records, now(), &mut state, 120, &HashMap::new());

    // The PIN record itself is outside the 120s window (150s old); only the
    // fingerprint event is emitted, attributed to Alice
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].access_method, AccessMethod::Fingerprint);
    assert_eq!(events[0].resolved_user, "Alice");
    assert_eq!(events[0].sequence_number, 1);
    assert_eq!(events[0].total_in_batch, 1);
}

#[test]
fn second_cycle_with_watermark_emits_nothing() {
    let records = vec![
        record(255, 2, 0, "Nuki Keypad", "abc123", "2024-01-01T10:00:00Z"),
        record(255, 1, 0, "Alice", "abc123", "2024-01-01T09:58:00Z"),
    ];
    let mut state = EngineState::default();

    let first = process_batch(&records, now(), &mut state, 120, &HashMap::new());
    assert_eq!(first.len(), 1);
    assert_eq!(state.last_keypad_event_timestamp.as_deref(), Some("2024-01-01T10:00:00Z"));

    // Same records, same poll time: nothing new
    let second = process_batch(&records, now(), &mut state, 120, &HashMap::new());
    assert!(second.is_empty());
}

#[test]
fn failed_fingerprint_scenario() {
    let records = vec![record(255, 2, 225, "Nuki Keypad", "abc123", "2024-01-01T10:00:20Z")];
    let mut state = EngineState::default();

    let events = process_batch(&records, now(), &mut state, 120, &HashMap::new());

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].access_method, AccessMethod::Fingerprint);
    assert_eq!(events[0].resolved_user, "Unknown Fingerprint (Failed)");
}

#[test]
fn keypad_and_manual_channels_are_independent() {
    let records = vec![
        record(255, 1, 0, "Alice", "a1", "2024-01-01T10:00:10Z"),
        record(1, 0, 0, "", "", "2024-01-01T10:00:00Z"),
    ];
    let mut state = EngineState::default();

    let keypad_events = process_batch(&records, now(), &mut state, 120, &HashMap::new());
    let manual_event = detect_manual(&records, now(), &mut state, 120);

    assert_eq!(keypad_events.len(), 1);
    assert!(manual_event.is_some());
    assert_eq!(state.last_keypad_event_timestamp.as_deref(), Some("2024-01-01T10:00:10Z"));
    assert_eq!(state.last_manual_event_timestamp.as_deref(), Some("2024-01-01T10:00:00Z"));

    // A second cycle over the same records fires neither channel
    let keypad_again = process_batch(&records, now(), &mut state, 120, &HashMap::new());
    let manual_again = detect_manual(&records, now(), &mut state, 120);
    assert!(keypad_again.is_empty());
    assert!(manual_again.is_none());
}

#[test]
fn manual_emits_at_most_one_while_keypad_emits_all() {
    let records = vec![
        record(1, 0, 0, "", "", "2024-01-01T10:00:25Z"),
        record(255, 1, 0, "Alice", "a1", "2024-01-01T10:00:20Z"),
        record(1, 0, 0, "", "", "2024-01-01T10:00:15Z"),
        record(255, 1, 0, "Bob", "b1", "2024-01-01T10:00:10Z"),
    ];
    let mut state = EngineState::default();

    let keypad_events = process_batch(&records, now(), &mut state, 120, &HashMap::new());
    assert_eq!(keypad_events.len(), 2);

    // Two manual records in the window, but only the first (newest) fires
    let manual_event = detect_manual(&records, now(), &mut state, 120).unwrap();
    assert_eq!(manual_event.record.date, "2024-01-01T10:00:25Z");
    assert!(detect_manual(&records, now(), &mut state, 120).is_none());
}

#[test]
fn configured_mapping_attributes_unmatched_fingerprint() {
    let mut mapping = HashMap::new();
    mapping.insert("source_2".to_string(), "Carol".to_string());

    let records = vec![record(255, 2, 0, "Nuki Keypad", "", "2024-01-01T10:00:00Z")];
    let mut state = EngineState::default();

    let events = process_batch(&records, now(), &mut state, 120, &mapping);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].resolved_user, "Carol");
}

#[test]
fn events_ordered_newest_first_across_methods() {
    let records = vec![
        record(255, 1, 0, "Bob", "b1", "2024-01-01T10:00:10Z"),
        record(255, 2, 0, "Alice", "a1", "2024-01-01T10:00:20Z"),
        record(255, 1, 0, "Carol", "c1", "2024-01-01T10:00:00Z"),
    ];
    let mut state = EngineState::default();

    let events = process_batch(&records, now(), &mut state, 120, &HashMap::new());

    assert_eq!(events.len(), 3);
    let users: Vec<&str> = events.iter().map(|e| e.resolved_user.as_str()).collect();
    assert_eq!(users, vec!["Alice", "Bob", "Carol"]);
    for window in events.windows(2) {
        assert!(window[0].occurred_at >= window[1].occurred_at);
    }
    assert_eq!(state.last_keypad_event_user.as_deref(), Some("Alice"));
}

#[test]
fn restart_window_duplicate_risk_is_bounded() {
    // After a "restart" (fresh EngineState), records inside the window are
    // re-admitted; records outside it are not
    let records = vec![
        record(255, 1, 0, "Alice", "a1", "2024-01-01T10:00:00Z"),
        record(255, 1, 0, "Bob", "b1", "2024-01-01T09:00:00Z"),
    ];

    let mut before = EngineState::default();
    let first = process_batch(&records, now(), &mut before, 120, &HashMap::new());
    assert_eq!(first.len(), 1);

    let mut after_restart = EngineState::default();
    let replay = process_batch(&records, now(), &mut after_restart, 120, &HashMap::new());
    assert_eq!(replay.len(), 1);
    assert_eq!(replay[0].resolved_user, "Alice");
}
