//! Manual (handle / external key) action detection
//!
//! A simpler, parallel path to the keypad batch processor: scans one poll
//! cycle's records for manual operations and emits AT MOST ONE event per
//! cycle, against its own independent watermark. The asymmetry with the
//! keypad path is deliberate - manual detection fires once per distinct
//! physical action instead of replaying history.

use crate::domain::timestamp::normalize;
use crate::domain::types::{AttributedEvent, EngineState, LogRecord};
use crate::services::admission::admit;
use crate::services::classifier::{classify, manual_kind};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Scan records (newest first) for the first qualifying manual operation.
///
/// Advances `last_manual_event_timestamp` when an event is emitted; the
/// keypad watermark is untouched.
pub fn detect_manual(
    records: &[LogRecord],
    now: DateTime<Utc>,
    state: &mut EngineState,
    window_seconds: i64,
) -> Option<AttributedEvent> {
    for (index, record) in records.iter().enumerate() {
        let classification = classify(record);
        if !classification.is_manual {
            continue;
        }

        let occurred_at = match normalize(&record.date) {
            Ok(instant) => instant,
            Err(e) => {
                warn!(index = %index, error = %e, "manual_timestamp_unparsable");
                continue;
            }
        };

        let age_seconds = (now - occurred_at).num_milliseconds() as f64 / 1000.0;
        let decision = admit(
            &record.date,
            age_seconds,
            window_seconds,
            state.last_manual_event_timestamp.as_deref(),
        );
        if !decision.is_admitted() {
            debug!(
                index = %index,
                date = %record.date,
                decision = %decision.as_str(),
                "manual_record_rejected"
            );
            continue;
        }

        let access_method = manual_kind(record);
        let resolved_user = if record.name.is_empty() {
            "Unknown User".to_string()
        } else {
            record.name.clone()
        };

        state.last_manual_event_timestamp = Some(record.date.clone());

        return Some(AttributedEvent {
            record: record.clone(),
            occurred_at,
            age_seconds,
            access_method,
            resolved_user,
            detection_reason: classification.reason,
            sequence_number: 1,
            total_in_batch: 1,
        });
    }

    None
}
