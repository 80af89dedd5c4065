//! Classification of raw activity log records
//!
//! Decides whether a record represents a keypad-originated access, a manual
//! operation, or neither, and tags it with a detection reason.
//!
//! The keypad predicate (`trigger == 255 && source in {1, 2}`) is the single
//! authoritative rule. Name-based heuristics produced false positives in the
//! field and only refine the reason tag, never the classification itself.

use crate::domain::types::{
    DetectionReason, LogRecord, ACTION_LOCK, ACTION_UNLATCH, ACTION_UNLOCK, SOURCE_FINGERPRINT,
    SOURCE_PIN, TRIGGER_KEYPAD, TRIGGER_MANUAL, UNKNOWN_LABEL, WEB_CONSOLE_LABEL,
};
use crate::domain::AccessMethod;

/// Classification outcome for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub is_keypad: bool,
    pub is_manual: bool,
    pub reason: DetectionReason,
}

/// Ordered detection-reason rules; the first rule to match wins.
///
/// Each rule is a named function so precedence stays explicit and every rule
/// is testable on its own.
const REASON_RULES: &[fn(&LogRecord) -> Option<DetectionReason>] = &[
    reason_trigger_255_with_user,
    reason_source_with_user,
    reason_auth_user_unlatch,
];

fn reason_trigger_255_with_user(record: &LogRecord) -> Option<DetectionReason> {
    if record.trigger == TRIGGER_KEYPAD
        && !record.name.is_empty()
        && record.name != UNKNOWN_LABEL
        && !record.name.contains(WEB_CONSOLE_LABEL)
    {
        Some(DetectionReason::Trigger255WithUser)
    } else {
        None
    }
}

fn reason_source_with_user(record: &LogRecord) -> Option<DetectionReason> {
    if (record.source == SOURCE_PIN || record.source == SOURCE_FINGERPRINT)
        && !record.name.is_empty()
        && record.name != UNKNOWN_LABEL
    {
        Some(DetectionReason::SourceWithUser(record.source))
    } else {
        None
    }
}

fn reason_auth_user_unlatch(record: &LogRecord) -> Option<DetectionReason> {
    if !record.auth_id.is_empty()
        && !record.name.is_empty()
        && record.action == ACTION_UNLATCH
        && record.trigger == TRIGGER_KEYPAD
    {
        Some(DetectionReason::AuthUserUnlatch255)
    } else {
        None
    }
}

/// Classify one log record
pub fn classify(record: &LogRecord) -> Classification {
    let is_keypad = record.trigger == TRIGGER_KEYPAD
        && (record.source == SOURCE_PIN || record.source == SOURCE_FINGERPRINT);
    let is_manual = record.trigger == TRIGGER_MANUAL;

    let reason =
        REASON_RULES.iter().find_map(|rule| rule(record)).unwrap_or(DetectionReason::Unknown);

    Classification { is_keypad, is_manual, reason }
}

/// Sub-classify a manual record into inside-handle vs external-key.
///
/// Best-effort heuristic keyed on action and name emptiness: an unlock with
/// no user label reads as an external key, everything else that moves the
/// lock reads as the inside handle. Known to misclassify on some door
/// configurations; kept as-is because downstream consumers depend on the
/// current behavior.
pub fn manual_kind(record: &LogRecord) -> AccessMethod {
    match record.action {
        ACTION_UNLOCK => {
            if record.name.is_empty() {
                AccessMethod::ManualExternalKey
            } else {
                AccessMethod::ManualInsideHandle
            }
        }
        ACTION_LOCK => AccessMethod::ManualInsideHandle,
        ACTION_UNLATCH => AccessMethod::ManualInsideHandle,
        _ => AccessMethod::Unknown,
    }
}
