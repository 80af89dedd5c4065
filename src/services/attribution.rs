//! User identity resolution for keypad records
//!
//! The device reports a generic placeholder name ("Nuki Keypad") for
//! biometric entries on some firmware versions. This module recovers the
//! most likely human user via an ordered chain of fallback strategies
//! consulting nearby log entries, configured mappings, and historical
//! frequency. Attribution never fails; it degrades to a descriptive
//! placeholder.

use crate::domain::types::{
    AccessMethod, LogRecord, KEYPAD_PLACEHOLDER, SOURCE_FINGERPRINT, SOURCE_PIN, STATE_SUCCESS,
    STATE_WRONG_FINGERPRINT, STATE_WRONG_PIN, TRIGGER_KEYPAD, UNKNOWN_LABEL, WEB_CONSOLE_LABEL,
};
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use tracing::debug;

/// Auth-id correlation scans this many entries behind the current index...
const AUTH_ID_WINDOW_BEHIND: usize = 50;
/// ...and this many ahead of it
const AUTH_ID_WINDOW_AHEAD: usize = 10;
/// Frequency analysis considers the most recent entries only
const FREQUENCY_WINDOW: usize = 30;
/// Nearest-neighbor lookup scans forward (toward older entries) at most this far
const NEIGHBOR_LOOKAHEAD: usize = 20;

/// A name is usable when it is a real identity rather than a device
/// placeholder or the administrative web console
pub fn name_usable(name: &str) -> bool {
    !name.is_empty()
        && name != UNKNOWN_LABEL
        && name != KEYPAD_PLACEHOLDER
        && !name.contains(WEB_CONSOLE_LABEL)
}

/// Inputs to one fallback strategy
struct FallbackContext<'a> {
    record: &'a LogRecord,
    batch: &'a [LogRecord],
    index: usize,
    mapping: &'a HashMap<String, String>,
}

/// Ordered fallback strategies; the first to produce a name wins.
///
/// The order is load-bearing: auth-id correlation outranks the configured
/// mapping, which outranks frequency analysis.
const FALLBACK_CHAIN: &[(&str, fn(&FallbackContext) -> Option<String>)] = &[
    ("auth_id_same_source", auth_id_same_source),
    ("auth_id_cross_method", auth_id_cross_method),
    ("configured_mapping", configured_mapping),
    ("recent_frequency", recent_frequency),
    ("nearest_successful_neighbor", nearest_successful_neighbor),
];

/// Bounded window of batch indices around the current record, current
/// record excluded
fn auth_window<'a>(ctx: &'a FallbackContext<'a>) -> impl Iterator<Item = usize> + 'a {
    let start = ctx.index.saturating_sub(AUTH_ID_WINDOW_BEHIND);
    let end = ctx.batch.len().min(ctx.index + AUTH_ID_WINDOW_AHEAD);
    let current = ctx.index;
    (start..end).filter(move |&i| i != current)
}

/// The same enrolled credential sometimes reports a real name on one
/// occurrence and the placeholder on another: another successful fingerprint
/// record sharing the auth id gives the identity directly.
fn auth_id_same_source(ctx: &FallbackContext) -> Option<String> {
    if ctx.record.auth_id.is_empty() {
        return None;
    }
    for i in auth_window(ctx) {
        let entry = &ctx.batch[i];
        if !entry.auth_id.is_empty()
            && entry.auth_id == ctx.record.auth_id
            && entry.source == SOURCE_FINGERPRINT
            && entry.trigger == TRIGGER_KEYPAD
            && entry.state == STATE_SUCCESS
            && name_usable(&entry.name)
        {
            return Some(entry.name.clone());
        }
    }
    None
}

/// A user who sometimes authenticates by PIN corroborates fingerprint
/// identity: accept a successful PIN record with the same auth id.
fn auth_id_cross_method(ctx: &FallbackContext) -> Option<String> {
    if ctx.record.auth_id.is_empty() {
        return None;
    }
    for i in auth_window(ctx) {
        let entry = &ctx.batch[i];
        if !entry.auth_id.is_empty()
            && entry.auth_id == ctx.record.auth_id
            && entry.source == SOURCE_PIN
            && entry.trigger == TRIGGER_KEYPAD
            && entry.state == STATE_SUCCESS
            && name_usable(&entry.name)
        {
            return Some(entry.name.clone());
        }
    }
    None
}

/// Operator-configured "source_N" slot mapping
fn configured_mapping(ctx: &FallbackContext) -> Option<String> {
    let key = format!("source_{}", ctx.record.source);
    ctx.mapping.get(&key).filter(|name| !name.is_empty()).cloned()
}

/// Most frequent usable name among recent successful fingerprint entries.
/// Ties break toward the name seen first in the window.
fn recent_frequency(ctx: &FallbackContext) -> Option<String> {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    let mut order: Vec<&str> = Vec::new();

    for entry in ctx.batch.iter().take(FREQUENCY_WINDOW) {
        if entry.trigger == TRIGGER_KEYPAD
            && entry.source == SOURCE_FINGERPRINT
            && entry.state == STATE_SUCCESS
            && name_usable(&entry.name)
        {
            let count = counts.entry(entry.name.as_str()).or_insert(0);
            if *count == 0 {
                order.push(entry.name.as_str());
            }
            *count += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for name in order {
        let count = counts[name];
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.to_string())
}

/// Next successful fingerprint record with a usable name, scanning forward
/// from the current index (toward older entries in the newest-first list)
fn nearest_successful_neighbor(ctx: &FallbackContext) -> Option<String> {
    let end = ctx.batch.len().min(ctx.index + NEIGHBOR_LOOKAHEAD);
    for entry in &ctx.batch[(ctx.index + 1).min(end)..end] {
        if entry.trigger == TRIGGER_KEYPAD
            && entry.source == SOURCE_FINGERPRINT
            && entry.state == STATE_SUCCESS
            && name_usable(&entry.name)
        {
            return Some(entry.name.clone());
        }
    }
    None
}

/// Descriptive placeholder combining the source slot and, when long enough
/// to be meaningful, the tail of the auth id
fn terminal_fallback(record: &LogRecord) -> String {
    let mut name = format!("Fingerprint User (Source {})", record.source);
    if record.auth_id.len() > 8 {
        if let Some(tail) = auth_id_tail(&record.auth_id, 8) {
            name.push_str(&format!(" [{tail}]"));
        }
    }
    name
}

/// Last `n` characters of an auth id, respecting char boundaries
fn auth_id_tail(auth_id: &str, n: usize) -> Option<&str> {
    let chars = auth_id.chars().count();
    if chars <= n {
        return Some(auth_id);
    }
    let (idx, _) = auth_id.char_indices().nth(chars - n)?;
    auth_id.get(idx..)
}

/// Run the fallback chain for a fingerprint record with an unusable name
fn resolve_fingerprint_fallback(
    record: &LogRecord,
    batch: &[LogRecord],
    index: usize,
    mapping: &HashMap<String, String>,
) -> String {
    let ctx = FallbackContext { record, batch, index, mapping };

    for (strategy_name, strategy) in FALLBACK_CHAIN {
        if let Some(user) = strategy(&ctx) {
            debug!(
                strategy = %strategy_name,
                user = %user,
                auth_id = %record.auth_id,
                "fingerprint_user_resolved"
            );
            return user;
        }
    }

    let fallback = terminal_fallback(record);
    debug!(user = %fallback, "fingerprint_user_terminal_fallback");
    fallback
}

/// Resolve access method and user identity for a keypad-classified record.
///
/// Pure function of the record, its batch neighborhood, and the configured
/// mapping. Never returns an empty user.
pub fn resolve(
    record: &LogRecord,
    batch: &[LogRecord],
    index: usize,
    mapping: &HashMap<String, String>,
) -> (AccessMethod, String) {
    match record.source {
        SOURCE_FINGERPRINT => {
            let user = if record.state == STATE_WRONG_FINGERPRINT {
                "Unknown Fingerprint (Failed)".to_string()
            } else if name_usable(&record.name) {
                // Trust device-reported identity when present
                record.name.clone()
            } else {
                resolve_fingerprint_fallback(record, batch, index, mapping)
            };
            (AccessMethod::Fingerprint, user)
        }
        SOURCE_PIN => {
            let user = if record.state == STATE_WRONG_PIN {
                "Unknown PIN (Failed)".to_string()
            } else if name_usable(&record.name) {
                record.name.clone()
            } else {
                "PIN User".to_string()
            };
            (AccessMethod::PinCode, user)
        }
        _ => {
            let user = if record.name.is_empty() {
                "Unknown User".to_string()
            } else {
                record.name.clone()
            };
            (AccessMethod::Unknown, user)
        }
    }
}
