//! Shared types for lock access monitoring

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trigger code for keypad entries with an authenticated user
pub const TRIGGER_KEYPAD: i64 = 255;
/// Trigger code for manual operations (handle / external key)
pub const TRIGGER_MANUAL: i64 = 1;

/// Source code for PIN code entry on the keypad
pub const SOURCE_PIN: i64 = 1;
/// Source code for fingerprint entry on the keypad
pub const SOURCE_FINGERPRINT: i64 = 2;

/// Outcome code for a successful operation
pub const STATE_SUCCESS: i64 = 0;
/// Outcome code for a rejected PIN code
pub const STATE_WRONG_PIN: i64 = 224;
/// Outcome code for a rejected fingerprint
pub const STATE_WRONG_FINGERPRINT: i64 = 225;

/// Action codes from the activity log
pub const ACTION_UNLOCK: i64 = 1;
pub const ACTION_LOCK: i64 = 2;
pub const ACTION_UNLATCH: i64 = 3;

/// Generic label the device reports when it cannot resolve the real user
/// (always the case for certain fingerprint firmware versions)
pub const KEYPAD_PLACEHOLDER: &str = "Nuki Keypad";
/// Label fragment identifying the administrative web console
pub const WEB_CONSOLE_LABEL: &str = "Nuki Web";
/// Label the device reports for unresolved identities
pub const UNKNOWN_LABEL: &str = "Unknown";

/// One raw entry from the lock's activity log.
///
/// The API omits fields freely depending on trigger type and firmware, so
/// every field is defaulted at the parse boundary and the rest of the system
/// operates on a closed, total schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogRecord {
    pub smartlock_id: i64,
    /// Mechanism that caused the event (255 = keypad with authenticated user,
    /// 1 = manual; others are web/automatic/button)
    pub trigger: i64,
    /// Sub-mechanism for keypad triggers (1 = PIN, 2 = fingerprint);
    /// meaningless for non-keypad triggers
    pub source: i64,
    /// Lock action performed (1 unlock, 2 lock, 3 unlatch, ...)
    pub action: i64,
    /// Outcome code (0 = success, 224 = wrong PIN, 225 = wrong fingerprint;
    /// others are lock-motion states)
    pub state: i64,
    /// Event timestamp as reported; format varies (see `domain::timestamp`)
    pub date: String,
    /// User label as reported by the device; may be empty or a placeholder
    pub name: String,
    /// Opaque identifier correlating records of the same enrolled credential
    pub auth_id: String,
}

/// How an access event was performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMethod {
    PinCode,
    Fingerprint,
    ManualInsideHandle,
    ManualExternalKey,
    Unknown,
}

impl AccessMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMethod::PinCode => "pin_code",
            AccessMethod::Fingerprint => "fingerprint",
            AccessMethod::ManualInsideHandle => "manual_inside_handle",
            AccessMethod::ManualExternalKey => "manual_external_key",
            AccessMethod::Unknown => "unknown",
        }
    }
}

/// Why a record was classified as a keypad access.
///
/// Informational only; never gates classification itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionReason {
    /// Keypad trigger with a real (non-administrative) user name
    Trigger255WithUser,
    /// PIN/fingerprint source with a user name
    SourceWithUser(i64),
    /// Auth id and user name present on a keypad unlatch
    AuthUserUnlatch255,
    Unknown,
}

impl DetectionReason {
    /// String tag carried in event payloads
    pub fn label(&self) -> String {
        match self {
            DetectionReason::Trigger255WithUser => "trigger_255_with_user".to_string(),
            DetectionReason::SourceWithUser(source) => format!("source_{source}_with_user"),
            DetectionReason::AuthUserUnlatch255 => "auth_user_unlatch_255".to_string(),
            DetectionReason::Unknown => "unknown".to_string(),
        }
    }
}

/// An attributed access event derived from one admitted log record
#[derive(Debug, Clone)]
pub struct AttributedEvent {
    /// The source record, owned so payloads can embed the raw entry
    pub record: LogRecord,
    /// Normalized UTC instant of the record's `date` field
    pub occurred_at: DateTime<Utc>,
    /// Poll time minus occurrence time, in seconds
    pub age_seconds: f64,
    pub access_method: AccessMethod,
    /// Best-guess user identity; never empty (degrades to a placeholder)
    pub resolved_user: String,
    pub detection_reason: DetectionReason,
    /// 1-based position within the batch, 1 = newest qualifying event
    pub sequence_number: usize,
    pub total_in_batch: usize,
}

/// Per-lock dedup watermarks.
///
/// Owned exclusively by one poller task per lock; the batch processor and
/// manual detector are the only mutators. Lives for the process lifetime of
/// the lock and is never persisted - a restart re-admits records newer than
/// the restart but still inside the detection window.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// High-water mark for keypad events: the original `date` string of the
    /// most recent emitted event. Monotonically non-decreasing.
    pub last_keypad_event_timestamp: Option<String>,
    /// Resolved user of the most recent keypad event (informational)
    pub last_keypad_event_user: Option<String>,
    /// Independent high-water mark for manual events
    pub last_manual_event_timestamp: Option<String>,
}

/// A smartlock as returned by the `/smartlock` listing
#[derive(Debug, Clone, Deserialize)]
pub struct Smartlock {
    #[serde(rename = "smartlockId")]
    pub smartlock_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: SmartlockStateData,
}

/// State sub-object of a smartlock
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmartlockStateData {
    #[serde(default)]
    pub state: i64,
    #[serde(default, rename = "batteryCritical")]
    pub battery_critical: bool,
    #[serde(default, rename = "batteryCharge")]
    pub battery_charge: Option<i64>,
}

/// Lock motion/state codes reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockDeviceState {
    Uncalibrated,
    Locked,
    Unlocking,
    Unlocked,
    Locking,
    Unlatched,
    UnlockedLockNGo,
    Unlatching,
    MotorBlocked,
    Undefined,
    Unknown,
}

impl LockDeviceState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => LockDeviceState::Uncalibrated,
            1 => LockDeviceState::Locked,
            2 => LockDeviceState::Unlocking,
            3 => LockDeviceState::Unlocked,
            4 => LockDeviceState::Locking,
            5 => LockDeviceState::Unlatched,
            6 => LockDeviceState::UnlockedLockNGo,
            7 => LockDeviceState::Unlatching,
            254 => LockDeviceState::MotorBlocked,
            255 => LockDeviceState::Undefined,
            _ => LockDeviceState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LockDeviceState::Uncalibrated => "uncalibrated",
            LockDeviceState::Locked => "locked",
            LockDeviceState::Unlocking => "unlocking",
            LockDeviceState::Unlocked => "unlocked",
            LockDeviceState::Locking => "locking",
            LockDeviceState::Unlatched => "unlatched",
            LockDeviceState::UnlockedLockNGo => "unlocked_lock_n_go",
            LockDeviceState::Unlatching => "unlatching",
            LockDeviceState::MotorBlocked => "motor_blocked",
            LockDeviceState::Undefined => "undefined",
            LockDeviceState::Unknown => "unknown",
        }
    }
}

/// Actions the API accepts for a smartlock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAction {
    Unlock,
    Lock,
    Unlatch,
    LockNGo,
    LockNGoWithUnlatch,
}

impl LockAction {
    pub fn code(&self) -> i64 {
        match self {
            LockAction::Unlock => 1,
            LockAction::Lock => 2,
            LockAction::Unlatch => 3,
            LockAction::LockNGo => 4,
            LockAction::LockNGoWithUnlatch => 5,
        }
    }
}

impl std::str::FromStr for LockAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unlock" => Ok(LockAction::Unlock),
            "lock" => Ok(LockAction::Lock),
            "unlatch" => Ok(LockAction::Unlatch),
            "lock_n_go" => Ok(LockAction::LockNGo),
            "lock_n_go_with_unlatch" => Ok(LockAction::LockNGoWithUnlatch),
            other => Err(format!("unknown lock action: {other}")),
        }
    }
}

/// Human-readable description of an outcome/state code, for log output
pub fn state_description(state: i64) -> String {
    match state {
        0 => "Success".to_string(),
        1 => "Locked".to_string(),
        2 => "Unlocking".to_string(),
        3 => "Unlocked".to_string(),
        4 => "Locking".to_string(),
        5 => "Unlatched".to_string(),
        6 => "Unlocked (Lock 'n' Go)".to_string(),
        7 => "Unlatching".to_string(),
        224 => "Error: Wrong PIN Code".to_string(),
        225 => "Error: Wrong Fingerprint".to_string(),
        254 => "Motor Blocked".to_string(),
        255 => "Undefined".to_string(),
        other => format!("Unknown State ({other})"),
    }
}
