//! Domain models - core business types for lock access events
//!
//! This module contains the canonical data types used throughout the system:
//! - `LogRecord` - one raw entry from the lock's activity log
//! - `AttributedEvent` - a classified, attributed, deduplicated access event
//! - `EngineState` - per-lock watermarks for dedup across poll cycles
//! - `AccessMethod` / `DetectionReason` - event classification enums
//! - `timestamp` - normalization of the API's heterogeneous timestamp formats

pub mod timestamp;
pub mod types;

// Re-export commonly used types at module level
pub use timestamp::{normalize, TimestampError};
pub use types::{
    AccessMethod, AttributedEvent, DetectionReason, EngineState, LockAction, LockDeviceState,
    LogRecord, Smartlock,
};
