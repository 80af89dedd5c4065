//! Services - the attribution engine and polling logic
//!
//! This module contains the core business logic:
//! - `classifier` - keypad/manual classification of raw log records
//! - `attribution` - user identity resolution for keypad records
//! - `admission` - dedup watermark and recency window filtering
//! - `batch` - per-poll batch processing of keypad events
//! - `manual` - manual (handle / external key) action detection
//! - `poller` - per-lock poll loop driving the engine

pub mod admission;
pub mod attribution;
pub mod batch;
pub mod classifier;
pub mod manual;
pub mod poller;

// Re-export commonly used entry points
pub use batch::process_batch;
pub use manual::detect_manual;
pub use poller::LockPoller;
