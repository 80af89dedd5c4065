//! Event egress - writes attributed events to file
//!
//! Events are written in JSONL format (one JSON object per line)
//! to the file specified in config.

use crate::io::egress_channel::{KeypadEventPayload, ManualEventPayload};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{debug, error};

/// Egress writer for attributed events
pub struct Egress {
    file_path: String,
}

impl Egress {
    pub fn new(file_path: &str) -> Self {
        Self { file_path: file_path.to_string() }
    }

    /// Write a keypad event to the egress file
    /// Returns true if successful, false otherwise
    pub fn write_keypad(&self, payload: &KeypadEventPayload) -> bool {
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "keypad_event_serialize_failed");
                return false;
            }
        };
        self.write_line(&json, "keypad")
    }

    /// Write a manual event to the egress file
    pub fn write_manual(&self, payload: &ManualEventPayload) -> bool {
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "manual_event_serialize_failed");
                return false;
            }
        };
        self.write_line(&json, "manual")
    }

    fn write_line(&self, json: &str, kind: &str) -> bool {
        match self.append_line(json) {
            Ok(()) => true,
            Err(e) => {
                error!(kind = %kind, error = %e, "event_egress_failed");
                false
            }
        }
    }

    /// Append a line to the egress file
    fn append_line(&self, line: &str) -> std::io::Result<()> {
        let path = Path::new(&self.file_path);

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(file, "{}", line)?;
        debug!(file = %self.file_path, bytes = %line.len(), "egress_written");

        Ok(())
    }
}
