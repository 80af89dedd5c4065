//! Timestamp normalization for the activity log's `date` field
//!
//! The API is inconsistent about timestamp formats: most entries carry a
//! trailing `Z`, some an explicit offset, and some are naive. Naive
//! timestamps are device-local UTC, so they get offset zero attached.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("malformed timestamp: {0:?}")]
    Malformed(String),
}

/// Parse a log timestamp into a UTC instant.
///
/// Rules, applied in order:
/// 1. trailing `Z` - replaced with `+00:00` and parsed offset-aware
/// 2. contains `+` (explicit offset) - parsed offset-aware
/// 3. otherwise - parsed naive and treated as UTC
pub fn normalize(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    if let Some(stripped) = raw.strip_suffix('Z') {
        let with_offset = format!("{stripped}+00:00");
        return DateTime::parse_from_rfc3339(&with_offset)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| TimestampError::Malformed(raw.to_string()));
    }

    if raw.contains('+') {
        return DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| TimestampError::Malformed(raw.to_string()));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| TimestampError::Malformed(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trailing_z() {
        let parsed = normalize("2024-01-01T10:00:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_explicit_offset() {
        let parsed = normalize("2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_zero_offset() {
        let parsed = normalize("2024-01-01T10:00:00+00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_naive_treated_as_utc() {
        let parsed = normalize("2024-01-01T10:00:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_fractional_seconds() {
        let parsed = normalize("2024-01-01T10:00:00.500Z").unwrap();
        assert_eq!(parsed.timestamp_millis() % 1000, 500);
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            normalize("not-a-date"),
            Err(TimestampError::Malformed("not-a-date".to_string()))
        );
        assert!(normalize("").is_err());
        assert!(normalize("2024-13-99T99:99:99Z").is_err());
    }
}
