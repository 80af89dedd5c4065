//! Dedup watermark and recency window admission
//!
//! A record produces an event only if it is recent (inside the detection
//! window relative to poll time) and strictly newer than the channel's
//! watermark. Records are judged independently; admitting one never affects
//! another within the same batch.

use tracing::debug;

/// Outcome of admission for one record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Timestamp in the future relative to poll time (clock skew)
    Future,
    /// Older than the detection window
    Stale,
    /// At or behind the watermark; already emitted in a previous cycle
    AlreadySeen,
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Admission::Admitted => "admitted",
            Admission::Future => "future",
            Admission::Stale => "stale",
            Admission::AlreadySeen => "already_seen",
        }
    }
}

/// Decide whether a record may produce an event.
///
/// The window is an open interval: `age == window_seconds` is rejected.
/// The watermark comparison is lexicographic over the ORIGINAL date string,
/// not the parsed instant - the API's own ordering semantics are preserved
/// exactly, and the boundary is exclusive (a record equal to the watermark
/// is already seen). Fragile if the API ever changes timestamp formatting.
pub fn admit(
    raw_date: &str,
    age_seconds: f64,
    window_seconds: i64,
    watermark: Option<&str>,
) -> Admission {
    if age_seconds < 0.0 {
        return Admission::Future;
    }
    if age_seconds >= window_seconds as f64 {
        return Admission::Stale;
    }
    if let Some(mark) = watermark {
        if raw_date <= mark {
            return Admission::AlreadySeen;
        }
    }
    debug!(date = %raw_date, age_seconds = %age_seconds, "record_admitted");
    Admission::Admitted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admitted_without_watermark() {
        assert_eq!(admit("2024-01-01T10:00:00Z", 30.0, 120, None), Admission::Admitted);
    }

    #[test]
    fn test_window_boundary_is_open() {
        // Exactly the window is rejected; one second inside is admitted
        assert_eq!(admit("2024-01-01T10:00:00Z", 120.0, 120, None), Admission::Stale);
        assert_eq!(admit("2024-01-01T10:00:00Z", 119.0, 120, None), Admission::Admitted);
    }

    #[test]
    fn test_zero_age_admitted() {
        assert_eq!(admit("2024-01-01T10:00:00Z", 0.0, 120, None), Admission::Admitted);
    }

    #[test]
    fn test_future_rejected() {
        assert_eq!(admit("2024-01-01T10:00:00Z", -0.5, 120, None), Admission::Future);
    }

    #[test]
    fn test_watermark_boundary_is_exclusive() {
        let mark = Some("2024-01-01T10:00:00Z");
        // Equal to the watermark: already seen
        assert_eq!(admit("2024-01-01T10:00:00Z", 10.0, 120, mark), Admission::AlreadySeen);
        // Strictly greater: admitted
        assert_eq!(admit("2024-01-01T10:00:01Z", 10.0, 120, mark), Admission::Admitted);
        // Behind the watermark: already seen
        assert_eq!(admit("2024-01-01T09:59:59Z", 10.0, 120, mark), Admission::AlreadySeen);
    }

    #[test]
    fn test_window_checked_before_watermark() {
        // A stale record behind the watermark reports stale, not seen
        let mark = Some("2024-01-01T10:00:00Z");
        assert_eq!(admit("2024-01-01T09:00:00Z", 3600.0, 120, mark), Admission::Stale);
    }
}
