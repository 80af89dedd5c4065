//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Lock-free metrics collector
pub struct Metrics {
    /// Total poll cycles executed (monotonic)
    polls_total: AtomicU64,
    /// Log fetches that failed and yielded an empty cycle (monotonic)
    fetch_failures_total: AtomicU64,
    /// Raw log records examined (monotonic)
    records_total: AtomicU64,
    /// Keypad access events emitted (monotonic)
    keypad_events_total: AtomicU64,
    /// Manual operation events emitted (monotonic)
    manual_events_total: AtomicU64,
    /// Event payloads dropped because the egress channel was full (monotonic)
    payloads_dropped_total: AtomicU64,
    /// Polls since last report (reset on report)
    polls_since_report: AtomicU64,
    /// Events since last report (reset on report)
    events_since_report: AtomicU64,
    /// Last report time (only accessed from the reporter)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            polls_total: AtomicU64::new(0),
            fetch_failures_total: AtomicU64::new(0),
            records_total: AtomicU64::new(0),
            keypad_events_total: AtomicU64::new(0),
            manual_events_total: AtomicU64::new(0),
            payloads_dropped_total: AtomicU64::new(0),
            polls_since_report: AtomicU64::new(0),
            events_since_report: AtomicU64::new(0),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn record_poll(&self) {
        self.polls_total.fetch_add(1, Ordering::Relaxed);
        self.polls_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_fetch_failure(&self) {
        self.fetch_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_records_seen(&self, count: u64) {
        self.records_total.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_keypad_events(&self, count: u64) {
        self.keypad_events_total.fetch_add(count, Ordering::Relaxed);
        self.events_since_report.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_manual_event(&self) {
        self.manual_events_total.fetch_add(1, Ordering::Relaxed);
        self.events_since_report.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_payload_dropped(&self) {
        self.payloads_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot for reporting, resetting the since-report counters
    pub fn report(&self) -> MetricsSummary {
        let mut last_report = self.last_report_time.lock();
        let elapsed = last_report.elapsed();
        *last_report = Instant::now();
        drop(last_report);

        let polls_since = self.polls_since_report.swap(0, Ordering::Relaxed);
        let events_since = self.events_since_report.swap(0, Ordering::Relaxed);

        let elapsed_secs = elapsed.as_secs_f64();
        let events_per_min = if elapsed_secs > 0.0 {
            events_since as f64 * 60.0 / elapsed_secs
        } else {
            0.0
        };

        MetricsSummary {
            polls_total: self.polls_total.load(Ordering::Relaxed),
            fetch_failures_total: self.fetch_failures_total.load(Ordering::Relaxed),
            records_total: self.records_total.load(Ordering::Relaxed),
            keypad_events_total: self.keypad_events_total.load(Ordering::Relaxed),
            manual_events_total: self.manual_events_total.load(Ordering::Relaxed),
            payloads_dropped_total: self.payloads_dropped_total.load(Ordering::Relaxed),
            polls_since_report: polls_since,
            events_per_min,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of the counter set
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub polls_total: u64,
    pub fetch_failures_total: u64,
    pub records_total: u64,
    pub keypad_events_total: u64,
    pub manual_events_total: u64,
    pub payloads_dropped_total: u64,
    pub polls_since_report: u64,
    pub events_per_min: f64,
}

impl MetricsSummary {
    /// Log the summary as a structured info line
    pub fn log(&self) {
        info!(
            polls = %self.polls_total,
            fetch_failures = %self.fetch_failures_total,
            records = %self.records_total,
            keypad_events = %self.keypad_events_total,
            manual_events = %self.manual_events_total,
            dropped = %self.payloads_dropped_total,
            events_per_min = %format!("{:.2}", self.events_per_min),
            "metrics_summary"
        );
    }
}
