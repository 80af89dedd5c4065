//! Per-lock poll loop
//!
//! One poller task per smartlock owns that lock's `EngineState` exclusively.
//! Each cycle runs to completion before the next interval tick, so watermark
//! read-modify-write is serialized per lock without locking. Pollers for
//! different locks are independent and share nothing mutable.

use crate::domain::types::{EngineState, LockDeviceState, LogRecord};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::api::NukiApi;
use crate::io::egress::Egress;
use crate::io::egress_channel::{EgressSender, KeypadEventPayload, ManualEventPayload};
use crate::services::batch::process_batch;
use crate::services::manual::detect_manual;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};

/// Advisory delay between events of one batch, to avoid flooding consumers
const INTER_EVENT_DELAY: Duration = Duration::from_millis(100);

pub struct LockPoller {
    api: Arc<NukiApi>,
    smartlock_id: i64,
    lock_name: String,
    config: Config,
    state: EngineState,
    last_device_state: Option<LockDeviceState>,
    egress: Egress,
    egress_sender: Option<EgressSender>,
    metrics: Arc<Metrics>,
}

impl LockPoller {
    pub fn new(
        api: Arc<NukiApi>,
        smartlock_id: i64,
        lock_name: String,
        config: Config,
        egress_sender: Option<EgressSender>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let egress = Egress::new(config.egress_file());
        Self {
            api,
            smartlock_id,
            lock_name,
            config,
            state: EngineState::default(),
            last_device_state: None,
            egress,
            egress_sender,
            metrics,
        }
    }

    /// Run the poll loop until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            smartlock_id = %self.smartlock_id,
            lock = %self.lock_name,
            interval_secs = %self.config.poll_interval_secs(),
            window_seconds = %self.config.detection_window_seconds(),
            "lock_poller_started"
        );

        let mut ticker = interval(Duration::from_secs(self.config.poll_interval_secs()));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(smartlock_id = %self.smartlock_id, "lock_poller_shutdown");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }

    /// One complete poll cycle: state check, log fetch, engine, publish
    async fn poll_once(&mut self) {
        self.metrics.record_poll();

        self.check_device_state().await;

        let records = self.fetch_log().await;
        self.metrics.record_records_seen(records.len() as u64);

        if self.config.enhanced_logging() {
            info!(
                smartlock_id = %self.smartlock_id,
                records = %records.len(),
                last_keypad = ?self.state.last_keypad_event_timestamp,
                last_manual = ?self.state.last_manual_event_timestamp,
                "poll_cycle"
            );
        }

        let now = Utc::now();

        let events = process_batch(
            &records,
            now,
            &mut self.state,
            self.config.detection_window_seconds(),
            self.config.fingerprint_user_mapping(),
        );

        let total = events.len();
        for (idx, event) in events.iter().enumerate() {
            info!(
                smartlock_id = %self.smartlock_id,
                user = %event.resolved_user,
                method = %event.access_method.as_str(),
                action = %event.record.action,
                reason = %event.detection_reason.label(),
                seq = %event.sequence_number,
                total = %total,
                age_s = %format!("{:.1}", event.age_seconds),
                "keypad_event"
            );

            let payload = KeypadEventPayload::from_event(self.smartlock_id, event);
            self.egress.write_keypad(&payload);
            if let Some(sender) = &self.egress_sender {
                sender.send_keypad(payload);
            }

            if idx + 1 < total {
                tokio::time::sleep(INTER_EVENT_DELAY).await;
            }
        }
        self.metrics.record_keypad_events(total as u64);

        if let Some(event) = detect_manual(
            &records,
            now,
            &mut self.state,
            self.config.detection_window_seconds(),
        ) {
            info!(
                smartlock_id = %self.smartlock_id,
                manual_type = %event.access_method.as_str(),
                action = %event.record.action,
                age_s = %format!("{:.1}", event.age_seconds),
                "manual_event"
            );

            let payload = ManualEventPayload::from_event(self.smartlock_id, &event);
            self.egress.write_manual(&payload);
            if let Some(sender) = &self.egress_sender {
                sender.send_manual(payload);
            }
            self.metrics.record_manual_event();
        }
    }

    /// Fetch the lock's device state and log transitions
    async fn check_device_state(&mut self) {
        let lock = match self.api.smartlock_state(self.smartlock_id).await {
            Ok(lock) => lock,
            Err(e) => {
                debug!(smartlock_id = %self.smartlock_id, error = %e, "state_fetch_failed");
                return;
            }
        };

        let device_state = LockDeviceState::from_code(lock.state.state);
        if self.last_device_state != Some(device_state) {
            info!(
                smartlock_id = %self.smartlock_id,
                state = %device_state.as_str(),
                battery_critical = %lock.state.battery_critical,
                "lock_state_changed"
            );
            self.last_device_state = Some(device_state);
        }
    }

    /// Fetch the activity log; a failed fetch is an empty cycle, not an error
    async fn fetch_log(&self) -> Vec<LogRecord> {
        match self.api.smartlock_log(self.smartlock_id, self.config.log_limit()).await {
            Ok(records) => records,
            Err(e) => {
                warn!(smartlock_id = %self.smartlock_id, error = %e, "log_fetch_failed");
                self.metrics.record_fetch_failure();
                Vec::new()
            }
        }
    }
}
