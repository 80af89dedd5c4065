//! lockwatch - Nuki smart lock access monitor
//!
//! Polls the Nuki Web API for each lock's activity log and derives
//! attributed access events (keypad PIN/fingerprint, manual handle/key),
//! publishing them to MQTT topics and a local JSONL file.
//!
//! Module structure:
//! - `domain/` - Core business types (LogRecord, AttributedEvent, EngineState)
//! - `io/` - External interfaces (Nuki API, MQTT egress, file egress, Prometheus)
//! - `services/` - Business logic (classifier, attribution, admission, batch, poller)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use lockwatch::infra::{Config, Metrics};
use lockwatch::io::{create_egress_channel, MqttPublisher, NukiApi};
use lockwatch::services::LockPoller;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// lockwatch - Nuki smart lock access monitor
#[derive(Parser, Debug)]
#[command(name = "lockwatch", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full per-record visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "lockwatch starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        api_base_url = %config.api_base_url(),
        poll_interval_secs = %config.poll_interval_secs(),
        log_limit = %config.log_limit(),
        detection_window_seconds = %config.detection_window_seconds(),
        enhanced_logging = %config.enhanced_logging(),
        mqtt_egress = %config.mqtt_egress_enabled(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );

    let api = Arc::new(NukiApi::new(
        config.api_base_url(),
        config.api_token(),
        Duration::from_secs(config.api_timeout_secs()),
    )?);

    api.test_connection().await?;
    info!("nuki_api_connected");

    let smartlocks = api.list_smartlocks().await?;
    if smartlocks.is_empty() {
        anyhow::bail!("No Nuki smartlocks found in your account");
    }
    info!(count = %smartlocks.len(), "smartlocks_discovered");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let metrics = Arc::new(Metrics::new());

    // Periodic metrics summary log
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Prometheus metrics endpoint (port 0 disables)
    if config.prometheus_port() > 0 {
        let prometheus_metrics = metrics.clone();
        let prometheus_port = config.prometheus_port();
        let prometheus_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = lockwatch::io::prometheus::start_metrics_server(
                prometheus_port,
                prometheus_metrics,
                prometheus_shutdown,
            )
            .await
            {
                warn!(error = %e, "prometheus_server_error");
            }
        });
    }

    // Create MQTT egress channel and publisher (if enabled)
    let egress_sender = if config.mqtt_egress_enabled() {
        let (egress_sender, egress_rx) = create_egress_channel(1000, metrics.clone());

        let publisher = MqttPublisher::new(&config, egress_rx);
        let publisher_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            publisher.run(publisher_shutdown).await;
        });

        Some(egress_sender)
    } else {
        None
    };

    // One poller task per lock; each owns its lock's engine state
    for smartlock in &smartlocks {
        info!(
            smartlock_id = %smartlock.smartlock_id,
            name = %smartlock.name,
            "setting_up_lock"
        );

        let poller = LockPoller::new(
            api.clone(),
            smartlock.smartlock_id,
            smartlock.name.clone(),
            config.clone(),
            egress_sender.clone(),
            metrics.clone(),
        );
        let poller_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            poller.run(poller_shutdown).await;
        });
    }

    // Handle shutdown on Ctrl+C
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(true);

    // Give tasks a moment to drain
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("lockwatch shutdown complete");
    Ok(())
}
