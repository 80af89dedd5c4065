//! Prometheus metrics HTTP endpoint
//!
//! Exposes lockwatch metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::Metrics;
use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge)
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Write a gauge metric with f64 value
fn write_gauge_f64(output: &mut String, name: &str, help: &str, val: f64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} gauge");
    let _ = writeln!(output, "{name} {val:.6}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics) -> String {
    let summary = metrics.report();
    let mut output = String::with_capacity(2048);

    write_metric(
        &mut output,
        "lockwatch_polls_total",
        "Total poll cycles executed",
        MetricType::Counter,
        summary.polls_total,
    );
    write_metric(
        &mut output,
        "lockwatch_fetch_failures_total",
        "Log fetches that failed and yielded an empty cycle",
        MetricType::Counter,
        summary.fetch_failures_total,
    );
    write_metric(
        &mut output,
        "lockwatch_log_records_total",
        "Raw activity log records examined",
        MetricType::Counter,
        summary.records_total,
    );
    write_metric(
        &mut output,
        "lockwatch_keypad_events_total",
        "Keypad access events emitted",
        MetricType::Counter,
        summary.keypad_events_total,
    );
    write_metric(
        &mut output,
        "lockwatch_manual_events_total",
        "Manual operation events emitted",
        MetricType::Counter,
        summary.manual_events_total,
    );
    write_metric(
        &mut output,
        "lockwatch_payloads_dropped_total",
        "Event payloads dropped because the egress channel was full",
        MetricType::Counter,
        summary.payloads_dropped_total,
    );
    write_gauge_f64(
        &mut output,
        "lockwatch_events_per_min",
        "Events emitted per minute since last scrape",
        summary.events_per_min,
    );

    output
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from("ok")))
            .expect("static response should not fail")),
        _ => Ok(Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::from("Not Found")))
            .expect("static response should not fail")),
    }
}

/// Start the Prometheus metrics HTTP server
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                async move { handle_request(req, metrics).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();
        metrics.record_poll();
        metrics.record_records_seen(20);
        metrics.record_keypad_events(2);
        metrics.record_manual_event();

        let output = format_prometheus_metrics(&metrics);

        assert!(output.contains("lockwatch_polls_total 1"));
        assert!(output.contains("lockwatch_log_records_total 20"));
        assert!(output.contains("lockwatch_keypad_events_total 2"));
        assert!(output.contains("lockwatch_manual_events_total 1"));
        assert!(output.contains("# TYPE lockwatch_polls_total counter"));
        assert!(output.contains("# TYPE lockwatch_events_per_min gauge"));
    }
}
