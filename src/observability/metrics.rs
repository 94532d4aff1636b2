//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lifecycle_probe_duration_seconds` (histogram): probe latency by probe
//! - `lifecycle_probe_status` (gauge): 1=healthy, 0.5=degraded, 0=unhealthy, -1=not configured
//! - `lifecycle_health_evaluations_total` (counter): evaluations by overall status
//! - `lifecycle_requests_rejected_total` (counter): requests refused by the gate
//! - `lifecycle_cleanup_failures_total` (counter): failed cleanup tasks by task
//! - `lifecycle_shutdown_total` (counter): shutdowns by outcome
//! - `lifecycle_shutdown_duration_seconds` (histogram): time spent shutting down

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::{HealthState, OverallStatus};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_probe(name: &str, state: HealthState, elapsed: Duration) {
    let value = match state {
        HealthState::Healthy => 1.0,
        HealthState::Degraded => 0.5,
        HealthState::Unhealthy => 0.0,
        HealthState::NotConfigured => -1.0,
    };
    metrics::gauge!("lifecycle_probe_status", "probe" => name.to_string()).set(value);
    metrics::histogram!("lifecycle_probe_duration_seconds", "probe" => name.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_health_evaluation(status: OverallStatus) {
    metrics::counter!("lifecycle_health_evaluations_total", "status" => status.as_str())
        .increment(1);
}

pub fn record_rejected_request() {
    metrics::counter!("lifecycle_requests_rejected_total").increment(1);
}

pub fn record_cleanup_failure(task: &str) {
    metrics::counter!("lifecycle_cleanup_failures_total", "task" => task.to_string())
        .increment(1);
}

pub fn record_shutdown(outcome: &'static str, elapsed: Duration) {
    metrics::counter!("lifecycle_shutdown_total", "outcome" => outcome).increment(1);
    metrics::histogram!("lifecycle_shutdown_duration_seconds").record(elapsed.as_secs_f64());
}
