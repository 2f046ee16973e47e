//! Metrics collection and exposition.
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): requests by method and status
//! - `switchyard_request_duration_seconds` (histogram): time spent in `App::serve`
//! - `switchyard_faults_total` (counter): handler faults by phase
//! - `switchyard_sessions_active` (gauge): records held by the memory store
//! - `switchyard_session_sweeps_total` (counter): expired records removed
//!
//! # Design Decisions
//! - Recording is always on; without an installed recorder the macros are
//!   no-ops
//! - The Prometheus exporter is only installed when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Record one served request.
pub fn record_request(method: &str, status: u16, started: Instant) {
    metrics::counter!(
        "switchyard_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("switchyard_request_duration_seconds")
        .record(started.elapsed().as_secs_f64());
}

/// Record a handler fault caught at the request boundary.
pub fn record_fault(phase: &'static str) {
    metrics::counter!("switchyard_faults_total", "phase" => phase).increment(1);
}

pub fn record_sessions(active: usize) {
    metrics::gauge!("switchyard_sessions_active").set(active as f64);
}

pub fn record_session_sweep(removed: usize) {
    metrics::counter!("switchyard_session_sweeps_total").increment(removed as u64);
}

/// Install the Prometheus exporter listening on `addr`. Must run inside a
/// tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
