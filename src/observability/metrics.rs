//! Metrics collection and exposition.
//!
//! # Metrics
//! - `jobs_submitted_total` (counter): accepted submissions
//! - `jobs_finished_total` (counter): terminal transitions by status
//! - `jobs_in_flight` (gauge): jobs currently executing
//! - `job_duration_seconds` (histogram): processing start to terminal state
//! - `solver_duration_seconds` (histogram): solver round trip by solver and outcome
//! - `toll_crossings_total` (counter): attributed crossings by corridor
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the Prometheus exporter is
//!   installed once at startup and is optional
//! - Labels stay low-cardinality: no job ids, no vehicle ids

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_job_submitted() {
    metrics::counter!("jobs_submitted_total").increment(1);
}

pub fn record_job_started() {
    metrics::gauge!("jobs_in_flight").increment(1.0);
}

/// Record a terminal transition. `started` is when processing began.
pub fn record_job_finished(status: &'static str, started: Instant) {
    metrics::gauge!("jobs_in_flight").decrement(1.0);
    metrics::counter!("jobs_finished_total", "status" => status).increment(1);
    metrics::histogram!("job_duration_seconds", "status" => status)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_solver_call(solver: &str, success: bool, started: Instant) {
    let outcome = if success { "ok" } else { "error" };
    metrics::histogram!(
        "solver_duration_seconds",
        "solver" => solver.to_string(),
        "outcome" => outcome
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_toll_crossing(corridor: &str) {
    metrics::counter!("toll_crossings_total", "corridor" => corridor.to_string()).increment(1);
}
