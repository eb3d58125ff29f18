//! Prometheus metrics for the worker.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP listener on `port`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vgen_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vgen_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vgen_jobs_failed_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "vgen_jobs_cancelled_total";

    pub const POLL_ATTEMPTS_TOTAL: &str = "vgen_poll_attempts_total";
    pub const ACTIVE_POLLERS: &str = "vgen_active_pollers";

    pub const PROVIDER_ERRORS_TOTAL: &str = "vgen_provider_errors_total";
}

/// Record a job accepted by the provider.
pub fn record_job_submitted(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

/// Record a failed job. `reason` is one of `submission`, `provider`, `polling`, `timeout`.
pub fn record_job_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_job_cancelled() {
    counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
}

pub fn record_poll_attempt() {
    counter!(names::POLL_ATTEMPTS_TOTAL).increment(1);
}

/// Record a provider call that returned an error.
pub fn record_provider_error(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::PROVIDER_ERRORS_TOTAL, &labels).increment(1);
}

pub fn set_active_pollers(count: usize) {
    gauge!(names::ACTIVE_POLLERS).set(count as f64);
}
