//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): logical relay calls
//! - `relay_successes_total` (counter): calls answered by a balancer, by balancer
//! - `relay_errors_total` (counter): calls that exhausted every attempt
//! - `relay_attempt_duration_seconds` (histogram): per attempt, by balancer and outcome
//! - `relay_balancer_up` (gauge): last probe result, 1=up, 0=down
//!
//! # Design Decisions
//! - Recording is always on; exposition is optional (Prometheus exporter)
//! - Labels use the balancer description, never the target URL

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_relay_request() {
    counter!("relay_requests_total").increment(1);
}

pub fn record_relay_success(balancer: &str) {
    counter!("relay_successes_total", "balancer" => balancer.to_string()).increment(1);
}

pub fn record_relay_error() {
    counter!("relay_errors_total").increment(1);
}

/// Record one attempt against `balancer`.
pub fn record_attempt(balancer: &str, success: bool, start: Instant) {
    let outcome = if success { "success" } else { "failure" };
    histogram!(
        "relay_attempt_duration_seconds",
        "balancer" => balancer.to_string(),
        "outcome" => outcome
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a probe result.
pub fn record_balancer_up(balancer: &str, up: bool) {
    gauge!("relay_balancer_up", "balancer" => balancer.to_string()).set(if up { 1.0 } else { 0.0 });
}
