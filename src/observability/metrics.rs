//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_sessions_total` (counter): upgrade outcomes by `outcome`
//! - `gateway_process_launch_failures_total` (counter): spawn errors
//! - `gateway_rendezvous_failures_total` (counter): children that never connected back, or accept errors
//! - `gateway_active_processes` (gauge): processes currently attached to a session
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::process::AcquireError;

/// Install the Prometheus exporter with its own HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session(outcome: &'static str) {
    metrics::counter!("gateway_sessions_total", "outcome" => outcome).increment(1);
}

pub fn record_acquire_failure(error: &AcquireError) {
    match error {
        AcquireError::Launch { .. } => {
            metrics::counter!("gateway_process_launch_failures_total").increment(1)
        }
        AcquireError::AcceptTimeout(_) | AcquireError::Accept(_) => {
            metrics::counter!("gateway_rendezvous_failures_total").increment(1)
        }
    }
}

pub fn process_started() {
    metrics::gauge!("gateway_active_processes").increment(1.0);
}

pub fn process_finished() {
    metrics::gauge!("gateway_active_processes").decrement(1.0);
}
