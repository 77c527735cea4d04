//! Metrics collection and exposition.
//!
//! # Metrics
//! - `modularity_discovery_total` (counter): discovery calls by module, source
//! - `modularity_discovery_failures_total` (counter): failures by module, kind
//! - `modularity_discovery_duration_seconds` (histogram): per module
//! - `modularity_routes_registered` (gauge): routes installed per module
//! - `modularity_durable_cache_decode_errors_total` (counter): corrupt artifacts
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::discovery::{DiscoveryError, DiscoveryOutcome};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_discovery(
    module: &str,
    result: &Result<DiscoveryOutcome, DiscoveryError>,
    started: Instant,
) {
    metrics::histogram!("modularity_discovery_duration_seconds", "module" => module.to_string())
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => {
            metrics::counter!(
                "modularity_discovery_total",
                "module" => module.to_string(),
                "source" => outcome.source.as_str()
            )
            .increment(1);
            metrics::gauge!("modularity_routes_registered", "module" => module.to_string())
                .set(outcome.routes as f64);
        }
        Err(e) => {
            metrics::counter!(
                "modularity_discovery_failures_total",
                "module" => module.to_string(),
                "kind" => e.kind()
            )
            .increment(1);
            if let DiscoveryError::DurableWrite { routes, .. } = e {
                metrics::gauge!("modularity_routes_registered", "module" => module.to_string())
                    .set(*routes as f64);
            }
        }
    }
}

pub fn record_durable_decode_error(module: &str) {
    metrics::counter!(
        "modularity_durable_cache_decode_errors_total",
        "module" => module.to_string()
    )
    .increment(1);
}
