//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_pipeline_batches_total` (counter): applied update batches
//! - `config_changed_paths_total` (counter): paths reported as changed
//! - `config_pipeline_duration_seconds` (histogram): batch latency
//! - `config_processor_failures_total` (counter): by processor
//! - `config_lock_timeouts_total` (counter): mutation lock timeouts
//! - `config_resyncs_total` (counter): backing store resyncs by scope
//! - `config_tenants` (gauge): tenants in the published snapshot
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - The Prometheus exporter serves its own HTTP listener

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_batch(changed_paths: usize, elapsed: Duration) {
    ::metrics::counter!("config_pipeline_batches_total").increment(1);
    ::metrics::counter!("config_changed_paths_total").increment(changed_paths as u64);
    ::metrics::histogram!("config_pipeline_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_processor_failure(processor: &'static str) {
    ::metrics::counter!("config_processor_failures_total", "processor" => processor).increment(1);
}

pub fn record_lock_timeout() {
    ::metrics::counter!("config_lock_timeouts_total").increment(1);
}

pub fn record_resync(scope: &'static str) {
    ::metrics::counter!("config_resyncs_total", "scope" => scope).increment(1);
}

pub fn record_tenants(count: usize) {
    ::metrics::gauge!("config_tenants").set(count as f64);
}
