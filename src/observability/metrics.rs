//! Metrics collection and exposition.
//!
//! # Metrics
//! - `caddy_admin_api_calls_total` (counter): admin API calls by operation, outcome
//! - `caddy_admin_sync_services_total` (counter): services applied by trigger, result
//! - `caddy_admin_sync_runs_total` (counter): resync and replay runs by trigger
//! - `caddy_admin_registry_services` (gauge): descriptors in the last saved snapshot

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one admin API call. `outcome` is "ok", "rejected" or "unreachable".
pub fn record_admin_call(operation: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "caddy_admin_api_calls_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record the outcome of a resync or startup replay.
pub fn record_sync(trigger: &'static str, synced: usize, failed: usize) {
    ::metrics::counter!("caddy_admin_sync_runs_total", "trigger" => trigger).increment(1);
    ::metrics::counter!(
        "caddy_admin_sync_services_total",
        "trigger" => trigger,
        "result" => "synced"
    )
    .increment(synced as u64);
    ::metrics::counter!(
        "caddy_admin_sync_services_total",
        "trigger" => trigger,
        "result" => "failed"
    )
    .increment(failed as u64);
}

pub fn record_registry_size(services: usize) {
    ::metrics::gauge!("caddy_admin_registry_services").set(services as f64);
}
