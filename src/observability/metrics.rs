//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): completed exchanges
//! - `proxy_response_bytes_total` (counter): response body bytes relayed
//! - `proxy_session_errors_total` (counter): sessions ended by error, by kind
//! - `proxy_pool_acquire_total` (counter): acquisitions, by source (pooled/dialed)
//! - `proxy_pool_release_total` (counter): releases, by outcome (pooled/closed/discarded)
//! - `proxy_active_connections` (gauge): live client sessions
//!
//! Recording is a no-op until `init_metrics` installs the exporter, so the
//! helpers are safe to call from tests.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_exchange(response_bytes: u64) {
    metrics::counter!("proxy_requests_total").increment(1);
    metrics::counter!("proxy_response_bytes_total").increment(response_bytes);
}

pub fn record_session_error(kind: &'static str) {
    metrics::counter!("proxy_session_errors_total", "kind" => kind).increment(1);
}

pub fn record_pool_acquire(source: &'static str) {
    metrics::counter!("proxy_pool_acquire_total", "source" => source).increment(1);
}

pub fn record_pool_release(outcome: &'static str) {
    metrics::counter!("proxy_pool_release_total", "outcome" => outcome).increment(1);
}

pub fn record_connection_opened() {
    metrics::gauge!("proxy_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    metrics::gauge!("proxy_active_connections").decrement(1.0);
}
