//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_active_tunnels` (gauge): registered control connections
//! - `relay_proxied_sockets` (gauge): open tunneled public WebSockets
//! - `relay_requests_total` (counter): forwarded HTTP requests by status
//! - `relay_request_duration_seconds` (histogram): forwarding latency
//! - `relay_reply_timeouts_total` (counter): correlated requests that expired
//! - `relay_auth_total` (counter): handshakes by mode and outcome
//! - `relay_dropped_frames_total` (counter): ignored control frames by reason

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_tunnel_registered() {
    gauge!("relay_active_tunnels").increment(1.0);
}

pub fn record_tunnel_unregistered() {
    gauge!("relay_active_tunnels").decrement(1.0);
}

pub fn record_socket_opened() {
    gauge!("relay_proxied_sockets").increment(1.0);
}

pub fn record_socket_closed() {
    gauge!("relay_proxied_sockets").decrement(1.0);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("relay_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_reply_timeout(kind: &'static str) {
    counter!("relay_reply_timeouts_total", "kind" => kind).increment(1);
}

pub fn record_auth(mode: &'static str, outcome: &'static str) {
    counter!("relay_auth_total", "mode" => mode, "outcome" => outcome).increment(1);
}

pub fn record_dropped_frame(reason: &'static str) {
    counter!("relay_dropped_frames_total", "reason" => reason).increment(1);
}
