//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_connections_total` (counter): accepted connections / created sessions by protocol
//! - `proxy_active_connections` (gauge): live connections / sessions by protocol
//! - `proxy_dial_failures_total` (counter): failed backend dials by protocol
//! - `proxy_bytes_total` (counter): TCP bytes relayed by direction
//! - `proxy_datagrams_total` (counter): UDP datagrams relayed by direction
//! - `proxy_udp_sessions_active` (gauge): size of the UDP session table
//! - `proxy_udp_sessions_reclaimed_total` (counter): sessions removed by the reclaimer
//!
//! Every recorder call is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::Protocol;

/// Traffic direction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → backend.
    Upstream,
    /// Backend → client.
    Downstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Upstream => "upstream",
            Direction::Downstream => "downstream",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_opened(protocol: Protocol) {
    counter!("proxy_connections_total", "protocol" => protocol.as_str()).increment(1);
    gauge!("proxy_active_connections", "protocol" => protocol.as_str()).increment(1.0);
}

pub fn record_connection_closed(protocol: Protocol) {
    gauge!("proxy_active_connections", "protocol" => protocol.as_str()).decrement(1.0);
}

pub fn record_dial_failure(protocol: Protocol) {
    counter!("proxy_dial_failures_total", "protocol" => protocol.as_str()).increment(1);
}

pub fn record_bytes(direction: Direction, bytes: u64) {
    counter!("proxy_bytes_total", "direction" => direction.as_str()).increment(bytes);
}

pub fn record_datagram(direction: Direction) {
    counter!("proxy_datagrams_total", "direction" => direction.as_str()).increment(1);
}

pub fn record_session_count(active: usize) {
    gauge!("proxy_udp_sessions_active").set(active as f64);
}

pub fn record_sessions_reclaimed(count: usize) {
    counter!("proxy_udp_sessions_reclaimed_total").increment(count as u64);
}
