//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scheduler::IP_HASH;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Transport to proxy.
    pub protocol: Protocol,

    /// Local bind address (e.g., "0.0.0.0:8080").
    pub local_address: String,

    /// Backend addresses, in selection order.
    pub backends: Vec<String>,

    /// Name of the registered scheduling strategy.
    pub scheduler: String,

    /// Emit per-client lifecycle lines. On unless turned off.
    pub debug: bool,

    /// TCP relay settings.
    pub tcp: TcpConfig,

    /// UDP session settings.
    pub udp: UdpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            protocol: Protocol::Tcp,
            local_address: "0.0.0.0:8080".to_string(),
            backends: Vec::new(),
            scheduler: IP_HASH.to_string(),
            debug: true,
            tcp: TcpConfig::default(),
            udp: UdpConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Supported transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    /// Lowercase name, used for metric labels and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unsupported protocol '{}', expected tcp or udp", other)),
        }
    }
}

/// TCP relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Backend dial timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Maximum concurrently relayed connections (backpressure on accept).
    pub max_connections: usize,
}

impl TcpConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 2000,
            max_connections: 10_000,
        }
    }
}

/// UDP session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Idle time after which a session is reclaimed, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Period of the reclaimer pass, in milliseconds.
    pub reclaim_interval_ms: u64,

    /// Capacity of each of the inbound and outbound message queues.
    pub queue_capacity: usize,

    /// Receive buffer size per datagram.
    pub buffer_size: usize,
}

impl UdpConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_millis(self.reclaim_interval_ms)
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 30_000,
            reclaim_interval_ms: 10_000,
            queue_capacity: 1024,
            buffer_size: 4096,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_parses_case_insensitively() {
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!(" udp ".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!("sctp".parse::<Protocol>().is_err());
    }

    #[test]
    fn defaults_match_session_constants() {
        let config = ProxyConfig::default();
        assert_eq!(config.protocol, Protocol::Tcp);
        assert_eq!(config.scheduler, "iphash");
        assert!(config.debug);
        assert_eq!(config.udp.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.udp.reclaim_interval(), Duration::from_secs(10));
        assert_eq!(config.udp.queue_capacity, 1024);
        assert_eq!(config.tcp.connect_timeout(), Duration::from_secs(2));
    }
}
