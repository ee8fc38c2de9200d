//! Command line flags.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Protocol, ProxyConfig};

#[derive(Debug, Parser)]
#[command(name = "l4-proxy")]
#[command(about = "Layer 4 TCP/UDP reverse proxy", long_about = None)]
pub struct Cli {
    /// Protocol to proxy: tcp or udp
    #[arg(short, long)]
    pub protocol: Option<Protocol>,

    /// Address to listen on, host:port
    #[arg(short, long = "local")]
    pub local: Option<String>,

    /// Backend addresses, comma separated
    #[arg(short, long = "servers")]
    pub servers: Option<String>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Backend scheduler name (iphash, random)
    #[arg(long)]
    pub scheduler: Option<String>,

    /// Log every client connect and session release (on by default)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub debug: Option<bool>,

    #[arg(long)]
    pub log_level: Option<String>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Restart when the configuration file changes
    #[arg(long, requires = "config")]
    pub watch_config: bool,
}

impl Cli {
    /// Backends given with `--servers`, blanks dropped.
    pub fn backends(&self) -> Option<Vec<String>> {
        self.servers.as_deref().map(split_servers)
    }

    /// Overlay the flags that were given onto `config`.
    pub fn apply(&self, config: &mut ProxyConfig) {
        if let Some(protocol) = self.protocol {
            config.protocol = protocol;
        }
        if let Some(local) = &self.local {
            config.local_address = local.clone();
        }
        if let Some(backends) = self.backends() {
            config.backends = backends;
        }
        if let Some(scheduler) = &self.scheduler {
            config.scheduler = scheduler.clone();
        }
        if let Some(debug) = self.debug {
            config.debug = debug;
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(address) = &self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = address.clone();
        }
    }
}

fn split_servers(servers: &str) -> Vec<String> {
    servers
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
