//! Layer 4 reverse proxy
//!
//! Forwards TCP connections or UDP datagrams to a fixed set of backends.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                      L4 PROXY                        │
//!                     │                                                      │
//!   TCP client ───────┼─▶ tcp::TcpProxy ──▶ scheduler ──▶ tcp::relay ───────┼──▶ backend
//!                     │   (accept loop)     (iphash /     (two copy tasks)   │
//!                     │                      random)                         │
//!   UDP client ───────┼─▶ udp::UdpProxy ──▶ scheduler ──▶ udp::SessionTable ┼──▶ backend
//!                     │   (read loop,                     (one socket per    │
//!                     │    queues)                         client, reclaimed)│
//!                     │                                                      │
//!                     │   proxy::Proxy: runs one server, stops it on a       │
//!                     │   trigger (signal, config change), re-execs on reload │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use l4_proxy::cli::Cli;
use l4_proxy::config::loader::load_config;
use l4_proxy::config::validation::validate_config;
use l4_proxy::config::watcher::ConfigWatcher;
use l4_proxy::config::ProxyConfig;
use l4_proxy::lifecycle::Triggers;
use l4_proxy::observability::{logging, metrics};
use l4_proxy::{Proxy, SchedulerRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config);
    tracing::info!("l4-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let registry = SchedulerRegistry::with_builtin();
    if let Err(errors) = validate_config(&config, &registry) {
        for error in &errors {
            tracing::error!(%error, "Invalid configuration");
        }
        std::process::exit(1);
    }

    tracing::info!(
        protocol = %config.protocol,
        local_address = %config.local_address,
        backends = ?config.backends,
        scheduler = %config.scheduler,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let proxy = Proxy::new(&config, &registry)?;

    let mut triggers = Triggers::from_signals()?;
    // Keep the watcher alive for the whole run.
    let _watcher = match (&cli.config, cli.watch_config) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            triggers = triggers.with_channel(rx);
            Some(watcher.run()?)
        }
        _ => None,
    };

    let reason = proxy.start(triggers).await?;

    tracing::info!(?reason, "Shutdown complete");
    Ok(())
}
