//! Structured logging.
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level when set
//! - `debug = true` lowers this crate's level to at least debug

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ProxyConfig;

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(config: &ProxyConfig) -> String {
    let level = config.observability.log_level.trim().to_ascii_lowercase();
    let crate_level = if config.debug && !matches!(level.as_str(), "trace" | "debug") {
        "debug".to_string()
    } else {
        level.clone()
    };
    format!("{},l4_proxy={}", level, crate_level)
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(config: &ProxyConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_raises_crate_verbosity() {
        let mut config = ProxyConfig {
            debug: false,
            ..ProxyConfig::default()
        };
        assert_eq!(default_directive(&config), "info,l4_proxy=info");

        config.debug = true;
        assert_eq!(default_directive(&config), "info,l4_proxy=debug");

        config.observability.log_level = "TRACE".into();
        assert_eq!(default_directive(&config), "trace,l4_proxy=trace");
    }
}
