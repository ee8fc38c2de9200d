//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the scheduler name is registered
//! - Validate address shapes and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before the orchestrator is constructed, so a bad scheduler name
//!   never reaches the data path

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::scheduler::SchedulerRegistry;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("local address must not be empty")]
    EmptyLocalAddress,

    #[error("invalid {field} address '{value}': expected host:port")]
    InvalidAddress { field: &'static str, value: String },

    #[error("at least one backend is required")]
    NoBackends,

    #[error("unknown scheduler '{name}', available: {available}")]
    UnknownScheduler { name: String, available: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a merged configuration against the available schedulers.
pub fn validate_config(
    config: &ProxyConfig,
    schedulers: &SchedulerRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.local_address.trim().is_empty() {
        errors.push(ValidationError::EmptyLocalAddress);
    } else if !is_host_port(&config.local_address) {
        errors.push(ValidationError::InvalidAddress {
            field: "local",
            value: config.local_address.clone(),
        });
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }
    for backend in &config.backends {
        if !is_host_port(backend) {
            errors.push(ValidationError::InvalidAddress {
                field: "backend",
                value: backend.clone(),
            });
        }
    }

    if schedulers.get(&config.scheduler).is_none() {
        errors.push(ValidationError::UnknownScheduler {
            name: config.scheduler.clone(),
            available: schedulers.names().join(", "),
        });
    }

    if config.tcp.connect_timeout_ms == 0 {
        errors.push(ValidationError::Zero("tcp.connect_timeout_ms"));
    }
    if config.tcp.max_connections == 0 {
        errors.push(ValidationError::Zero("tcp.max_connections"));
    }
    if config.udp.idle_timeout_ms == 0 {
        errors.push(ValidationError::Zero("udp.idle_timeout_ms"));
    }
    if config.udp.reclaim_interval_ms == 0 {
        errors.push(ValidationError::Zero("udp.reclaim_interval_ms"));
    }
    if config.udp.queue_capacity == 0 {
        errors.push(ValidationError::Zero("udp.queue_capacity"));
    }
    if config.udp.buffer_size == 0 {
        errors.push(ValidationError::Zero("udp.buffer_size"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a numeric port and a non-empty host; `[v6]:port` accepted.
fn is_host_port(value: &str) -> bool {
    match value.trim().rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ProxyConfig {
        ProxyConfig {
            local_address: "127.0.0.1:8080".into(),
            backends: vec!["127.0.0.1:9000".into(), "backend.local:9001".into()],
            ..ProxyConfig::default()
        }
    }

    #[test]
    fn accepts_valid_config() {
        let registry = SchedulerRegistry::with_builtin();
        assert!(validate_config(&valid(), &registry).is_ok());
    }

    #[test]
    fn rejects_unknown_scheduler() {
        let registry = SchedulerRegistry::with_builtin();
        let mut config = valid();
        config.scheduler = "least_conn".into();

        let errors = validate_config(&config, &registry).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnknownScheduler {
                name: "least_conn".into(),
                available: "iphash, random".into(),
            }]
        );
    }

    #[test]
    fn collects_every_error() {
        let registry = SchedulerRegistry::with_builtin();
        let mut config = valid();
        config.local_address = String::new();
        config.backends.clear();
        config.udp.queue_capacity = 0;

        let errors = validate_config(&config, &registry).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::EmptyLocalAddress));
        assert!(errors.contains(&ValidationError::NoBackends));
        assert!(errors.contains(&ValidationError::Zero("udp.queue_capacity")));
    }

    #[test]
    fn rejects_malformed_backend() {
        let registry = SchedulerRegistry::with_builtin();
        let mut config = valid();
        config.backends.push("10.0.0.3".into());

        let errors = validate_config(&config, &registry).unwrap_err();
        assert!(matches!(
            &errors[0],
            ValidationError::InvalidAddress { field: "backend", value } if value == "10.0.0.3"
        ));
    }

    #[test]
    fn host_port_shapes() {
        assert!(is_host_port("0.0.0.0:80"));
        assert!(is_host_port("[::1]:53"));
        assert!(is_host_port("example.com:443"));
        assert!(!is_host_port(":80"));
        assert!(!is_host_port("host:http"));
        assert!(!is_host_port("host:70000"));
    }
}
