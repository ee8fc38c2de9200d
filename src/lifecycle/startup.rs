//! Startup resolution.
//!
//! Turns a validated [`ProxyConfig`] into the immutable state the protocol
//! servers share. Fails fast: an unknown scheduler or an empty backend list
//! never reaches the data path.

use std::sync::Arc;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::scheduler::backends::EmptyBackendSet;
use crate::scheduler::{BackendSet, Scheduler, SchedulerRegistry, UnknownScheduler};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    UnknownScheduler(#[from] UnknownScheduler),

    #[error(transparent)]
    NoBackends(#[from] EmptyBackendSet),
}

/// Read-only state shared by every connection handler.
#[derive(Debug, Clone)]
pub struct ProxyContext {
    pub backends: BackendSet,
    pub scheduler: Arc<dyn Scheduler>,
    /// Emit per-client lifecycle lines.
    pub debug: bool,
}

impl ProxyContext {
    /// Backend for a client key.
    pub fn select(&self, client_key: &str) -> &str {
        self.scheduler.select(client_key, &self.backends)
    }
}

/// Resolve the scheduler and backend set named by `config`.
pub fn prepare(
    config: &ProxyConfig,
    registry: &SchedulerRegistry,
) -> Result<Arc<ProxyContext>, StartupError> {
    let scheduler = registry.resolve(&config.scheduler)?;
    let backends = BackendSet::new(config.backends.clone())?;

    tracing::debug!(
        scheduler = %config.scheduler,
        backends = %backends,
        "Startup state resolved"
    );

    Ok(Arc::new(ProxyContext {
        backends,
        scheduler,
        debug: config.debug,
    }))
}
