//! Backend scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! New client unit (TCP connection / first UDP datagram)
//!     → client key ("host:port" of the peer)
//!     → SchedulerRegistry (resolved once at startup by name)
//!     → Scheduler::select(key, &BackendSet)
//!         - ip_hash.rs (IPv4 value mod N, deterministic)
//!         - random.rs (wall-clock nanos mod N)
//!     → backend address to dial
//! ```
//!
//! # Design Decisions
//! - Strategies are pure: no per-call state, no mutation of the backend set
//! - The registry is an explicit object passed by reference, not a global
//! - Unknown names are rejected at configuration time

pub mod backends;
pub mod ip_hash;
pub mod random;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use backends::BackendSet;
pub use ip_hash::IpHash;
pub use random::Random;

/// Registered name of the IP hash strategy.
pub const IP_HASH: &str = "iphash";
/// Registered name of the random strategy.
pub const RANDOM: &str = "random";

/// A backend selection strategy.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Pick one backend for `client_key`. Always returns a member of `backends`.
    fn select<'a>(&self, client_key: &str, backends: &'a BackendSet) -> &'a str;
}

/// Lookup of a scheduler name that was never registered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scheduler '{name}'")]
pub struct UnknownScheduler {
    pub name: String,
}

/// Name → strategy table, built once at startup.
#[derive(Debug, Default)]
pub struct SchedulerRegistry {
    strategies: HashMap<String, Arc<dyn Scheduler>>,
}

impl SchedulerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in strategies.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(IP_HASH, Arc::new(IpHash));
        registry.register(RANDOM, Arc::new(Random));
        registry
    }

    /// Register (or replace) a strategy under `name`.
    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn Scheduler>) {
        self.strategies.insert(name.into(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.strategies.get(name).cloned()
    }

    /// Like [`get`](Self::get), but an unknown name is an error.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Scheduler>, UnknownScheduler> {
        self.get(name).ok_or_else(|| UnknownScheduler {
            name: name.to_string(),
        })
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
