//! Layer 4 reverse proxy library

pub mod cli;
pub mod config;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod proxy;
pub mod scheduler;
pub mod tcp;
pub mod udp;

pub use config::schema::ProxyConfig;
pub use lifecycle::Shutdown;
pub use proxy::{Proxy, ProtocolServer, StopReason};
pub use scheduler::SchedulerRegistry;
