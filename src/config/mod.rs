//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → CLI flags override file values (cli.rs)
//!     → validation.rs (semantic checks, scheduler name)
//!     → ProxyConfig (validated, immutable)
//!     → orchestrator builds the protocol server from it
//!
//! On file change (optional):
//!     watcher.rs detects change
//!     → loader.rs + validation.rs check the new file
//!     → reload trigger → orchestrator restarts the process
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::ConfigError;
pub use schema::ObservabilityConfig;
pub use schema::Protocol;
pub use schema::ProxyConfig;
pub use schema::TcpConfig;
pub use schema::UdpConfig;
