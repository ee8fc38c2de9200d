//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → resolve scheduler + backends → ProxyContext
//!
//! Triggers (signals.rs):
//!     SIGTERM/SIGINT/SIGQUIT → Terminate
//!     SIGHUP, config change  → Reload
//!
//! Shutdown (shutdown.rs):
//!     Trigger or stop() → gate closes → server stops accepting/reading
//!
//! Restart (restart.rs):
//!     Reload → re-exec current binary → wait for it
//! ```
//!
//! # Design Decisions
//! - Fail fast at startup, never at first use
//! - Shutdown is level-triggered, so late subscribers still see it
//! - Reload is a hard cutover; nothing is drained or migrated

pub mod restart;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{Trigger, Triggers};
pub use startup::{prepare, ProxyContext, StartupError};
