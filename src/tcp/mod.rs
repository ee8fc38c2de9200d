//! TCP proxying.
//!
//! # Data Flow
//! ```text
//! proxy.rs: bind → accept loop
//!     → per connection: scheduler picks backend from the peer address
//!     → relay.rs: dial backend, two copy tasks, first to finish closes both
//! ```
//!
//! # Design Decisions
//! - One task for accept, two per live connection
//! - Any accept error ends the accept loop of the instance
//! - Dial failures only affect the connection that triggered them

pub mod proxy;
pub mod relay;

pub use proxy::TcpProxy;
pub use relay::{relay, Finished};
