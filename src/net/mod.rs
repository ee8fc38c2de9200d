//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifetime tracking)
//!     → dial.rs (backend socket)
//!     → Hand off to the TCP relay
//!
//! First UDP datagram from a client
//!     → dial.rs (connected backend socket)
//!     → connection.rs (session tracking)
//!     → Hand off to the UDP session table
//! ```
//!
//! # Design Decisions
//! - Bounded accept prevents resource exhaustion
//! - Errors caused by our own closing of a socket are expected and never
//!   reported as failures

pub mod connection;
pub mod dial;
pub mod listener;

use std::io;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use dial::{dial_tcp, dial_udp, DialError};
pub use listener::{ConnectionPermit, Listener, ListenerError};

/// True for errors that only mean "the other side of this relay is already gone".
pub fn is_expected_close(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotConnected | io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionAborted
    )
}
