//! UDP proxying with fabricated sessions.
//!
//! # Data Flow
//! ```text
//! listening socket ──recv──▶ inbound queue ──▶ resolver ──send──▶ backend socket
//!                                              (lookup / dial,       │
//!                                               session table)       │ recv (one reader
//!                                                                    ▼  per session)
//! listening socket ◀─send_to── writer ◀── outbound queue ◀───────────┘
//!
//! reclaimer: every reclaim_interval, close sessions idle > idle_timeout
//! ```
//!
//! # Design Decisions
//! - Queues are bounded; a full inbound queue stalls the read loop
//! - Sessions are created by the resolver only, so a client never gets two
//! - A session pins its client to a backend until reclaimed, whatever the scheduler

pub mod message;
pub mod proxy;
pub mod session;

pub use message::Message;
pub use proxy::UdpProxy;
pub use session::{Session, SessionTable};
