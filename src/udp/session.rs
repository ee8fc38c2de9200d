//! UDP session table: per-client NAT state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::{ConnectionGuard, ConnectionId};
use crate::observability::metrics;

/// A client's binding to one backend socket.
#[derive(Debug)]
pub struct Session {
    socket: Arc<UdpSocket>,
    backend: String,
    last_active: Instant,
    /// Closing wakes the backend reader; its receiver going away marks the session defunct.
    closer: Shutdown,
    guard: ConnectionGuard,
}

impl Session {
    /// Create a session and the signal its backend reader must watch.
    pub fn new(socket: Arc<UdpSocket>, backend: String, guard: ConnectionGuard) -> (Self, ShutdownSignal) {
        let closer = Shutdown::new();
        let closed = closer.subscribe();
        let session = Self {
            socket,
            backend,
            last_active: Instant::now(),
            closer,
            guard,
        };
        (session, closed)
    }

    pub fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn id(&self) -> ConnectionId {
        self.guard.id()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    pub fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_active) > idle_timeout
    }

    /// The backend reader is gone, so replies can no longer reach the client.
    pub fn is_defunct(&self) -> bool {
        self.closer.receiver_count() == 0
    }

    /// Stop the backend reader. The socket itself is released with the last handle.
    pub fn close(&self) {
        self.closer.trigger();
    }
}

/// Concurrent map of client address → [`Session`].
///
/// Safe for concurrent get/insert/remove/iterate; iteration locks one shard at
/// a time. Never hold a reference across another call on the same table.
#[derive(Debug, Clone, Default)]
pub struct SessionTable {
    sessions: Arc<DashMap<SocketAddr, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend socket of the client's session, if any.
    pub fn socket_for(&self, client: &SocketAddr) -> Option<Arc<UdpSocket>> {
        self.sessions.get(client).map(|session| session.socket().clone())
    }

    /// Store a session. A session it replaces is closed.
    pub fn insert(&self, client: SocketAddr, session: Session) {
        if let Some(previous) = self.sessions.insert(client, session) {
            previous.close();
        }
        metrics::record_session_count(self.sessions.len());
    }

    /// Refresh last-active. No-op if the session is gone.
    pub fn touch(&self, client: &SocketAddr) {
        if let Some(mut session) = self.sessions.get_mut(client) {
            session.touch();
        }
    }

    pub fn contains(&self, client: &SocketAddr) -> bool {
        self.sessions.contains_key(client)
    }

    /// Backend address a client is pinned to.
    pub fn backend_for(&self, client: &SocketAddr) -> Option<String> {
        self.sessions.get(client).map(|session| session.backend().to_string())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close and remove every session idle longer than `idle_timeout` as of
    /// `now`, plus any whose backend reader has died. Returns how many went.
    pub fn reclaim(&self, now: Instant, idle_timeout: Duration) -> usize {
        let mut reclaimed = 0;
        self.sessions.retain(|client, session| {
            if session.is_defunct() {
                tracing::debug!(client = %client, id = %session.id(), "Removing defunct UDP session");
                reclaimed += 1;
                return false;
            }
            if session.is_idle(now, idle_timeout) {
                tracing::debug!(
                    client = %client,
                    id = %session.id(),
                    backend = %session.backend(),
                    local = ?session.socket().local_addr().ok(),
                    "UDP session released"
                );
                session.close();
                reclaimed += 1;
                return false;
            }
            true
        });

        if reclaimed > 0 {
            metrics::record_sessions_reclaimed(reclaimed);
        }
        metrics::record_session_count(self.sessions.len());
        reclaimed
    }

    /// Close and remove every session.
    pub fn close_all(&self) -> usize {
        let mut closed = 0;
        self.sessions.retain(|_, session| {
            session.close();
            closed += 1;
            false
        });
        metrics::record_session_count(0);
        closed
    }

    /// Reclaim idle sessions every `interval` until `shutdown` fires.
    pub async fn run_reclaimer(self, interval: Duration, idle_timeout: Duration, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reclaimed = self.reclaim(Instant::now(), idle_timeout);
                    if reclaimed > 0 {
                        tracing::debug!(reclaimed, remaining = self.len(), "Reclaimer pass");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    }
}
