//! TCP protocol server: accept loop and connection dispatch.

use std::sync::Arc;

use tracing::Instrument;

use crate::config::{Protocol, TcpConfig};
use crate::lifecycle::{ProxyContext, Shutdown};
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::tcp::relay::handle_connection;

/// TCP reverse proxy instance.
///
/// Cloning yields another handle to the same instance.
#[derive(Debug, Clone)]
pub struct TcpProxy {
    ctx: Arc<ProxyContext>,
    local_address: String,
    config: TcpConfig,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
}

impl TcpProxy {
    pub fn new(ctx: Arc<ProxyContext>, local_address: impl Into<String>, config: TcpConfig) -> Self {
        Self {
            ctx,
            local_address: local_address.into(),
            config,
            tracker: ConnectionTracker::new(Protocol::Tcp),
            shutdown: Shutdown::new(),
        }
    }

    /// Bind the configured address and serve until stopped or accept fails.
    ///
    /// A bind failure is logged and the instance never serves.
    pub async fn start(&self) {
        let listener = match Listener::bind(&self.local_address, self.config.max_connections).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "TCP proxy failed to start");
                return;
            }
        };

        if let Err(e) = self.serve(listener).await {
            tracing::error!(error = %e, "TCP accept loop terminated");
        }
    }

    /// Run the accept loop on an already bound listener.
    ///
    /// The first accept error ends the loop for good. Connections already
    /// relaying are not affected by the loop ending, for any reason.
    pub async fn serve(&self, listener: Listener) -> Result<(), ListenerError> {
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!(
            address = ?listener.local_addr().ok(),
            backends = %self.ctx.backends,
            "TCP proxy started"
        );

        loop {
            let (stream, peer, permit) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = shutdown.recv() => break,
            };

            let guard = self.tracker.track();
            let span = tracing::info_span!("tcp_connection", id = %guard.id(), client = %peer);
            tokio::spawn(
                handle_connection(
                    self.ctx.clone(),
                    stream,
                    peer,
                    self.config.connect_timeout(),
                    guard,
                    permit,
                )
                .instrument(span),
            );
        }

        tracing::info!(
            active_connections = self.tracker.active_count(),
            "TCP proxy stopped accepting"
        );
        Ok(())
    }

    /// Stop accepting. The listening socket is closed once the loop exits.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Connections currently relaying (or dialing).
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    pub fn tracker(&self) -> &ConnectionTracker {
        &self.tracker
    }
}
