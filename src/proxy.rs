//! Orchestrator: owns one protocol server and runs it until a trigger fires.

use std::future::Future;

use thiserror::Error;

use crate::config::{Protocol, ProxyConfig};
use crate::lifecycle::restart::{self, RestartError};
use crate::lifecycle::{prepare, Shutdown, StartupError, Trigger, Triggers};
use crate::scheduler::SchedulerRegistry;
use crate::tcp::TcpProxy;
use crate::udp::UdpProxy;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("reload failed: {0}")]
    Restart(#[from] RestartError),
}

/// The server for the configured protocol.
#[derive(Debug, Clone)]
pub enum ProtocolServer {
    Tcp(TcpProxy),
    Udp(UdpProxy),
}

impl ProtocolServer {
    pub async fn start(&self) {
        match self {
            Self::Tcp(server) => server.start().await,
            Self::Udp(server) => server.start().await,
        }
    }

    pub fn stop(&self) {
        match self {
            Self::Tcp(server) => server.stop(),
            Self::Udp(server) => server.stop(),
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Self::Tcp(_) => Protocol::Tcp,
            Self::Udp(_) => Protocol::Udp,
        }
    }
}

/// Why [`Proxy::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Triggered(Trigger),
    /// [`Proxy::stop`] was called.
    Stopped,
}

#[derive(Debug)]
pub struct Proxy {
    server: ProtocolServer,
    shutdown: Shutdown,
}

impl Proxy {
    /// Build the server for `config`. Scheduler and backends are resolved here.
    pub fn new(config: &ProxyConfig, registry: &SchedulerRegistry) -> Result<Self, StartupError> {
        let ctx = prepare(config, registry)?;
        let server = match config.protocol {
            Protocol::Tcp => ProtocolServer::Tcp(TcpProxy::new(
                ctx,
                config.local_address.clone(),
                config.tcp.clone(),
            )),
            Protocol::Udp => ProtocolServer::Udp(UdpProxy::new(
                ctx,
                config.local_address.clone(),
                config.udp.clone(),
            )),
        };

        Ok(Self {
            server,
            shutdown: Shutdown::new(),
        })
    }

    pub fn server(&self) -> &ProtocolServer {
        &self.server
    }

    /// Ask a running [`run_until`](Self::run_until) to return. Safe to call
    /// any number of times, from anywhere, before or during the run.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Serve until `trigger` resolves or [`stop`](Self::stop) is called, then
    /// stop the server and wait for it to wind down.
    pub async fn run_until<F>(&self, trigger: F) -> StopReason
    where
        F: Future<Output = Trigger>,
    {
        let mut stopped = self.shutdown.subscribe();
        let server = self.server.clone();
        let mut task = tokio::spawn(async move { server.start().await });

        tracing::info!(protocol = %self.server.protocol(), "Proxy running");

        let reason = tokio::select! {
            trigger = trigger => StopReason::Triggered(trigger),
            _ = stopped.recv() => StopReason::Stopped,
            // The server gave up on its own (bind or accept failure).
            _ = &mut task => {
                self.server.stop();
                return StopReason::Stopped;
            }
        };

        self.server.stop();
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Server task failed");
        }
        tracing::info!(?reason, "Proxy stopped");
        reason
    }

    /// Serve until a trigger from `triggers`. A reload stops this instance and
    /// starts a new copy of the process, returning once that copy exits.
    pub async fn start(&self, mut triggers: Triggers) -> Result<StopReason, LifecycleError> {
        let reason = self.run_until(triggers.next()).await;

        if reason == StopReason::Triggered(Trigger::Reload) {
            tracing::info!("Reloading: restarting process");
            let status = restart::respawn().await?;
            tracing::info!(%status, "Restarted instance exited");
        }
        Ok(reason)
    }
}
