//! UDP protocol server: read loop, session resolution, reply writer.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::config::{Protocol, UdpConfig};
use crate::lifecycle::{ProxyContext, Shutdown, ShutdownSignal};
use crate::net::{dial_udp, is_expected_close, ConnectionTracker, DialError};
use crate::observability::metrics::{self, Direction};
use crate::udp::message::Message;
use crate::udp::session::{Session, SessionTable};

/// UDP reverse proxy instance.
///
/// Cloning yields another handle to the same instance.
#[derive(Debug, Clone)]
pub struct UdpProxy {
    ctx: Arc<ProxyContext>,
    local_address: String,
    config: UdpConfig,
    sessions: SessionTable,
    tracker: ConnectionTracker,
    shutdown: Shutdown,
}

impl UdpProxy {
    pub fn new(ctx: Arc<ProxyContext>, local_address: impl Into<String>, config: UdpConfig) -> Self {
        Self {
            ctx,
            local_address: local_address.into(),
            config,
            sessions: SessionTable::new(),
            tracker: ConnectionTracker::new(Protocol::Udp),
            shutdown: Shutdown::new(),
        }
    }

    /// Bind the configured address and serve until stopped or the socket fails.
    ///
    /// A bind failure is logged and the instance never serves.
    pub async fn start(&self) {
        match UdpSocket::bind(&self.local_address).await {
            Ok(socket) => self.serve(socket).await,
            Err(e) => {
                tracing::error!(address = %self.local_address, error = %e, "UDP proxy failed to start");
            }
        }
    }

    /// Run the proxy on an already bound socket.
    pub async fn serve(&self, socket: UdpSocket) {
        let listener = Arc::new(socket);
        let mut shutdown = self.shutdown.subscribe();

        tracing::info!(
            address = ?listener.local_addr().ok(),
            backends = %self.ctx.backends,
            "UDP proxy started"
        );

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.queue_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.queue_capacity);

        let resolver = Resolver {
            ctx: self.ctx.clone(),
            sessions: self.sessions.clone(),
            tracker: self.tracker.clone(),
            outbound: outbound_tx,
            buffer_size: self.config.buffer_size,
        };
        let resolver = tokio::spawn(resolver.run(inbound_rx));
        tokio::spawn(write_replies(outbound_rx));
        let reclaimer = tokio::spawn(self.sessions.clone().run_reclaimer(
            self.config.reclaim_interval(),
            self.config.idle_timeout(),
            self.shutdown.subscribe(),
        ));

        let mut buf = vec![0u8; self.config.buffer_size];
        loop {
            let (n, peer) = tokio::select! {
                received = listener.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) if is_expected_close(&e) => break,
                    Err(e) => {
                        tracing::error!(error = %e, "UDP read failed, stopping");
                        break;
                    }
                },
                _ = shutdown.recv() => break,
            };

            if self.ctx.debug && !self.sessions.contains(&peer) {
                tracing::info!(client = %peer, "Client connected");
            }

            // A full queue stalls reading; the kernel drops what overflows.
            let message = Message::new(buf[..n].to_vec(), listener.clone(), peer);
            tokio::select! {
                sent = inbound_tx.send(message) => if sent.is_err() { break },
                _ = shutdown.recv() => break,
            }
        }

        // Closing the inbound queue lets the resolver drain what is queued and exit.
        drop(inbound_tx);
        if let Err(e) = resolver.await {
            tracing::error!(error = %e, "UDP session resolver failed");
        }
        reclaimer.abort();
        let closed = self.sessions.close_all();

        tracing::info!(sessions_closed = closed, "UDP proxy stopped");
    }

    /// Stop reading. Remaining sessions are closed as the server winds down.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// The single consumer of the inbound queue; the only task that creates sessions.
struct Resolver {
    ctx: Arc<ProxyContext>,
    sessions: SessionTable,
    tracker: ConnectionTracker,
    outbound: mpsc::Sender<Message>,
    buffer_size: usize,
}

impl Resolver {
    /// A session reclaimed between lookup and send still gets the datagram,
    /// but its reply is lost because the backend reader is already gone.
    async fn run(self, mut inbound: mpsc::Receiver<Message>) {
        while let Some(message) = inbound.recv().await {
            let backend = match self.sessions.socket_for(&message.peer) {
                Some(socket) => socket,
                None => match self.open_session(&message).await {
                    Ok(socket) => socket,
                    Err(e) => {
                        tracing::warn!(client = %message.peer, error = %e, "Backend unreachable, dropping datagram");
                        metrics::record_dial_failure(Protocol::Udp);
                        continue;
                    }
                },
            };

            match backend.send(&message.payload).await {
                Ok(_) => metrics::record_datagram(Direction::Upstream),
                Err(e) if is_expected_close(&e) => {}
                Err(e) => {
                    tracing::warn!(client = %message.peer, error = %e, "Failed to forward datagram to backend");
                }
            }
            self.sessions.touch(&message.peer);
        }
    }

    /// Dial a backend for a new client, record the session and start its reader.
    async fn open_session(&self, message: &Message) -> Result<Arc<UdpSocket>, DialError> {
        let backend = self.ctx.select(&message.peer.to_string()).to_string();
        let socket = Arc::new(dial_udp(&backend).await?);

        let guard = self.tracker.track();
        let span = tracing::info_span!("udp_session", id = %guard.id(), client = %message.peer);
        tracing::info!(
            parent: &span,
            backend = %backend,
            local = ?socket.local_addr().ok(),
            "Backend session opened"
        );

        let (session, closed) = Session::new(socket.clone(), backend, guard);
        self.sessions.insert(message.peer, session);

        tokio::spawn(
            read_replies(
                socket.clone(),
                closed,
                message.socket.clone(),
                message.peer,
                self.outbound.clone(),
                self.buffer_size,
            )
            .instrument(span),
        );

        Ok(socket)
    }
}

/// Forward everything the backend sends on `backend` to `client` via the outbound queue.
async fn read_replies(
    backend: Arc<UdpSocket>,
    mut closed: ShutdownSignal,
    listener: Arc<UdpSocket>,
    client: SocketAddr,
    outbound: mpsc::Sender<Message>,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let n = tokio::select! {
            received = backend.recv(&mut buf) => match received {
                Ok(n) => n,
                Err(e) if is_expected_close(&e) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read from backend");
                    break;
                }
            },
            _ = closed.recv() => break,
        };

        let reply = Message::new(buf[..n].to_vec(), listener.clone(), client);
        tokio::select! {
            sent = outbound.send(reply) => if sent.is_err() { break },
            _ = closed.recv() => break,
        }
    }
    tracing::trace!("Backend reader finished");
}

/// The single consumer of the outbound queue.
async fn write_replies(mut outbound: mpsc::Receiver<Message>) {
    while let Some(reply) = outbound.recv().await {
        match reply.socket.send_to(&reply.payload, reply.peer).await {
            Ok(_) => metrics::record_datagram(Direction::Downstream),
            Err(e) if is_expected_close(&e) => {}
            Err(e) => {
                tracing::warn!(client = %reply.peer, error = %e, "Failed to deliver reply to client");
            }
        }
    }
}
