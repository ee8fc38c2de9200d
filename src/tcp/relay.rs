//! Per-connection TCP relay.
//!
//! # States
//! ```text
//! Connecting → Relaying → Closed
//! ```
//!
//! A connection dials its backend, then runs two copy tasks, one per
//! direction. Whichever finishes first decides the connection's end: the other
//! task is aborted, which drops its socket halves and closes both sockets.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::Protocol;
use crate::lifecycle::ProxyContext;
use crate::net::{dial_tcp, is_expected_close, ConnectionGuard, ConnectionPermit};
use crate::observability::metrics::{self, Direction};

/// Outcome of a relay: the direction that ended first and the bytes each
/// direction delivered before the connection closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Finished {
    pub direction: Direction,
    pub upstream: u64,
    pub downstream: u64,
}

/// Serve one accepted client connection to completion.
pub(crate) async fn handle_connection(
    ctx: Arc<ProxyContext>,
    client: TcpStream,
    peer: SocketAddr,
    connect_timeout: Duration,
    _guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    if ctx.debug {
        tracing::info!(local = ?client.local_addr().ok(), "Client connected");
    }

    let backend_addr = ctx.select(&peer.to_string()).to_string();
    let backend = match dial_tcp(&backend_addr, connect_timeout).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, "Backend unreachable, dropping client");
            metrics::record_dial_failure(Protocol::Tcp);
            return;
        }
    };
    tracing::info!(
        backend = %backend_addr,
        local = ?backend.local_addr().ok(),
        "Backend connected"
    );

    let finished = relay(client, backend).await;

    tracing::info!(
        backend = %backend_addr,
        first_closed = %finished.direction,
        upstream_bytes = finished.upstream,
        downstream_bytes = finished.downstream,
        "Connection closed"
    );
}

/// Copy bytes both ways until either direction ends, then close both sockets.
pub async fn relay(client: TcpStream, backend: TcpStream) -> Finished {
    let (client_read, client_write) = client.into_split();
    let (backend_read, backend_write) = backend.into_split();

    let upstream_bytes = Arc::new(AtomicU64::new(0));
    let downstream_bytes = Arc::new(AtomicU64::new(0));
    let to_backend = Counted::new(backend_write, Direction::Upstream, upstream_bytes.clone());
    let to_client = Counted::new(client_write, Direction::Downstream, downstream_bytes.clone());

    let upstream = tokio::spawn(pipe(client_read, to_backend).in_current_span());
    let downstream = tokio::spawn(pipe(backend_read, to_client).in_current_span());

    let direction = first_of(upstream, downstream).await;

    Finished {
        direction,
        upstream: upstream_bytes.load(Ordering::Relaxed),
        downstream: downstream_bytes.load(Ordering::Relaxed),
    }
}

/// Wait for whichever copy task finishes first and abort the other.
///
/// The loser is awaited after the abort, so its socket halves are dropped and
/// its byte count is final by the time this returns.
async fn first_of(mut upstream: JoinHandle<()>, mut downstream: JoinHandle<()>) -> Direction {
    let (direction, result) = tokio::select! {
        result = &mut upstream => (Direction::Upstream, result),
        result = &mut downstream => (Direction::Downstream, result),
    };
    let loser = match direction {
        Direction::Upstream => downstream,
        Direction::Downstream => upstream,
    };

    loser.abort();
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(%direction, "Relay task panicked");
        }
    }
    if let Err(e) = loser.await {
        if e.is_panic() {
            tracing::error!("Relay task panicked");
        }
    }

    direction
}

/// Copy one direction until EOF or error.
async fn pipe(mut reader: OwnedReadHalf, mut writer: Counted<OwnedWriteHalf>) {
    let direction = writer.direction;
    match tokio::io::copy(&mut reader, &mut writer).await {
        Ok(bytes) => {
            tracing::trace!(%direction, bytes, "Stream reached EOF");
        }
        Err(e) if is_expected_close(&e) => {
            tracing::trace!(%direction, error = %e, "Stream closed by peer side");
        }
        Err(e) => {
            tracing::warn!(%direction, error = %e, "Relay I/O error");
        }
    }
}

/// Writer that records every chunk it delivers, so an aborted copy still
/// accounts for what it already forwarded.
struct Counted<W> {
    inner: W,
    direction: Direction,
    total: Arc<AtomicU64>,
}

impl<W> Counted<W> {
    fn new(inner: W, direction: Direction, total: Arc<AtomicU64>) -> Self {
        Self {
            inner,
            direction,
            total,
        }
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for Counted<W> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let poll = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = poll {
            self.total.fetch_add(n as u64, Ordering::Relaxed);
            metrics::record_bytes(self.direction, n as u64);
        }
        poll
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Two ends of one loopback TCP connection.
    async fn socket_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (connected.unwrap(), accepted.unwrap().0)
    }

    #[tokio::test]
    async fn relays_both_ways_and_closes_backend_when_client_leaves() {
        let (mut client, proxy_client_end) = socket_pair().await;
        let (proxy_backend_end, mut backend) = socket_pair().await;

        let relay_task = tokio::spawn(relay(proxy_client_end, proxy_backend_end));

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        backend.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        backend.write_all(b"world").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"world");

        drop(client);

        let n = tokio::time::timeout(Duration::from_secs(2), backend.read(&mut buf))
            .await
            .expect("backend should see the close")
            .unwrap_or(0);
        assert_eq!(n, 0);

        let finished = tokio::time::timeout(Duration::from_secs(2), relay_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finished.direction, Direction::Upstream);
        assert_eq!(finished.upstream, 5);
        assert_eq!(finished.downstream, 5);
    }

    #[tokio::test]
    async fn backend_close_closes_client() {
        let (mut client, proxy_client_end) = socket_pair().await;
        let (proxy_backend_end, backend) = socket_pair().await;

        let relay_task = tokio::spawn(relay(proxy_client_end, proxy_backend_end));
        drop(backend);

        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("client should see the close")
            .unwrap_or(0);
        assert_eq!(n, 0);

        let finished = relay_task.await.unwrap();
        assert_eq!(finished.direction, Direction::Downstream);
    }

    #[tokio::test]
    async fn aborted_direction_still_counts_its_bytes() {
        let (mut client, proxy_client_end) = socket_pair().await;
        let (proxy_backend_end, mut backend) = socket_pair().await;

        let relay_task = tokio::spawn(relay(proxy_client_end, proxy_backend_end));

        client.write_all(b"request").await.unwrap();
        let mut request = [0u8; 7];
        backend.read_exact(&mut request).await.unwrap();

        let response = vec![7u8; 100_000];
        let writer = tokio::spawn(async move {
            backend.write_all(&response).await.unwrap();
            backend
        });
        let mut received = vec![0u8; 100_000];
        client.read_exact(&mut received).await.unwrap();
        let _backend = writer.await.unwrap();

        // The client leaves first; the downstream copy is the one aborted.
        drop(client);
        let finished = tokio::time::timeout(Duration::from_secs(2), relay_task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(finished.direction, Direction::Upstream);
        assert_eq!(finished.upstream, 7);
        assert_eq!(finished.downstream, 100_000);
    }
}
