//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::{mpsc, Mutex};

use l4_proxy::lifecycle::{prepare, ProxyContext};
use l4_proxy::scheduler::{SchedulerRegistry, IP_HASH};
use l4_proxy::ProxyConfig;

/// Start a TCP backend that echoes everything back on each connection.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = socket.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a TCP backend that reports when each accepted connection is closed
/// by the peer. The first message is the accepted connection's peer address.
pub async fn start_observed_backend() -> (SocketAddr, mpsc::UnboundedReceiver<&'static str>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let _ = tx.send("accepted");
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                let _ = tx.send("closed");
            });
        }
    });
    (addr, rx)
}

/// A UDP backend that answers "ping" with "pong" (anything else is echoed)
/// and records the origin of every datagram it receives.
pub struct UdpBackend {
    pub addr: SocketAddr,
    pub origins: Arc<Mutex<Vec<SocketAddr>>>,
}

pub async fn start_udp_backend() -> UdpBackend {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let origins = Arc::new(Mutex::new(Vec::new()));
    let seen = origins.clone();

    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((n, from)) = socket.recv_from(&mut buf).await {
            seen.lock().await.push(from);
            let reply: &[u8] = if &buf[..n] == b"ping" { b"pong" } else { &buf[..n] };
            let _ = socket.send_to(reply, from).await;
        }
    });
    UdpBackend { addr, origins }
}

/// An address nothing listens on.
pub async fn unused_tcp_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn context(backends: &[SocketAddr], scheduler: &str) -> Arc<ProxyContext> {
    let config = ProxyConfig {
        backends: backends.iter().map(|b| b.to_string()).collect(),
        scheduler: scheduler.to_string(),
        ..ProxyConfig::default()
    };
    prepare(&config, &SchedulerRegistry::with_builtin()).unwrap()
}

pub fn iphash_context(backends: &[SocketAddr]) -> Arc<ProxyContext> {
    context(backends, IP_HASH)
}

/// Receive one datagram or fail after a second.
pub async fn recv_datagram(socket: &UdpSocket) -> Vec<u8> {
    let mut buf = [0u8; 2048];
    let n = tokio::time::timeout(Duration::from_secs(1), socket.recv(&mut buf))
        .await
        .expect("no reply within a second")
        .unwrap();
    buf[..n].to_vec()
}

/// Poll `check` every 10ms until it holds or `timeout` passes.
pub async fn eventually<F: FnMut() -> bool>(timeout: Duration, mut check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
