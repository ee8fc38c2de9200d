//! End-to-end TCP proxying.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use l4_proxy::config::TcpConfig;
use l4_proxy::net::Listener;
use l4_proxy::tcp::TcpProxy;

mod common;

async fn spawn_proxy(backends: &[SocketAddr]) -> (TcpProxy, SocketAddr, JoinHandle<()>) {
    let listener = Listener::bind("127.0.0.1:0", 64).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let proxy = TcpProxy::new(common::iphash_context(backends), addr.to_string(), TcpConfig::default());

    let server = proxy.clone();
    let task = tokio::spawn(async move {
        server.serve(listener).await.unwrap();
    });
    (proxy, addr, task)
}

async fn echo(stream: &mut TcpStream, payload: &[u8]) -> Vec<u8> {
    stream.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    tokio::time::timeout(Duration::from_secs(1), stream.read_exact(&mut buf))
        .await
        .expect("echo timed out")
        .unwrap();
    buf
}

#[tokio::test]
async fn bytes_round_trip_through_proxy() {
    let backend = common::start_echo_backend().await;
    let (proxy, addr, _task) = spawn_proxy(&[backend]).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    assert_eq!(echo(&mut client, &payload).await, payload);
    assert_eq!(echo(&mut client, b"hello").await, b"hello");

    drop(client);
    assert!(proxy.tracker().wait_idle(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn client_close_closes_backend() {
    let (backend, mut events) = common::start_observed_backend().await;
    let (_proxy, addr, _task) = spawn_proxy(&[backend]).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert_eq!(echo(&mut client, b"abc").await, b"abc");
    assert_eq!(events.recv().await, Some("accepted"));

    drop(client);
    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("backend connection left open");
    assert_eq!(event, Some("closed"));
}

#[tokio::test]
async fn backend_close_closes_client() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let backend = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"bye").await.unwrap();
        // Dropping the socket closes the backend side.
    });

    let (proxy, addr, _task) = spawn_proxy(&[backend]).await;
    let mut client = TcpStream::connect(addr).await.unwrap();

    let mut received = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client.read_to_end(&mut received))
        .await
        .expect("client connection left open")
        .unwrap();
    assert_eq!(received, b"bye");
    assert!(proxy.tracker().wait_idle(Duration::from_secs(2)).await);
}

#[tokio::test]
async fn dial_failure_closes_only_that_client() {
    let dead = common::unused_tcp_addr().await;
    let (proxy, addr, task) = spawn_proxy(&[dead]).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(3), client.read(&mut buf))
        .await
        .expect("client not closed after dial failure");
    assert!(matches!(read, Ok(0) | Err(_)));

    // The accept loop keeps running.
    assert!(!task.is_finished());
    assert!(TcpStream::connect(addr).await.is_ok());
    proxy.stop();
}

#[tokio::test]
async fn stopping_listener_keeps_live_connections() {
    let backend = common::start_echo_backend().await;
    let (proxy, addr, task) = spawn_proxy(&[backend]).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    assert_eq!(echo(&mut client, b"before").await, b"before");

    proxy.stop();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("accept loop did not stop")
        .unwrap();

    assert_eq!(echo(&mut client, b"after").await, b"after");
    assert_eq!(proxy.active_connections(), 1);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let backend = common::start_echo_backend().await;
    let (proxy, _addr, task) = spawn_proxy(&[backend]).await;

    proxy.stop();
    proxy.stop();
    tokio::time::timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    proxy.stop();
}

#[tokio::test]
async fn bind_failure_returns_without_serving() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = occupied.local_addr().unwrap();
    let backend = common::start_echo_backend().await;

    let proxy = TcpProxy::new(common::iphash_context(&[backend]), addr.to_string(), TcpConfig::default());
    tokio::time::timeout(Duration::from_secs(1), proxy.start())
        .await
        .expect("start did not return after bind failure");
}
