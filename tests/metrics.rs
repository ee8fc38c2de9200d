//! Relay metrics as seen by an installed Prometheus recorder.
//!
//! The recorder is process-global, so this file holds a single test.

use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use l4_proxy::tcp::relay;

async fn socket_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    (connected.unwrap(), accepted.unwrap().0)
}

/// Value of `name{direction="..."}` in a Prometheus text rendering.
fn counter_value(rendered: &str, name: &str, direction: &str) -> u64 {
    let prefix = format!("{}{{direction=\"{}\"}}", name, direction);
    rendered
        .lines()
        .find(|line| line.starts_with(&prefix))
        .and_then(|line| line.split_whitespace().last())
        .map(|value| value.parse::<f64>().unwrap() as u64)
        .unwrap_or(0)
}

#[tokio::test]
async fn bytes_are_counted_in_both_directions() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    assert!(metrics::set_global_recorder(recorder).is_ok());

    let (mut client, proxy_client_end) = socket_pair().await;
    let (proxy_backend_end, mut backend) = socket_pair().await;
    let relay_task = tokio::spawn(relay(proxy_client_end, proxy_backend_end));

    client.write_all(b"request").await.unwrap();
    let mut request = [0u8; 7];
    backend.read_exact(&mut request).await.unwrap();

    let writer = tokio::spawn(async move {
        backend.write_all(&vec![1u8; 100_000]).await.unwrap();
        backend
    });
    let mut response = vec![0u8; 100_000];
    client.read_exact(&mut response).await.unwrap();
    let _backend = writer.await.unwrap();

    drop(client);
    tokio::time::timeout(Duration::from_secs(2), relay_task)
        .await
        .unwrap()
        .unwrap();

    let rendered = handle.render();
    assert_eq!(counter_value(&rendered, "proxy_bytes_total", "upstream"), 7);
    assert_eq!(counter_value(&rendered, "proxy_bytes_total", "downstream"), 100_000);
}
