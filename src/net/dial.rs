//! Backend-facing sockets.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{lookup_host, TcpStream, UdpSocket};

/// Failure to reach a backend. Local to one connection or session.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("failed to connect to backend {backend}: {source}")]
    Connect {
        backend: String,
        source: std::io::Error,
    },

    #[error("timed out connecting to backend {backend} after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },

    #[error("backend {backend} did not resolve to any address")]
    Unresolved { backend: String },
}

/// Open a TCP connection to `backend`, giving up after `timeout`.
pub async fn dial_tcp(backend: &str, timeout: Duration) -> Result<TcpStream, DialError> {
    match tokio::time::timeout(timeout, TcpStream::connect(backend)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(DialError::Connect {
            backend: backend.to_string(),
            source,
        }),
        Err(_) => Err(DialError::Timeout {
            backend: backend.to_string(),
            timeout,
        }),
    }
}

/// Bind an ephemeral UDP socket and connect it to `backend`.
///
/// The connected socket only receives datagrams from that backend, which is
/// what makes it usable as per-client NAT state.
pub async fn dial_udp(backend: &str) -> Result<UdpSocket, DialError> {
    let connect_err = |source| DialError::Connect {
        backend: backend.to_string(),
        source,
    };

    let target = lookup_host(backend)
        .await
        .map_err(connect_err)?
        .next()
        .ok_or_else(|| DialError::Unresolved {
            backend: backend.to_string(),
        })?;

    let local: SocketAddr = match target {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = UdpSocket::bind(local).await.map_err(connect_err)?;
    socket.connect(target).await.map_err(connect_err)?;
    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tcp_refused_is_connect_error() {
        // Bind then drop to find a port that is almost certainly closed.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = probe.local_addr().unwrap().to_string();
        drop(probe);

        let err = dial_tcp(&addr, Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, DialError::Connect { .. }));
    }

    #[tokio::test]
    async fn udp_socket_is_connected_to_backend() {
        let backend = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let backend_addr = backend.local_addr().unwrap();

        let socket = dial_udp(&backend_addr.to_string()).await.unwrap();
        assert_eq!(socket.peer_addr().unwrap(), backend_addr);

        socket.send(b"hello").await.unwrap();
        let mut buf = [0u8; 16];
        let (n, from) = backend.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
        assert_eq!(from.port(), socket.local_addr().unwrap().port());
    }

    #[tokio::test]
    async fn udp_malformed_backend_fails() {
        assert!(dial_udp("no-port-here").await.is_err());
    }
}
