//! Queue items for the UDP pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

/// One datagram in flight through the proxy.
///
/// On the inbound queue `peer` is the client that sent it. On the outbound
/// queue `peer` is the client to deliver to and `socket` the listening socket
/// to deliver through, so the writer never needs a session lookup.
#[derive(Debug)]
pub struct Message {
    pub payload: Vec<u8>,
    pub socket: Arc<UdpSocket>,
    pub peer: SocketAddr,
}

impl Message {
    pub fn new(payload: Vec<u8>, socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self {
            payload,
            socket,
            peer,
        }
    }
}
