use std::net::SocketAddr;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use moat_dns::helpers;
use tokio::{net::UdpSocket, time::Instant};

/// Largest UDP answer accepted from an upstream.
const MAX_BUFFER_SIZE: usize = 4096;

/// A single UDP connection to an upstream server.
#[derive(Debug)]
pub(crate) struct UdpConn {
    socket: UdpSocket,
}

impl UdpConn {
    /// Create a new UDP connection to the specified upstream address utilizing source port randomization.
    pub async fn new(upstream_addr: SocketAddr) -> anyhow::Result<Self> {
        let bind_addr = if upstream_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(upstream_addr).await?;
        Ok(Self { socket })
    }

    /// Send a DNS query and wait for the response carrying the same transaction id.
    pub async fn send_and_receive(&self, query: &[u8], deadline: Instant) -> anyhow::Result<Bytes> {
        let want_id = helpers::extract_transaction_id(query).context("query too short")?;

        tokio::time::timeout_at(deadline, self.socket.send(query))
            .await
            .context("send timeout")??;

        let mut buf = BytesMut::zeroed(MAX_BUFFER_SIZE);

        loop {
            let n = tokio::time::timeout_at(deadline, self.socket.recv(&mut buf))
                .await
                .context("recv timeout")??;

            // stray datagrams are ignored, the id check happens again after decoding
            let packet = &buf[..n];
            if helpers::is_response(packet) && helpers::extract_transaction_id(packet) == Some(want_id) {
                buf.truncate(n);
                return Ok(buf.freeze());
            }
        }
    }
}
