use std::sync::Arc;

use bytes::BytesMut;
use moat_context::RequestType;
use tokio::net::UdpSocket;

use crate::{ServerState, decode_request, process};

/// Largest datagram read from a client.
const RECV_SIZE: usize = 4096;

/// Serve DNS over UDP on `socket`, one task per query.
pub(crate) async fn run_udp(socket: UdpSocket, state: Arc<ServerState>) -> anyhow::Result<()> {
    let socket = Arc::new(socket);
    let mut buffer = BytesMut::with_capacity(RECV_SIZE);

    loop {
        buffer.resize(RECV_SIZE, 0);
        let (len, client) = socket.recv_from(&mut buffer[..]).await?;
        let raw = buffer.split_to(len).freeze();

        let socket = socket.clone();
        let state = state.clone();

        tokio::spawn(async move {
            let Some(request) = decode_request(&raw, RequestType::UDP, client, state.timeout) else {
                return;
            };

            let bytes = match process(&state, &request).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(client = %client, "failed to encode response: {e:#}");
                    return;
                }
            };

            if let Err(e) = socket.send_to(&bytes, client).await {
                tracing::warn!("Failed to write response to client {}: {}", client, e);
            }
        });
    }
}
