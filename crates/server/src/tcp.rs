use std::sync::Arc;

use moat_context::RequestType;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::{ServerState, decode_request, process};

/// Serve DNS over TCP on `listener`, answering every query of a connection in turn.
pub(crate) async fn run_tcp(listener: TcpListener, state: Arc<ServerState>) -> anyhow::Result<()> {
    loop {
        let (mut stream, client) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            loop {
                let mut len_buf = [0u8; 2];
                if stream.read_exact(&mut len_buf).await.is_err() {
                    // connection closed by the client
                    return;
                }

                let buffer_length = u16::from_be_bytes(len_buf) as usize;
                let mut buf = vec![0; buffer_length];
                if let Err(e) = stream.read_exact(&mut buf).await {
                    tracing::warn!("Failed to read data from client {}: {}", client, e);
                    return;
                }

                let Some(request) = decode_request(&buf, RequestType::TCP, client, state.timeout) else {
                    return;
                };

                let bytes = match process(&state, &request).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(client = %client, "failed to encode response: {e:#}");
                        return;
                    }
                };

                if let Err(e) = write_tcp_response(&mut stream, &bytes).await {
                    tracing::warn!("Failed to write response to client {}: {}", client, e);
                    return;
                }
            }
        });
    }
}

/// Write a length prefixed DNS message to a TCP stream.
async fn write_tcp_response(stream: &mut TcpStream, response: &[u8]) -> anyhow::Result<()> {
    let len = u16::try_from(response.len())?;

    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(response).await?;

    Ok(())
}
