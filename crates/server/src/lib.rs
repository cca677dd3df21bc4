use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use futures::FutureExt;
use moat_context::{DnsRequest, RequestType};
use moat_dns::{DnsMessage, DnsMessageBuilder, writer::MAX_MESSAGE_SIZE};
use moat_resolver::Resolver;
use tcp::run_tcp;
use tokio::{
    net::{TcpListener, UdpSocket},
    time::Instant,
};
use tracing::Instrument;
use udp::run_udp;

mod tcp;
mod udp;

/// Payload limit for UDP clients without EDNS.
pub const DEFAULT_UDP_PAYLOAD_SIZE: usize = 512;

pub struct ServerState {
    /// Head of the resolver chain
    pub resolver: Arc<dyn Resolver>,
    /// Time budget of a single request
    pub timeout: Duration,
}

/// DNS Server
pub struct DnsServer {
    bind_addr: SocketAddr,
    state: Arc<ServerState>,
}

impl DnsServer {
    pub fn new(bind_addr: SocketAddr, state: ServerState) -> Self {
        Self {
            bind_addr,
            state: Arc::new(state),
        }
    }

    /// Run the DNS server, listening for incoming requests over UDP and TCP.
    pub async fn run(self) -> anyhow::Result<()> {
        let socket = UdpSocket::bind(self.bind_addr).await?;
        tracing::info!("UDP listening on {}", self.bind_addr);

        let listener = TcpListener::bind(self.bind_addr).await?;
        tracing::info!("TCP listening on {}", self.bind_addr);

        let futures = vec![
            run_udp(socket, self.state.clone()).boxed(),
            run_tcp(listener, self.state.clone()).boxed(),
        ];

        futures::future::try_join_all(futures).await?;

        Ok(())
    }
}

/// Decode a raw query, `None` if it is not a DNS message.
pub(crate) fn decode_request(
    raw: &[u8],
    request_type: RequestType,
    client: SocketAddr,
    timeout: Duration,
) -> Option<DnsRequest> {
    match DnsRequest::decode(raw, request_type, Some(client), timeout) {
        Ok(request) => Some(request),
        Err(e) => {
            tracing::warn!(client = %client, protocol = ?request_type, "dropping undecodable query: {e:#}");
            None
        }
    }
}

/// Resolve a request through the chain and encode the answer for the client.
pub(crate) async fn process(state: &ServerState, request: &DnsRequest) -> anyhow::Result<Bytes> {
    let started = Instant::now();

    let result = state.resolver.resolve(request).instrument(request.span().clone()).await;

    let message = match result {
        Ok(response) => {
            tracing::debug!(
                parent: request.span(),
                reason = %response.reason,
                resolver_type = %response.resolver_type,
                answers = response.message.answers().len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "query resolved"
            );
            prepare_response(request.message(), response.message)
        }
        Err(e) => {
            tracing::error!(
                parent: request.span(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "failed to resolve query: {e}"
            );
            DnsMessageBuilder::response_to(request.message())
                .with_response(e.response_code())
                .build()
        }
    };

    encode_for(request, message)
}

/// Align a chain answer with the client query.
fn prepare_response(query: &DnsMessage, mut message: DnsMessage) -> DnsMessage {
    message.id = query.id;
    message.flags.response = true;
    message.flags.recursion_desired = query.flags.recursion_desired;
    message.flags.recursion_available = true;
    message
}

/// Encode `message`, truncating it when it exceeds what the client accepts.
fn encode_for(request: &DnsRequest, mut message: DnsMessage) -> anyhow::Result<Bytes> {
    message.flags.recursion_available = true;

    let max_size = match request.request_type() {
        RequestType::TCP => MAX_MESSAGE_SIZE,
        RequestType::UDP => request
            .message()
            .edns()
            .map(|e| e.udp_payload_size as usize)
            .unwrap_or(DEFAULT_UDP_PAYLOAD_SIZE)
            .max(DEFAULT_UDP_PAYLOAD_SIZE),
    };

    let bytes = message.encode()?;
    if bytes.len() <= max_size {
        return Ok(bytes);
    }

    tracing::debug!(size = bytes.len(), max_size, "answer too large, truncating");
    message.clear_records();
    message.flags.truncated = true;
    message.encode()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod lib_tests;
