use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use moat_context::{DnsRequest, RequestType};
use moat_dns::{DnsMessage, helpers};
use rand::Rng;
use tcp::TcpConn;
use udp::UdpConn;

mod resolver;
mod tcp;
mod udp;

pub use resolver::UpstreamResolver;

/// Default DNS port.
pub const DEFAULT_PORT: u16 = 53;

/// Upper bound for a single upstream exchange.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Performs the wire exchange with one upstream server.
#[async_trait]
pub trait UpstreamClient: fmt::Display + Send + Sync {
    async fn exchange(&self, request: &DnsRequest) -> anyhow::Result<DnsMessage>;
}

/// Transport used to talk to an upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamNet {
    /// UDP, retried over TCP when the answer is truncated
    TcpUdp,
    /// TCP only
    Tcp,
}

impl fmt::Display for UpstreamNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TcpUdp => "tcp+udp",
            Self::Tcp => "tcp",
        })
    }
}

/// Address of an upstream server: `ip`, `ip:port`, `tcp+udp:ip[:port]` or `tcp:ip[:port]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpstreamAddr {
    pub net: UpstreamNet,
    pub addr: SocketAddr,
}

impl FromStr for UpstreamAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();

        let (net, host) = if let Some(rest) = raw.strip_prefix("tcp+udp:") {
            (UpstreamNet::TcpUdp, rest)
        } else if let Some(rest) = raw.strip_prefix("tcp:") {
            (UpstreamNet::Tcp, rest)
        } else {
            (UpstreamNet::TcpUdp, raw)
        };

        let addr = match host.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(_) => {
                let ip = host
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .parse::<IpAddr>()
                    .with_context(|| format!("invalid upstream address '{raw}'"))?;
                SocketAddr::new(ip, DEFAULT_PORT)
            }
        };

        Ok(Self { net, addr })
    }
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net, self.addr)
    }
}

/// Plain DNS upstream over UDP and TCP.
pub struct DnsUpstream {
    addr: UpstreamAddr,
    timeout: Duration,
}

impl DnsUpstream {
    pub fn new(addr: UpstreamAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn exchange_tcp(&self, query: &[u8], deadline: tokio::time::Instant) -> anyhow::Result<bytes::Bytes> {
        let mut conn = TcpConn::connect(self.addr.addr, deadline).await?;
        conn.send_and_receive(query, deadline).await
    }

    async fn exchange_udp(&self, query: &[u8], deadline: tokio::time::Instant) -> anyhow::Result<bytes::Bytes> {
        let conn = UdpConn::new(self.addr.addr).await?;
        conn.send_and_receive(query, deadline).await
    }
}

impl fmt::Display for DnsUpstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

#[async_trait]
impl UpstreamClient for DnsUpstream {
    async fn exchange(&self, request: &DnsRequest) -> anyhow::Result<DnsMessage> {
        let query = request.message();

        // randomized id against cache poisoning, the client id is restored below
        let tid = rand::rng().random::<u16>();
        let mut outgoing = query.clone();
        outgoing.id = tid;
        let raw = outgoing.encode()?;

        let deadline = request.budget().cap(self.timeout);

        let use_udp = self.addr.net == UpstreamNet::TcpUdp && request.request_type() == RequestType::UDP;

        let bytes = if use_udp {
            let resp = self.exchange_udp(&raw, deadline).await?;
            match helpers::is_truncated(&resp) {
                Some(true) => {
                    tracing::debug!(upstream = %self, "truncated answer, retrying over tcp");
                    self.exchange_tcp(&raw, deadline).await?
                }
                Some(false) => resp,
                None => anyhow::bail!("invalid UDP response"),
            }
        } else {
            self.exchange_tcp(&raw, deadline).await?
        };

        let mut response = DnsMessage::decode(&bytes).context("failed to decode upstream response")?;

        if response.id != tid {
            anyhow::bail!("transaction id mismatch: expected {tid}, got {}", response.id);
        }

        if response.questions() != query.questions() {
            anyhow::bail!("upstream response question does not match request question");
        }

        response.id = query.id;
        Ok(response)
    }
}
