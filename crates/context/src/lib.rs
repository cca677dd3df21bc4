use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use moat_dns::{DnsMessage, DnsQuestion};
use tokio::time::Instant;
use tracing::Span;

/// The transport a DNS request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    /// UDP
    UDP,
    /// TCP
    TCP,
}

/// A single DNS request travelling through the resolver chain.
///
/// The request is immutable once created and shared read-only by every resolver that handles it.
#[derive(Debug)]
pub struct DnsRequest {
    request_type: RequestType,
    client: Option<SocketAddr>,
    message: DnsMessage,
    budget: RequestBudget,
    span: Span,
}

impl DnsRequest {
    pub fn new(message: DnsMessage, request_type: RequestType, client: Option<SocketAddr>, timeout: Duration) -> Self {
        let question = message
            .questions()
            .first()
            .map(|q| format!("{} {}", q.qname, q.qtype))
            .unwrap_or_default();

        let span = tracing::info_span!(
            "request",
            id = message.id,
            client = ?client.map(|c| c.ip()),
            protocol = ?request_type,
            question = %question,
        );

        Self {
            request_type,
            client,
            message,
            budget: RequestBudget::new(timeout),
            span,
        }
    }

    /// Decode a raw query received from a client.
    pub fn decode(raw: &[u8], request_type: RequestType, client: Option<SocketAddr>, timeout: Duration) -> anyhow::Result<Self> {
        let message = DnsMessage::decode(raw)?;
        Ok(Self::new(message, request_type, client, timeout))
    }

    /// The decoded query message.
    pub fn message(&self) -> &DnsMessage {
        &self.message
    }

    pub fn questions(&self) -> &[DnsQuestion] {
        self.message.questions()
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn client_ip(&self) -> Option<IpAddr> {
        self.client.map(|c| c.ip())
    }

    /// Remaining time budget for the request.
    pub fn remaining(&self) -> Option<Duration> {
        self.budget.remaining()
    }

    pub fn budget(&self) -> &RequestBudget {
        &self.budget
    }

    /// Log context of this request.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

/// A budget for processing a DNS request, based on a deadline.
#[derive(Debug, Clone)]
pub struct RequestBudget {
    deadline: Instant,
}

impl RequestBudget {
    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        (now < self.deadline).then_some(self.deadline - now)
    }

    /// Deadline for a single step, never past the overall deadline.
    pub fn cap(&self, per_step: Duration) -> Instant {
        let rem = self.remaining().unwrap_or_default();
        Instant::now() + rem.min(per_step)
    }
}
