use std::fmt;

use async_trait::async_trait;
use moat_context::DnsRequest;
use moat_dns::{DnsMessage, DnsResponseCode};

pub mod blocking;
mod chain;
pub mod conditional;
mod query;
pub mod upstream;

#[cfg(test)]
mod testing;

pub use chain::{NextResolver, chain};
pub use query::{ChainQuerier, Querier};

/// Configuration line reported by a node without effective configuration.
pub const DEACTIVATED: &str = "deactivated";

/// A node of the resolver chain.
#[async_trait]
pub trait Resolver: fmt::Display + Send + Sync {
    /// Answer the request or hand it to the next node.
    async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError>;

    /// One human readable line per item of active configuration.
    fn configuration(&self) -> Vec<String>;
}

/// A resolver that delegates to a successor.
pub trait ChainedResolver: Resolver {
    fn set_next(&mut self, next: Box<dyn Resolver>);
}

/// Which kind of node produced a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverType {
    Resolved,
    Conditional,
    Blocked,
}

impl fmt::Display for ResolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolved => "RESOLVED",
            Self::Conditional => "CONDITIONAL",
            Self::Blocked => "BLOCKED",
        })
    }
}

/// The answer of the chain together with why it was produced.
#[derive(Debug, Clone)]
pub struct Response {
    pub message: DnsMessage,
    pub reason: String,
    pub resolver_type: ResolverType,
}

impl Response {
    pub fn new(message: DnsMessage, reason: impl Into<String>, resolver_type: ResolverType) -> Self {
        Self {
            message,
            reason: reason.into(),
            resolver_type,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("request timed out")]
    Timeout,

    #[error("no next resolver configured")]
    NoNextResolver,

    #[error("all upstreams failed")]
    AllUpstreamsFailed,

    #[error("upstream {upstream} failed: {message}")]
    Upstream { upstream: String, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ResolveError {
    /// The response code sent to the client for this error.
    pub fn response_code(&self) -> DnsResponseCode {
        match self {
            ResolveError::InvalidRequest(_) => DnsResponseCode::FormatError,
            _ => DnsResponseCode::ServerFailure,
        }
    }
}
