use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use moat_context::{DnsRequest, RequestType};
use moat_dns::{ClassType, DnsMessageBuilder, DnsQuestion, DomainName, RecordType};
use rand::Rng;
use tracing::Instrument;

use crate::{ResolveError, Resolver, Response};

/// Runs ad-hoc queries through the resolver chain.
#[async_trait]
pub trait Querier: Send + Sync {
    async fn query(&self, question: &str, qtype: RecordType) -> Result<Response, ResolveError>;
}

/// [`Querier`] backed by the head of the chain, queries appear to come from localhost over TCP.
pub struct ChainQuerier {
    head: Arc<dyn Resolver>,
    timeout: Duration,
}

impl ChainQuerier {
    pub fn new(head: Arc<dyn Resolver>, timeout: Duration) -> Self {
        Self { head, timeout }
    }
}

#[async_trait]
impl Querier for ChainQuerier {
    async fn query(&self, question: &str, qtype: RecordType) -> Result<Response, ResolveError> {
        let qname = DomainName::from_user(question).map_err(|e| ResolveError::InvalidRequest(e.to_string()))?;

        let message = DnsMessageBuilder::new()
            .with_id(rand::rng().random())
            .add_question(DnsQuestion::new(qname, qtype, ClassType::IN))
            .build();

        let request = DnsRequest::new(
            message,
            RequestType::TCP,
            Some(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))),
            self.timeout,
        );

        let span = request.span().clone();
        self.head.resolve(&request).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResolverType, testing::StaticResolver};

    #[tokio::test]
    async fn test_query_runs_through_chain() {
        let head = StaticResolver::answering("default");
        let calls = head.calls();
        let querier = ChainQuerier::new(Arc::new(head), Duration::from_secs(1));

        let response = querier.query("Example.com", RecordType::A).await.unwrap();
        assert_eq!(response.reason, "RESOLVED (default)");
        assert_eq!(response.resolver_type, ResolverType::Resolved);
        assert_eq!(response.message.questions()[0].qname.as_str(), "example.com");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let querier = ChainQuerier::new(Arc::new(StaticResolver::answering("default")), Duration::from_secs(1));

        let err = querier.query("bad..name", RecordType::A).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidRequest(_)));
    }
}
