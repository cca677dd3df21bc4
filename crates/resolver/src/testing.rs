use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use moat_context::{DnsRequest, RequestType};
use moat_dns::{
    ClassType, DnsMessage, DnsMessageBuilder, DnsQuestion, DnsRecord, DnsRecordData, DnsResponseCode, DomainName,
    RecordType,
};

use crate::{
    ChainedResolver, NextResolver, ResolveError, Resolver, Response, ResolverType, upstream::UpstreamClient,
};

pub(crate) fn request(name: &str, qtype: RecordType) -> DnsRequest {
    request_from(name, qtype, "10.0.0.1:40000".parse().unwrap())
}

pub(crate) fn request_from(name: &str, qtype: RecordType, client: SocketAddr) -> DnsRequest {
    let message = DnsMessageBuilder::new()
        .with_id(4242)
        .add_question(DnsQuestion::new(DomainName::from_ascii(name).unwrap(), qtype, ClassType::IN))
        .build();

    DnsRequest::new(message, RequestType::UDP, Some(client), Duration::from_secs(2))
}

pub(crate) fn multi_question_request(names: &[&str]) -> DnsRequest {
    let mut builder = DnsMessageBuilder::new().with_id(4242);
    for name in names {
        builder = builder.add_question(DnsQuestion::new(
            DomainName::from_ascii(name).unwrap(),
            RecordType::A,
            ClassType::IN,
        ));
    }

    DnsRequest::new(builder.build(), RequestType::UDP, None, Duration::from_secs(2))
}

pub(crate) fn answer(request: &DnsRequest, ip: Ipv4Addr) -> DnsMessage {
    let mut builder = DnsMessageBuilder::response_to(request.message()).with_response(DnsResponseCode::NoError);
    if let Some(question) = request.questions().first() {
        builder = builder.add_answer(DnsRecord::new(
            question.qname.clone(),
            RecordType::A,
            300,
            DnsRecordData::Ipv4(ip),
        ));
    }
    builder.build()
}

/// Shared call counter.
#[derive(Clone, Default)]
pub(crate) struct Calls(Arc<AtomicUsize>);

impl Calls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Upstream client with a canned answer.
pub(crate) struct StaticClient {
    name: String,
    answer: Option<Ipv4Addr>,
    calls: Calls,
}

impl StaticClient {
    pub fn answering(name: &str, ip: Ipv4Addr) -> Self {
        Self {
            name: name.to_string(),
            answer: Some(ip),
            calls: Calls::default(),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            answer: None,
            calls: Calls::default(),
        }
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }
}

impl fmt::Display for StaticClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[async_trait]
impl UpstreamClient for StaticClient {
    async fn exchange(&self, request: &DnsRequest) -> anyhow::Result<DnsMessage> {
        self.calls.hit();
        match self.answer {
            Some(ip) => Ok(answer(request, ip)),
            None => anyhow::bail!("{} is unreachable", self.name),
        }
    }
}

/// Resolver recording how often it was reached.
pub(crate) struct StaticResolver {
    name: String,
    mode: Mode,
    calls: Calls,
    next: NextResolver,
}

enum Mode {
    Answer,
    Fail,
    Pass,
}

impl StaticResolver {
    /// Terminal node answering `1.1.1.1` with reason `RESOLVED (<name>)`.
    pub fn answering(name: &str) -> Self {
        Self::with_mode(name, Mode::Answer)
    }

    pub fn failing(name: &str) -> Self {
        Self::with_mode(name, Mode::Fail)
    }

    /// Chained node that always delegates.
    pub fn passing(name: &str) -> Self {
        Self::with_mode(name, Mode::Pass)
    }

    fn with_mode(name: &str, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            mode,
            calls: Calls::default(),
            next: NextResolver::default(),
        }
    }

    pub fn calls(&self) -> Calls {
        self.calls.clone()
    }
}

impl fmt::Display for StaticResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError> {
        self.calls.hit();
        match self.mode {
            Mode::Answer => Ok(Response::new(
                answer(request, Ipv4Addr::new(1, 1, 1, 1)),
                format!("RESOLVED ({})", self.name),
                ResolverType::Resolved,
            )),
            Mode::Fail => Err(ResolveError::AllUpstreamsFailed),
            Mode::Pass => self.next.resolve(request).await,
        }
    }

    fn configuration(&self) -> Vec<String> {
        vec![format!("name = {}", self.name)]
    }
}

impl ChainedResolver for StaticResolver {
    fn set_next(&mut self, next: Box<dyn Resolver>) {
        self.next.set(next);
    }
}
