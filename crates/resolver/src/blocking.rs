use std::{
    collections::HashMap,
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    sync::Arc,
};

use async_trait::async_trait;
use moat_blocking::BlockingControl;
use moat_blocklist::BlocklistService;
use moat_context::DnsRequest;
use moat_dns::{DnsMessage, DnsMessageBuilder, DnsQuestion, DnsRecord, DnsRecordData, DnsResponseCode, RecordType};
use serde::{Deserialize, Serialize};

use crate::{ChainedResolver, DEACTIVATED, NextResolver, ResolveError, Resolver, Response, ResolverType};

/// Client group key used when a client has no entry of its own.
pub const DEFAULT_CLIENT_GROUP: &str = "default";

/// How blocked queries are answered.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// `0.0.0.0` for A, `::` for AAAA, NXDOMAIN otherwise
    #[default]
    ZeroIp,
    NxDomain,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ZeroIp => "zero_ip",
            Self::NxDomain => "nx_domain",
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BlockingConfig {
    pub block_type: BlockType,
    /// TTL of synthesized answers
    pub block_ttl_secs: u32,
    /// Seconds between list refreshes, 0 disables the periodic refresh
    pub refresh_interval_secs: u64,
    /// Group name to list sources (urls or file paths)
    pub denylists: HashMap<String, Vec<String>>,
    /// Client ip (or `default`) to the groups applied to it
    pub client_groups: HashMap<String, Vec<String>>,
}

impl Default for BlockingConfig {
    fn default() -> Self {
        Self {
            block_type: BlockType::default(),
            block_ttl_secs: 6 * 60 * 60,
            refresh_interval_secs: 4 * 60 * 60,
            denylists: HashMap::new(),
            client_groups: HashMap::new(),
        }
    }
}

/// Answers queries for listed domains itself, honoring groups exempted through [`BlockingControl`].
pub struct BlockingResolver {
    control: Arc<dyn BlockingControl>,
    lists: Arc<BlocklistService>,
    client_groups: HashMap<String, Vec<String>>,
    block_type: BlockType,
    block_ttl: u32,
    next: NextResolver,
}

impl BlockingResolver {
    pub fn new(config: &BlockingConfig, control: Arc<dyn BlockingControl>, lists: Arc<BlocklistService>) -> Self {
        Self {
            control,
            lists,
            client_groups: config.client_groups.clone(),
            block_type: config.block_type,
            block_ttl: config.block_ttl_secs,
            next: NextResolver::default(),
        }
    }

    /// Groups configured for `client`. Without any client mapping every group applies.
    fn groups_for(&self, client: Option<IpAddr>) -> Vec<String> {
        if self.client_groups.is_empty() {
            return self.lists.group_names();
        }

        client
            .and_then(|ip| self.client_groups.get(&ip.to_string()))
            .or_else(|| self.client_groups.get(DEFAULT_CLIENT_GROUP))
            .cloned()
            .unwrap_or_default()
    }

    fn blocked_answer(&self, request: &DnsRequest, question: &DnsQuestion) -> DnsMessage {
        let builder = DnsMessageBuilder::response_to(request.message());

        let data = match (self.block_type, question.qtype) {
            (BlockType::ZeroIp, RecordType::A) => Some(DnsRecordData::Ipv4(Ipv4Addr::UNSPECIFIED)),
            (BlockType::ZeroIp, RecordType::AAAA) => Some(DnsRecordData::Ipv6(Ipv6Addr::UNSPECIFIED)),
            _ => None,
        };

        match data {
            Some(data) => builder
                .add_answer(DnsRecord::new(question.qname.clone(), question.qtype, self.block_ttl, data))
                .with_response(DnsResponseCode::NoError)
                .build(),
            None => builder.with_response(DnsResponseCode::NxDomain).build(),
        }
    }
}

impl fmt::Display for BlockingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("blocking resolver")
    }
}

#[async_trait]
impl Resolver for BlockingResolver {
    async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError> {
        if !self.lists.is_configured() {
            return self.next.resolve(request).await;
        }

        let status = self.control.blocking_status();
        let active: Vec<String> = self
            .groups_for(request.client_ip())
            .into_iter()
            .filter(|group| !status.is_group_disabled(group))
            .collect();

        if !active.is_empty() {
            for question in request.questions() {
                if let Some(group) = self.lists.blocked_group(&active, question.qname.as_str()) {
                    tracing::debug!(group, qname = %question.qname, "query blocked");

                    return Ok(Response::new(
                        self.blocked_answer(request, question),
                        format!("BLOCKED ({group})"),
                        ResolverType::Blocked,
                    ));
                }
            }
        }

        self.next.resolve(request).await
    }

    fn configuration(&self) -> Vec<String> {
        if !self.lists.is_configured() {
            return vec![DEACTIVATED.to_string()];
        }

        let mut lines = vec!["groups:".to_string()];
        for group in self.lists.group_names() {
            lines.push(format!("  {group} = {} entries", self.lists.entry_count(&group)));
        }

        let mut clients: Vec<(&String, &Vec<String>)> = self.client_groups.iter().collect();
        clients.sort();
        if !clients.is_empty() {
            lines.push("client groups:".to_string());
            for (client, groups) in clients {
                lines.push(format!("  {client} = [{}]", groups.join(", ")));
            }
        }

        lines.push(format!("block type = {}", self.block_type));
        lines.push(format!("block TTL = {}s", self.block_ttl));
        lines
    }
}

impl ChainedResolver for BlockingResolver {
    fn set_next(&mut self, next: Box<dyn Resolver>) {
        self.next.set(next);
    }
}

#[cfg(test)]
#[path = "blocking_tests.rs"]
mod blocking_tests;
