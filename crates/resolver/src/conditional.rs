use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use moat_context::DnsRequest;
use serde::{Deserialize, Serialize};

use crate::{
    ChainedResolver, DEACTIVATED, NextResolver, ResolveError, Resolver, Response, ResolverType,
    upstream::{DnsUpstream, UpstreamAddr, UpstreamClient},
};

/// Domain to upstream routing table.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConditionalConfig {
    /// Domain (including its subdomains) mapped to an upstream address.
    pub mapping: HashMap<String, String>,
}

/// Routes queries for configured domains to dedicated upstreams.
pub struct ConditionalUpstreamResolver {
    mapping: HashMap<String, Arc<dyn UpstreamClient>>,
    next: NextResolver,
}

impl ConditionalUpstreamResolver {
    pub fn new(config: &ConditionalConfig, timeout: Duration) -> anyhow::Result<Self> {
        let mut clients: HashMap<String, Arc<dyn UpstreamClient>> = HashMap::with_capacity(config.mapping.len());

        for (domain, upstream) in &config.mapping {
            let addr: UpstreamAddr = upstream
                .parse()
                .with_context(|| format!("invalid conditional upstream for '{domain}'"))?;
            clients.insert(domain.clone(), Arc::new(DnsUpstream::new(addr).with_timeout(timeout)));
        }

        Ok(Self::with_clients(clients))
    }

    pub fn with_clients(mapping: HashMap<String, Arc<dyn UpstreamClient>>) -> Self {
        let mapping = mapping
            .into_iter()
            .map(|(domain, client)| (normalize(&domain), client))
            .collect();

        Self {
            mapping,
            next: NextResolver::default(),
        }
    }

    /// Longest configured suffix of `name`.
    fn find_upstream(&self, name: &str) -> Option<(&str, &Arc<dyn UpstreamClient>)> {
        let name = normalize(name);
        let mut current = name.as_str();

        loop {
            if let Some((domain, client)) = self.mapping.get_key_value(current) {
                return Some((domain.as_str(), client));
            }

            match current.split_once('.') {
                Some((_, parent)) => current = parent,
                None => return None,
            }
        }
    }
}

fn normalize(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

impl fmt::Display for ConditionalUpstreamResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("conditional upstream resolver")
    }
}

#[async_trait]
impl Resolver for ConditionalUpstreamResolver {
    async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError> {
        if self.mapping.is_empty() {
            return self.next.resolve(request).await;
        }

        for question in request.questions() {
            let Some((domain, upstream)) = self.find_upstream(question.qname.as_str()) else {
                continue;
            };

            tracing::debug!(domain, upstream = %upstream, "conditional match");

            let message = upstream.exchange(request).await.map_err(|e| ResolveError::Upstream {
                upstream: upstream.to_string(),
                message: format!("{e:#}"),
            })?;

            tracing::debug!(
                answers = %message.answers().iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
                "received response from conditional upstream"
            );

            return Ok(Response::new(message, "CONDITIONAL", ResolverType::Conditional));
        }

        self.next.resolve(request).await
    }

    fn configuration(&self) -> Vec<String> {
        if self.mapping.is_empty() {
            return vec![DEACTIVATED.to_string()];
        }

        let mut lines: Vec<(&String, String)> = self
            .mapping
            .iter()
            .map(|(domain, upstream)| (domain, format!("{domain} = \"{upstream}\"")))
            .collect();
        lines.sort_by(|a, b| a.0.cmp(b.0));

        lines.into_iter().map(|(_, line)| line).collect()
    }
}

impl ChainedResolver for ConditionalUpstreamResolver {
    fn set_next(&mut self, next: Box<dyn Resolver>) {
        self.next.set(next);
    }
}

#[cfg(test)]
#[path = "conditional_tests.rs"]
mod conditional_tests;
