use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use moat_context::DnsRequest;

use super::{DnsUpstream, UpstreamAddr, UpstreamClient};
use crate::{DEACTIVATED, ResolveError, Resolver, Response, ResolverType};

/// Minimum amount of time needed to start a new attempt.
const MIN_REMAINING_TO_START_ATTEMPT: Duration = Duration::from_millis(15);

/// List of upstream servers.
struct Upstreams {
    list: Vec<Arc<dyn UpstreamClient>>,
    /// Round-robin index
    rr: AtomicUsize,
}

impl Upstreams {
    /// Pick an upstream index in round-robin fashion.
    fn pick_index(&self) -> Option<usize> {
        let n = self.list.len();
        if n == 0 {
            return None;
        }
        Some(self.rr.fetch_add(1, Ordering::Relaxed) % n)
    }
}

/// Terminal resolver asking the default upstreams, each one at most once per request.
pub struct UpstreamResolver {
    upstreams: Upstreams,
}

impl UpstreamResolver {
    pub fn new(addrs: &[UpstreamAddr], timeout: Duration) -> Self {
        if addrs.is_empty() {
            tracing::warn!("no default upstreams configured, queries reaching the upstream resolver will fail");
        }

        Self::with_clients(
            addrs
                .iter()
                .map(|&addr| Arc::new(DnsUpstream::new(addr).with_timeout(timeout)) as Arc<dyn UpstreamClient>)
                .collect(),
        )
    }

    pub fn with_clients(clients: Vec<Arc<dyn UpstreamClient>>) -> Self {
        Self {
            upstreams: Upstreams {
                list: clients,
                rr: AtomicUsize::new(0),
            },
        }
    }
}

impl fmt::Display for UpstreamResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("upstream resolver")
    }
}

#[async_trait]
impl Resolver for UpstreamResolver {
    async fn resolve(&self, request: &DnsRequest) -> Result<Response, ResolveError> {
        let Some(start) = self.upstreams.pick_index() else {
            return Err(ResolveError::AllUpstreamsFailed);
        };

        let list = &self.upstreams.list;
        let n = list.len();

        for off in 0..n {
            match request.remaining() {
                Some(remaining) if remaining >= MIN_REMAINING_TO_START_ATTEMPT => {}
                _ => return Err(ResolveError::Timeout),
            }

            let upstream = &list[(start + off) % n];

            match upstream.exchange(request).await {
                Ok(message) => {
                    return Ok(Response::new(
                        message,
                        format!("RESOLVED ({upstream})"),
                        ResolverType::Resolved,
                    ));
                }
                Err(e) => {
                    tracing::warn!(upstream = %upstream, error = %format!("{e:#}"), "upstream attempt failed");
                }
            }
        }

        Err(ResolveError::AllUpstreamsFailed)
    }

    fn configuration(&self) -> Vec<String> {
        if self.upstreams.list.is_empty() {
            return vec![DEACTIVATED.to_string()];
        }

        self.upstreams.list.iter().map(|u| format!("upstream = {u}")).collect()
    }
}
