use std::{collections::HashMap, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    BlocklistMatcher,
    source::{ListSource, http_client, parse_entries},
};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Reloads block list data.
#[async_trait]
pub trait ListRefresher: Send + Sync {
    async fn refresh_lists(&self) -> anyhow::Result<()>;
}

/// Per group block lists, swapped in atomically on every refresh.
pub struct BlocklistService {
    sources: HashMap<String, Vec<ListSource>>,
    matchers: ArcSwap<HashMap<String, Arc<BlocklistMatcher>>>,
    client: reqwest::Client,
    refresh_lock: Mutex<()>,
}

impl BlocklistService {
    /// Create a service for `denylists` (group name to list sources). Nothing is loaded until
    /// [`ListRefresher::refresh_lists`] runs.
    pub fn new(denylists: &HashMap<String, Vec<String>>) -> anyhow::Result<Self> {
        let sources = denylists
            .iter()
            .map(|(group, lists)| (group.clone(), lists.iter().map(|l| ListSource::parse(l)).collect()))
            .collect();

        Ok(Self {
            sources,
            matchers: ArcSwap::from_pointee(HashMap::new()),
            client: http_client(DOWNLOAD_TIMEOUT)?,
            refresh_lock: Mutex::new(()),
        })
    }

    /// Whether any group is configured.
    pub fn is_configured(&self) -> bool {
        !self.sources.is_empty()
    }

    /// Configured group names, sorted.
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// First group of `groups` whose list blocks `name`.
    pub fn blocked_group<'a>(&self, groups: &'a [String], name: &str) -> Option<&'a str> {
        let matchers = self.matchers.load();

        groups
            .iter()
            .find(|group| matchers.get(group.as_str()).is_some_and(|m| m.is_blocked(name)))
            .map(String::as_str)
    }

    /// Number of entries loaded for `group`.
    pub fn entry_count(&self, group: &str) -> usize {
        self.matchers.load().get(group).map_or(0, |m| m.len())
    }

    /// Refresh every `interval` until `shutdown` is cancelled.
    pub fn spawn_refresh_task(self: &Arc<Self>, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        let service = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately, the initial load happens at startup
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(service) = service.upgrade() else { break };
                        if let Err(e) = service.refresh_lists().await {
                            tracing::error!("periodic list refresh failed: {e:#}");
                        }
                    }
                }
            }
        })
    }

    /// Build the matcher of one group, `None` if none of its sources could be loaded.
    async fn load_group(&self, group: &str, sources: &[ListSource]) -> Option<BlocklistMatcher> {
        let mut matcher = BlocklistMatcher::default();
        let mut loaded = 0usize;

        for source in sources {
            let content = match source.fetch(&self.client).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(group, source = %source, "failed to load list: {e:#}");
                    continue;
                }
            };

            for entry in parse_entries(&content) {
                if let Err(e) = matcher.insert(entry) {
                    tracing::debug!(group, source = %source, entry, "skipping list entry: {e}");
                }
            }
            loaded += 1;
        }

        (loaded > 0 || sources.is_empty()).then_some(matcher)
    }
}

#[async_trait]
impl ListRefresher for BlocklistService {
    async fn refresh_lists(&self) -> anyhow::Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let mut next = HashMap::with_capacity(self.sources.len());
        let mut failed = Vec::new();

        for (group, sources) in &self.sources {
            match self.load_group(group, sources).await {
                Some(matcher) => {
                    tracing::info!(group, entries = matcher.len(), "block list loaded");
                    next.insert(group.clone(), Arc::new(matcher));
                }
                None => {
                    if let Some(previous) = self.matchers.load().get(group) {
                        next.insert(group.clone(), previous.clone());
                    }
                    failed.push(group.clone());
                }
            }
        }

        self.matchers.store(Arc::new(next));

        if !failed.is_empty() {
            failed.sort();
            anyhow::bail!("no list could be loaded for group(s): {}", failed.join(", "));
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod service_tests;
