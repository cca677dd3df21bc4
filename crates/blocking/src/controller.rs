use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{BlockingControl, BlockingError, BlockingStatus, parse_duration};

#[derive(Debug)]
enum BlockingState {
    Enabled,
    Disabled {
        /// `None` means disabled until explicitly enabled.
        deadline: Option<Instant>,
        groups: Vec<String>,
        /// Cancelled whenever the state is replaced, always under the write lock.
        timer: Option<CancellationToken>,
    },
}

impl BlockingState {
    /// Move to `next`, cancelling the pending auto re-enable of the current state.
    fn replace(&mut self, next: BlockingState) {
        if let BlockingState::Disabled { timer: Some(timer), .. } = self {
            timer.cancel();
        }
        *self = next;
    }
}

struct Inner {
    state: RwLock<BlockingState>,
    /// All configured groups, sorted.
    groups: Vec<String>,
}

impl Inner {
    /// Called by the timer task once the deadline has passed.
    fn auto_enable(&self, token: &CancellationToken) {
        let mut state = self.state.write();

        // Superseded by an explicit enable or a newer disable.
        if token.is_cancelled() {
            return;
        }

        state.replace(BlockingState::Enabled);
        tracing::info!("blocking re-enabled after timeout");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let BlockingState::Disabled { timer: Some(timer), .. } = self.state.get_mut() {
            timer.cancel();
        }
    }
}

/// Process wide blocking state machine.
///
/// Starts enabled. Transitions are serialized by a write lock, status reads take the read lock
/// so they always see state, deadline and groups together.
#[derive(Clone)]
pub struct BlockingController {
    inner: Arc<Inner>,
}

impl BlockingController {
    /// Create a controller that knows about `groups`.
    pub fn new<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut groups: Vec<String> = groups.into_iter().map(Into::into).collect();
        groups.sort();
        groups.dedup();

        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(BlockingState::Enabled),
                groups,
            }),
        }
    }

    /// Disable blocking for an already parsed duration.
    pub fn disable_for(&self, duration: Duration, groups: Vec<String>) -> Result<(), BlockingError> {
        let groups = self.resolve_groups(groups)?;

        let timed = if duration.is_zero() {
            None
        } else {
            let deadline = Instant::now()
                .checked_add(duration)
                .ok_or_else(|| BlockingError::InvalidDuration {
                    input: humantime::format_duration(duration).to_string(),
                    reason: "duration out of range".to_string(),
                })?;
            let runtime = tokio::runtime::Handle::try_current().map_err(|_| BlockingError::NoRuntime)?;
            Some((runtime, deadline))
        };

        let mut state = self.inner.state.write();

        let (deadline, timer) = match timed {
            Some((runtime, deadline)) => {
                let token = CancellationToken::new();
                runtime.spawn(run_timer(Arc::downgrade(&self.inner), token.clone(), deadline));
                (Some(deadline), Some(token))
            }
            None => (None, None),
        };

        tracing::info!(
            groups = ?groups,
            duration = ?(!duration.is_zero()).then_some(duration),
            "blocking disabled"
        );

        state.replace(BlockingState::Disabled {
            deadline,
            groups,
            timer,
        });

        Ok(())
    }

    /// Validate the requested groups, an empty request means every configured group.
    fn resolve_groups(&self, requested: Vec<String>) -> Result<Vec<String>, BlockingError> {
        let mut groups: Vec<String> = Vec::with_capacity(requested.len());

        for group in requested.into_iter().map(|g| g.trim().to_string()).filter(|g| !g.is_empty()) {
            if !self.inner.groups.contains(&group) {
                return Err(BlockingError::UnknownGroup(group));
            }
            if !groups.contains(&group) {
                groups.push(group);
            }
        }

        if groups.is_empty() {
            groups = self.inner.groups.clone();
        }

        Ok(groups)
    }
}

impl BlockingControl for BlockingController {
    fn enable_blocking(&self) {
        let mut state = self.inner.state.write();
        if matches!(*state, BlockingState::Enabled) {
            return;
        }

        state.replace(BlockingState::Enabled);
        tracing::info!("blocking enabled");
    }

    fn disable_blocking(&self, duration: Option<&str>, groups: Vec<String>) -> Result<(), BlockingError> {
        let duration = parse_duration(duration)?;
        self.disable_for(duration, groups)
    }

    fn blocking_status(&self) -> BlockingStatus {
        let state = self.inner.state.read();

        match &*state {
            BlockingState::Enabled => BlockingStatus::enabled(),
            BlockingState::Disabled { deadline, groups, .. } => BlockingStatus {
                enabled: false,
                disabled_groups: groups.clone(),
                auto_enable_in_sec: deadline
                    .map(|d| d.saturating_duration_since(Instant::now()).as_secs())
                    .unwrap_or(0),
            },
        }
    }
}

async fn run_timer(inner: Weak<Inner>, token: CancellationToken, deadline: Instant) {
    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::time::sleep_until(deadline) => {
            if let Some(inner) = inner.upgrade() {
                inner.auto_enable(&token);
            }
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
