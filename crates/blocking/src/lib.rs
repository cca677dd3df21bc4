use std::time::Duration;

use serde::Serialize;

mod controller;

pub use controller::BlockingController;

/// Snapshot of the blocking state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockingStatus {
    /// True if blocking is enabled
    pub enabled: bool,
    /// Groups that are currently not blocked
    pub disabled_groups: Vec<String>,
    /// Whole seconds until blocking is enabled again, 0 if there is no deadline
    pub auto_enable_in_sec: u64,
}

impl BlockingStatus {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    /// Whether `group` is currently exempt from blocking.
    pub fn is_group_disabled(&self, group: &str) -> bool {
        !self.enabled && self.disabled_groups.iter().any(|g| g == group)
    }
}

/// Runtime control over blocking.
pub trait BlockingControl: Send + Sync {
    /// Enable blocking for all groups, cancelling a pending auto re-enable.
    fn enable_blocking(&self);

    /// Disable blocking for `groups` (all groups if empty).
    ///
    /// A positive `duration` re-enables blocking once it elapses, an absent or zero one disables until
    /// [`BlockingControl::enable_blocking`] is called.
    fn disable_blocking(&self, duration: Option<&str>, groups: Vec<String>) -> Result<(), BlockingError>;

    fn blocking_status(&self) -> BlockingStatus;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BlockingError {
    #[error("invalid duration '{input}': {reason}")]
    InvalidDuration { input: String, reason: String },

    #[error("group '{0}' is unknown")]
    UnknownGroup(String),

    #[error("no async runtime available to schedule the auto re-enable")]
    NoRuntime,
}

/// Parse a disable duration such as `"30s"`, `"5m"` or `"1h30m"`.
/// Absent, empty and `"0"` inputs mean no deadline.
pub fn parse_duration(input: Option<&str>) -> Result<Duration, BlockingError> {
    let Some(raw) = input.map(str::trim) else {
        return Ok(Duration::ZERO);
    };

    if raw.is_empty() || raw == "0" {
        return Ok(Duration::ZERO);
    }

    humantime::parse_duration(raw).map_err(|e| BlockingError::InvalidDuration {
        input: raw.to_string(),
        reason: e.to_string(),
    })
}
