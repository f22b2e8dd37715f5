//! Runtime tuning for state machines.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 64;
pub const DEFAULT_STALE_LOCK_GRACE_SECS: u64 = 3600;

/// What `resolve_timeouts` does with a due timeout whose recorded state no
/// longer matches the subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaleTimeoutPolicy {
    /// Keep the record and report a `StaleTimeout` failure.
    #[default]
    Reject,
    /// Remove the record and report it as discarded.
    Discard,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value for \"{field}\": {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Orchestrator settings. Every field falls back to its default when
/// missing from the source document.
///
/// ```rust
/// use lifecycle::config::{MachineConfig, StaleTimeoutPolicy};
///
/// let config = MachineConfig::from_json(r#"{"stale_timeout_policy": "discard"}"#).unwrap();
/// assert_eq!(config.max_cascade_depth, 64);
/// assert_eq!(config.stale_timeout_policy, StaleTimeoutPolicy::Discard);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Maximum number of chained `onStateWasSet` transitions per run
    pub max_cascade_depth: usize,

    /// Locks older than this are force-released before timeouts resolve
    pub stale_lock_grace_secs: u64,

    pub stale_timeout_policy: StaleTimeoutPolicy,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            stale_lock_grace_secs: DEFAULT_STALE_LOCK_GRACE_SECS,
            stale_timeout_policy: StaleTimeoutPolicy::default(),
        }
    }
}

impl MachineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cascade_depth == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_cascade_depth",
                reason: "must be at least 1".to_string(),
            });
        }
        if grace_duration(self.stale_lock_grace_secs).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "stale_lock_grace_secs",
                reason: "out of range".to_string(),
            });
        }
        Ok(())
    }

    /// Grace interval for stale locks. Out-of-range values fall back to
    /// the default.
    pub fn stale_lock_grace(&self) -> Duration {
        grace_duration(self.stale_lock_grace_secs)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_STALE_LOCK_GRACE_SECS as i64))
    }
}

fn grace_duration(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}
