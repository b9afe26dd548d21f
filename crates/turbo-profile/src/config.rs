//! Profile configuration.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::retry::{BackoffStrategy, RetryPolicy};

/// Settings shared by every profile a factory creates.
///
/// # Example
///
/// ```toml
/// retry_count = 5
/// backoff_base_ms = 500
/// single_flight = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Total attempts per save or update (at least one is always made).
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Delay after the first failed attempt; doubles after each further one.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound on a single backoff delay. Unset means uncapped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_backoff_ms: Option<u64>,

    /// Wait before the one extra save attempt when ending a session.
    #[serde(default = "default_end_session_cooldown_ms")]
    pub end_session_cooldown_ms: u64,

    /// Serialize saves and updates per key across profiles of one factory.
    #[serde(default = "default_single_flight")]
    pub single_flight: bool,
}

fn default_retry_count() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_end_session_cooldown_ms() -> u64 {
    1_000
}

fn default_single_flight() -> bool {
    true
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            backoff_base_ms: default_backoff_base_ms(),
            max_backoff_ms: None,
            end_session_cooldown_ms: default_end_session_cooldown_ms(),
            single_flight: default_single_flight(),
        }
    }
}

impl ProfileConfig {
    /// Load config from a TOML or JSON file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile config: {}", path))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON profile config: {}", path))
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML profile config: {}", path))
        }
    }

    /// Set the total number of attempts.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Set the backoff base. Sub-millisecond parts round up.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base_ms = millis_ceil(base);
        self
    }

    /// Cap every backoff delay at `max`. Sub-millisecond parts round up.
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff_ms = Some(millis_ceil(max));
        self
    }

    /// Set the end-of-session cooldown. Sub-millisecond parts round up.
    pub fn with_end_session_cooldown(mut self, cooldown: Duration) -> Self {
        self.end_session_cooldown_ms = millis_ceil(cooldown);
        self
    }

    /// Enable or disable per-key write serialization.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// The retry policy these settings describe.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_count).with_backoff(BackoffStrategy::Exponential {
            base: Duration::from_millis(self.backoff_base_ms),
            max: self.max_backoff_ms.map_or(Duration::MAX, Duration::from_millis),
        })
    }

    /// Wait before the extra end-of-session save.
    pub fn end_session_cooldown(&self) -> Duration {
        Duration::from_millis(self.end_session_cooldown_ms)
    }
}

/// Whole milliseconds in `duration`, rounding any remainder up.
fn millis_ceil(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX)
}
