//! Retry policy for atomic record updates.

use std::time::Duration;

use turbo_cache::{PersistentStore, Record, StoreError, Transform};

/// Backoff strategy between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Fixed delay between retries.
    Fixed(Duration),
    /// Exponential backoff with base and max.
    Exponential {
        /// Delay after the first failed attempt.
        base: Duration,
        /// Maximum delay. `Duration::MAX` leaves it uncapped.
        max: Duration,
    },
}

impl BackoffStrategy {
    /// Calculate the delay after failed attempt number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(d) => *d,
            Self::Exponential { base, max } => {
                let exponent = attempt.saturating_sub(1);
                let multiplier = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
                std::cmp::min(base.saturating_mul(multiplier), *max)
            }
        }
    }
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            max: Duration::MAX,
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
}

impl RetryPolicy {
    /// Create a new retry policy with the default backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::default(),
        }
    }

    /// Create a policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: BackoffStrategy::None,
        }
    }

    /// Set backoff strategy.
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Check if another attempt is allowed after `attempt` failed ones.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// All attempts of an atomic update failed.
#[derive(Debug)]
pub struct RetryError {
    /// Number of attempts made.
    pub attempts: u32,
    /// Error returned by the last attempt.
    pub last: StoreError,
}

/// Run `store.atomic_update(key, transform)` until it succeeds or the policy
/// runs out of attempts.
///
/// Sleeps `policy.backoff.delay_for_attempt(n)` after failed attempt `n`,
/// except after the final one. The same transform is reused for every attempt.
pub async fn atomic_update_with_retry<S>(
    store: &S,
    key: &str,
    policy: &RetryPolicy,
    transform: &Transform<'_>,
) -> Result<Record, RetryError>
where
    S: PersistentStore + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        match store.atomic_update(key, transform).await {
            Ok(record) => return Ok(record),
            Err(err) => {
                attempt += 1;
                if !policy.should_retry(attempt) {
                    tracing::error!(key, attempts = attempt, error = %err, "atomic update failed, giving up");
                    return Err(RetryError {
                        attempts: attempt,
                        last: err,
                    });
                }

                let delay = policy.backoff.delay_for_attempt(attempt);
                tracing::warn!(
                    key,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    transient = err.is_transient(),
                    error = %err,
                    "atomic update failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
