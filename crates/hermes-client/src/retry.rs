//! Retry policy.
//!
//! `max_attempts` counts every attempt, the first included. Backoff before
//! attempt `n + 1` is `min_backoff * 2^(n - 1)`, capped at `max_backoff`.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// When and how often to retry an outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    #[serde(with = "millis")]
    pub min_backoff: Duration,
    /// Upper bound for any single delay.
    #[serde(with = "millis")]
    pub max_backoff: Duration,
    /// Total attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Statuses worth retrying. Empty means every 4xx and 5xx.
    pub retryable_status_codes: BTreeSet<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_attempts: 5,
            retryable_status_codes: BTreeSet::new(),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Sets the total number of attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff bounds.
    #[must_use]
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        self.min_backoff = min;
        self.max_backoff = max;
        self
    }

    /// Restricts retries to the given statuses.
    #[must_use]
    pub fn with_retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Total attempts, never less than one.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns `true` if a response with this status should be retried.
    ///
    /// Success, informational and redirect statuses are never retried.
    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        let is_error = status.is_client_error() || status.is_server_error();
        if !is_error {
            return false;
        }
        self.retryable_status_codes.is_empty()
            || self.retryable_status_codes.contains(&status.as_u16())
    }

    /// Delay to wait after attempt `attempt` (1-based) fails.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.min_backoff
            .checked_mul(1_u32 << exponent)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
