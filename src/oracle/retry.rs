//! Bounded retry for oracle calls
//!
//! Exponential backoff with jitter via `backon`. Only transient
//! [`OracleError`]s are retried; permanent ones surface on the first attempt.
//! A provider's `retry_after` hint replaces the computed delay, capped at
//! `max_delay`. Every call races the run's cancellation token.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::RetryConfig;
use crate::types::{DocError, OracleError, Result};

/// Retry schedule for a single oracle call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            min_delay: Duration::from_millis(config.min_delay_ms),
            max_delay: Duration::from_secs(config.max_delay_secs),
        }
    }

    /// No waiting between attempts
    pub fn immediate(max_attempts: usize) -> Self {
        Self::from_config(&RetryConfig::immediate(max_attempts))
    }

    fn backoff(&self) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay.max(self.min_delay))
            .with_max_times(self.max_attempts.saturating_sub(1));
        if self.min_delay.is_zero() {
            builder
        } else {
            builder.with_jitter()
        }
    }

    /// Delay before the next attempt; `None` once attempts are exhausted
    fn next_delay(&self, error: &OracleError, computed: Option<Duration>) -> Option<Duration> {
        let computed = computed?;
        Some(match error.retry_after {
            Some(hint) => hint.min(self.max_delay).max(computed),
            None => computed,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Returns `DocError::Oracle` with the last failure, or `DocError::Cancelled`
/// if `cancel` fires first (the in-flight attempt is dropped).
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, OracleError>>,
{
    let attempts = op
        .retry(policy.backoff())
        .when(|e: &OracleError| e.is_transient())
        .adjust(|e: &OracleError, delay: Option<Duration>| policy.next_delay(e, delay))
        .notify(|e: &OracleError, delay: Duration| {
            warn!(
                call = label,
                category = %e.category,
                delay_ms = delay.as_millis() as u64,
                "Oracle call failed, retrying: {}",
                e.message
            );
        });

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DocError::Cancelled),
        result = attempts => result.map_err(DocError::from),
    }
}
