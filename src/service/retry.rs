//! Retry Policy
//!
//! Exponential backoff for transient store failures.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::store::StoreError;
use crate::tournament::bracket::BracketError;

/// Errors that may succeed on a later attempt.
pub trait Transient {
    /// Worth retrying with backoff.
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}

impl Transient for BracketError {
    fn is_transient(&self) -> bool {
        matches!(self, BracketError::Store(e) if e.is_transient())
    }
}

/// Backoff settings for store writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Create from environment variables (`QC_RETRY_MAX_ATTEMPTS`,
    /// `QC_RETRY_BASE_MS`, `QC_RETRY_MAX_MS`).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(default)
        };

        Self {
            max_attempts: std::env::var("QC_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts)
                .max(1),
            base_delay: millis("QC_RETRY_BASE_MS", defaults.base_delay),
            max_delay: millis("QC_RETRY_MAX_MS", defaults.max_delay),
        }
    }

    /// Policy that never waits. For tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
pub async fn retry_transient<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(what, attempt, ?delay, error = %e, "transient store failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_transient(&RetryPolicy::immediate(5), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 { Err(StoreError::Timeout) } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&RetryPolicy::immediate(5), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Codec("bad".into())) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Codec(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_bracket_errors_transient_only_through_store() {
        assert!(BracketError::Store(StoreError::Timeout).is_transient());
        assert!(!BracketError::Store(StoreError::StageExists(crate::scoring::state::Stage::Final)).is_transient());
        assert!(!BracketError::TournamentFinished.is_transient());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&RetryPolicy::immediate(3), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Aborted) }
        })
        .await;

        assert_eq!(result, Err(StoreError::Aborted));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
