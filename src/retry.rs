//! Retry Policy
//!
//! Bounded, explicit retry for cluster operations that may need a second try
//! (e.g. releasing safe mode right after a NameNode restart).

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = try exactly once)
    pub max_retries: usize,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_retries: usize,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Total number of attempts this policy allows
    pub fn attempts(&self) -> usize {
        self.max_retries + 1
    }

    /// Calculate delay for retry attempt (exponential backoff)
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let delay_ms = (self.initial_delay.as_millis() as f64)
            * (self.backoff_multiplier.powi(attempt as i32));
        let delay_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Run `operation` until it reports success or the attempts run out.
    /// Returns whether any attempt succeeded.
    pub async fn retry_until<F, Fut>(&self, what: &str, mut operation: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for attempt in 0..self.attempts() {
            if operation().await {
                return true;
            }
            if attempt < self.max_retries {
                let delay = self.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {} of {}), retrying in {:?}",
                    what,
                    attempt + 1,
                    self.attempts(),
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_until_stops_on_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5), 2.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let ok = policy
            .retry_until("release", move || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) + 1 >= 2 }
            })
            .await;

        assert!(ok);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_until_is_bounded() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2), 1.0);
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let ok = policy
            .retry_until("release", move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    false
                }
            })
            .await;

        assert!(!ok);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_default_policy_tries_once() {
        assert_eq!(RetryPolicy::default().attempts(), 1);
    }

    #[test]
    fn test_retry_policy_delay_calculation() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(300), 2.0);

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(300));
    }
}
