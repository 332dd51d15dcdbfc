//! Retry policy with exponential backoff
//!
//! Shared by the feed pipeline and the maintenance scheduler for outbound
//! calls. The delay schedule is a pure function of the attempt number so it
//! stays independently testable from any transport.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Capped exponential backoff: up to `max_attempts` tries with the delay
/// doubling from `base_delay` between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `attempt` (zero-based): base * 2^attempt, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    /// Run `op` up to `max_attempts` times, sleeping the policy delay between
    /// failures. Returns the last error once attempts are exhausted; the
    /// caller decides whether that is terminal.
    pub async fn retry<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        warn!("{} failed after {} attempts: {}", label, attempt, e);
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt - 1);
                    debug!(
                        "{} attempt {} failed: {}; retrying in {:?}",
                        label, attempt, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delays_double_from_base() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(10));

        assert_eq!(policy.delay_for(6), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: Result<u32, String> = policy
            .retry("op", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 1 {
                    Err("not yet".to_string())
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_retry_exhausts_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(10));
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = policy
            .retry("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("still down".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
