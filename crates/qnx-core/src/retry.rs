//! Bounded exponential backoff shared by the watcher and the query layer.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{NexusError, NexusResult};

/// Retry policy for transient failures.
///
/// Attempt `n` (zero-based) that fails transiently sleeps
/// `base_delay * 2^n`, capped at `max_delay`, before attempt `n + 1`.
/// After `max_retries` retries the failure becomes
/// [`NexusError::RetriesExhausted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Backoff slept after the failed attempt `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// What follows the failed attempt `attempt` (zero-based): the backoff to
    /// sleep before the next attempt, or the error to surface.
    ///
    /// Only [`NexusError::Transient`] is retried. Past `max_retries` it turns
    /// into [`NexusError::RetriesExhausted`].
    pub fn next_backoff(&self, attempt: u32, err: NexusError) -> NexusResult<Duration> {
        if !err.is_transient() {
            return Err(err);
        }
        if attempt >= self.max_retries {
            return Err(NexusError::RetriesExhausted {
                attempts: attempt + 1,
                last: err.to_string(),
            });
        }
        Ok(self.delay_for(attempt))
    }

    /// Run `op` until it succeeds, fails fatally, or the retry bound is hit.
    ///
    /// `what` names the operation in log output.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> NexusResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NexusResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            let error = err.to_string();
            let backoff = self.next_backoff(attempt, err)?;
            warn!(
                operation = what,
                attempt = attempt + 1,
                error = %error,
                "Retrying after transient failure (backoff {:?})",
                backoff
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy =
            RetryPolicy::new(5, Duration::from_secs(1)).with_max_delay(Duration::from_secs(5));
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
        assert_eq!(policy.delay_for(40), Duration::from_secs(5));
    }

    #[test]
    fn test_next_backoff_decision() {
        let policy = RetryPolicy::new(2, Duration::from_millis(100));
        let transient = || NexusError::Transient("503".into());

        assert_eq!(
            policy.next_backoff(0, transient()).unwrap(),
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.next_backoff(1, transient()).unwrap(),
            Duration::from_millis(200)
        );
        assert!(matches!(
            policy.next_backoff(2, transient()),
            Err(NexusError::RetriesExhausted { attempts: 3, .. })
        ));
        assert!(matches!(
            policy.next_backoff(0, NexusError::NotFound("job-1".into())),
            Err(NexusError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_transient_failures_then_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let value = policy
            .run("fetch", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(NexusError::Transient(format!("503 #{n}")))
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(2, Duration::from_millis(10));

        let err = policy
            .run("fetch", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(NexusError::Transient("connection reset".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, NexusError::RetriesExhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let err = policy
            .run("fetch", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(NexusError::NotFound("job-1".into()))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, NexusError::NotFound(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
