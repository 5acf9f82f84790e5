//! Bounded retry policy for selector waits and clicks.

use std::future::Future;
use std::time::Duration;

/// `(max_attempts, per_attempt_timeout, backoff)` for one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Upper bound for a single attempt.
    pub per_attempt_timeout: Duration,
    /// Sleep between failed attempts.
    pub backoff: Duration,
}

/// Why the policy gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: String,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, per_attempt_timeout: Duration, backoff: Duration) -> Self {
        Self {
            max_attempts,
            per_attempt_timeout,
            backoff,
        }
    }

    /// Clicks on controls that may not be interactive yet.
    pub const fn click() -> Self {
        Self::new(5, Duration::from_secs(5), Duration::from_secs(1))
    }

    /// A single wait, used for liveness checks.
    pub const fn single(timeout: Duration) -> Self {
        Self::new(1, timeout, Duration::ZERO)
    }

    /// Run `op` until it succeeds, each attempt bounded by the per-attempt
    /// timeout.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            tracing::debug!("{label}: attempt {attempt}/{attempts}");
            match tokio::time::timeout(self.per_attempt_timeout, op()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => {
                    last_error = format!("timed out after {}ms", self.per_attempt_timeout.as_millis())
                }
            }
            tracing::warn!("{label}: attempt {attempt}/{attempts} failed: {last_error}");
            if attempt < attempts && !self.backoff.is_zero() {
                tokio::time::sleep(self.backoff).await;
            }
        }

        Err(RetryExhausted {
            attempts,
            last_error,
        })
    }
}
