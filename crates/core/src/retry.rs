//! Retrying model calls.

use std::time::Duration;

use backoff::ExponentialBackoffBuilder;

use crate::Error;

/// How often, and how patiently, a failed model call is repeated.
///
/// Only errors for which [`Error::is_retryable`] holds are repeated; others
/// are returned right away.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. `0` is treated
    /// as `1`.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_interval: Duration,
    /// Upper bound for a single wait.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// A policy that never repeats a call.
    #[inline]
    pub fn never() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or the attempts are
    /// used up. The last error is returned in the latter cases.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_interval)
            .with_max_interval(self.max_interval)
            .with_max_elapsed_time(None)
            .build();

        let mut attempt = 0;
        backoff::future::retry_notify(
            backoff,
            || {
                attempt += 1;
                let this_attempt = attempt;
                let fut = op();
                async move {
                    fut.await.map_err(|err| {
                        if err.is_retryable() && this_attempt < max_attempts {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                }
            },
            |err: Error, wait: Duration| {
                warn!("{what} failed, retrying in {wait:?}: {err}");
            },
        )
        .await
    }
}
