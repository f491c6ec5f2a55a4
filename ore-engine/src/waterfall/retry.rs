//! Provider call retry with exponential backoff
//!
//! Only [`ProviderError::RateLimited`] is retried. Auth, HTTP, malformed,
//! network and not-configured failures return on the first attempt.

use crate::providers::ProviderError;
use std::future::Future;
use std::time::{Duration, Instant};

/// Ceiling on a vendor-supplied `Retry-After`
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

/// Outcome of a retried call
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, ProviderError>,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails fatally, or attempts run out
    pub async fn run<F, Fut, T>(&self, provider: &str, mut operation: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let start = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(
                            provider,
                            attempt,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Provider call succeeded after retry"
                        );
                    }
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                        elapsed: start.elapsed(),
                    };
                }
                Err(err) if !err.is_retryable() => {
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                        elapsed: start.elapsed(),
                    };
                }
                Err(err) => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            provider,
                            attempt,
                            "Provider still rate limited, giving up"
                        );
                        return Attempted {
                            result: Err(err),
                            attempts: attempt,
                            elapsed: start.elapsed(),
                        };
                    }

                    let delay = err
                        .retry_after()
                        .map(|d| d.min(MAX_RETRY_AFTER))
                        .unwrap_or_else(|| backoff.min(self.max_backoff));

                    tracing::warn!(
                        provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Provider rate limited, will retry after backoff"
                    );

                    tokio::time::sleep(delay).await;
                    backoff = (backoff * 2).min(self.max_backoff);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_retried_up_to_cap() {
        let calls = AtomicU32::new(0);
        let outcome = fast_policy(3)
            .run("vendor", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderError::RateLimited { retry_after: None })
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(outcome.attempts, 3);
        assert!(matches!(outcome.result, Err(ProviderError::RateLimited { .. })));
    }

    #[tokio::test]
    async fn test_fatal_error_not_retried() {
        let calls = AtomicU32::new(0);
        let outcome = fast_policy(5)
            .run("vendor", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ProviderError::Auth("revoked".into()))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_recovers_after_rate_limit() {
        let calls = AtomicU32::new(0);
        let outcome = fast_policy(3)
            .run("vendor", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Err(ProviderError::RateLimited {
                        retry_after: Some(Duration::from_millis(2)),
                    })
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(outcome.result, Ok(1));
        assert_eq!(outcome.attempts, 2);
    }
}
