//! Provider waterfall executor
//!
//! Tries providers strictly in the order given, each inside a permit of its
//! named pool and under the retry policy. After every success the contribution
//! is merged into an accumulator and the caller's sufficiency predicate decides
//! whether further (paid) calls are needed. Exhausting the list returns the
//! partial result; the executor never fails as a whole.

pub mod pools;
pub mod retry;

pub use pools::{ProviderPools, DEFAULT_POOL_LIMIT};
pub use retry::RetryPolicy;

use crate::providers::{Confidence, ProviderError, ProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One step of a waterfall
#[async_trait]
pub trait WaterfallProvider<I: Sync, C>: Send + Sync {
    fn name(&self) -> &str;

    /// Concurrency pool the call runs in (defaults to the provider name)
    fn pool(&self) -> &str {
        self.name()
    }

    /// Estimated cost of one successful call, in dollars
    fn cost_estimate(&self) -> f64 {
        0.0
    }

    /// Minimum confidence at which this provider's output counts toward sufficiency
    fn confidence_floor(&self) -> Confidence {
        0
    }

    /// Whether the waterfall may stop right after this provider satisfies it
    fn stop_on_success(&self) -> bool {
        true
    }

    async fn call(&self, input: &I) -> ProviderResult<C>;
}

/// Merges provider contributions into a running result
pub trait Accumulator<C>: Default + Send {
    fn merge(&mut self, provider: &str, confidence_floor: Confidence, contribution: &C);
}

/// What a sufficiency predicate gets to look at
pub struct SufficiencyCheck<'a, C, A> {
    pub provider: &'a str,
    pub confidence_floor: Confidence,
    /// The contribution that was just merged
    pub latest: &'a C,
    /// Everything merged so far, `latest` included
    pub accumulated: &'a A,
}

/// A provider that answered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub provider: String,
    pub cost_estimate: f64,
    pub attempts: u32,
    pub latency_ms: u64,
}

/// A provider that did not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub error: String,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub struct WaterfallOutcome<A> {
    pub result: A,
    pub providers_used: Vec<ProviderUsage>,
    pub failures: Vec<ProviderFailure>,
    /// Sum of cost estimates of providers that answered
    pub cost_estimate: f64,
    pub satisfied: bool,
}

impl<A> WaterfallOutcome<A> {
    pub fn provider_names(&self) -> Vec<String> {
        self.providers_used.iter().map(|u| u.provider.clone()).collect()
    }
}

pub struct WaterfallExecutor {
    pools: Arc<ProviderPools>,
    retry: RetryPolicy,
}

impl WaterfallExecutor {
    pub fn new(pools: Arc<ProviderPools>, retry: RetryPolicy) -> Self {
        Self { pools, retry }
    }

    pub fn pools(&self) -> &Arc<ProviderPools> {
        &self.pools
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// One call outside a waterfall, inside `pool` and under the retry policy
    pub async fn call_guarded<T, F, Fut>(&self, pool: &str, operation: F) -> ProviderResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProviderResult<T>>,
    {
        let _permit = self
            .pools
            .acquire(pool)
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        self.retry.run(pool, operation).await.result
    }

    /// Run `providers` in order until `sufficient` is met by a stopping provider
    pub async fn run<I, C, A, F>(
        &self,
        providers: &[Arc<dyn WaterfallProvider<I, C>>],
        input: &I,
        sufficient: F,
    ) -> WaterfallOutcome<A>
    where
        I: Sync,
        C: Send,
        A: Accumulator<C>,
        F: Fn(&SufficiencyCheck<'_, C, A>) -> bool,
    {
        let mut outcome = WaterfallOutcome {
            result: A::default(),
            providers_used: Vec::new(),
            failures: Vec::new(),
            cost_estimate: 0.0,
            satisfied: false,
        };

        for provider in providers {
            let name = provider.name();

            let _permit = match self.pools.acquire(provider.pool()).await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!(provider = name, error = %e, "Provider pool closed");
                    outcome.failures.push(ProviderFailure {
                        provider: name.to_string(),
                        error: e.to_string(),
                        attempts: 0,
                    });
                    continue;
                }
            };

            let attempted = self.retry.run(name, || provider.call(input)).await;

            let contribution = match attempted.result {
                Ok(contribution) => contribution,
                Err(e) => {
                    warn!(
                        provider = name,
                        attempts = attempted.attempts,
                        error = %e,
                        "Provider failed, continuing waterfall"
                    );
                    outcome.failures.push(ProviderFailure {
                        provider: name.to_string(),
                        error: e.to_string(),
                        attempts: attempted.attempts,
                    });
                    continue;
                }
            };

            let floor = provider.confidence_floor();
            outcome.result.merge(name, floor, &contribution);
            outcome.cost_estimate += provider.cost_estimate();
            outcome.providers_used.push(ProviderUsage {
                provider: name.to_string(),
                cost_estimate: provider.cost_estimate(),
                attempts: attempted.attempts,
                latency_ms: attempted.elapsed.as_millis() as u64,
            });

            let satisfied = sufficient(&SufficiencyCheck {
                provider: name,
                confidence_floor: floor,
                latest: &contribution,
                accumulated: &outcome.result,
            });
            outcome.satisfied |= satisfied;

            debug!(
                provider = name,
                satisfied,
                latency_ms = attempted.elapsed.as_millis() as u64,
                "Provider answered"
            );

            if satisfied && provider.stop_on_success() {
                break;
            }
        }

        info!(
            providers_used = outcome.providers_used.len(),
            failures = outcome.failures.len(),
            cost_estimate = outcome.cost_estimate,
            satisfied = outcome.satisfied,
            "Waterfall finished"
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Step {
        name: &'static str,
        reply: Result<u32, ProviderError>,
        stop: bool,
        calls: AtomicU32,
    }

    impl Step {
        fn new(name: &'static str, reply: Result<u32, ProviderError>) -> Arc<Self> {
            Arc::new(Self {
                name,
                reply,
                stop: true,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl WaterfallProvider<(), u32> for Step {
        fn name(&self) -> &str {
            self.name
        }

        fn cost_estimate(&self) -> f64 {
            0.25
        }

        fn stop_on_success(&self) -> bool {
            self.stop
        }

        async fn call(&self, _input: &()) -> ProviderResult<u32> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    #[derive(Default)]
    struct Sum(u32);

    impl Accumulator<u32> for Sum {
        fn merge(&mut self, _provider: &str, _floor: Confidence, contribution: &u32) {
            self.0 += contribution;
        }
    }

    fn executor() -> WaterfallExecutor {
        WaterfallExecutor::new(
            Arc::new(ProviderPools::default()),
            RetryPolicy {
                max_attempts: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
        )
    }

    #[tokio::test]
    async fn test_stops_when_sufficient() {
        let a = Step::new("a", Ok(1));
        let b = Step::new("b", Ok(10));
        let c = Step::new("c", Ok(100));
        let providers: Vec<Arc<dyn WaterfallProvider<(), u32>>> = vec![a.clone(), b.clone(), c.clone()];

        let outcome: WaterfallOutcome<Sum> = executor()
            .run(&providers, &(), |check: &SufficiencyCheck<'_, u32, Sum>| check.accumulated.0 >= 10)
            .await;

        assert!(outcome.satisfied);
        assert_eq!(outcome.result.0, 11);
        assert_eq!(outcome.provider_names(), vec!["a", "b"]);
        assert_eq!(c.calls.load(Ordering::SeqCst), 0);
        assert!((outcome.cost_estimate - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failures_recorded_and_skipped() {
        let a = Step::new("a", Err(ProviderError::Auth("bad key".into())));
        let b = Step::new("b", Err(ProviderError::RateLimited { retry_after: None }));
        let c = Step::new("c", Ok(5));
        let providers: Vec<Arc<dyn WaterfallProvider<(), u32>>> = vec![a.clone(), b.clone(), c.clone()];

        let outcome: WaterfallOutcome<Sum> = executor().run(&providers, &(), |_| false).await;

        assert!(!outcome.satisfied);
        assert_eq!(outcome.result.0, 5);
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.failures[1].attempts, 2);
        // Cost accrues only for providers that answered
        assert!((outcome.cost_estimate - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_non_stopping_provider_continues() {
        let a = Arc::new(Step {
            name: "a",
            reply: Ok(10),
            stop: false,
            calls: AtomicU32::new(0),
        });
        let b = Step::new("b", Ok(1));
        let providers: Vec<Arc<dyn WaterfallProvider<(), u32>>> = vec![a, b.clone()];

        let outcome: WaterfallOutcome<Sum> = executor()
            .run(&providers, &(), |check: &SufficiencyCheck<'_, u32, Sum>| check.accumulated.0 >= 10)
            .await;

        assert!(outcome.satisfied);
        assert_eq!(b.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.result.0, 11);
    }
    #[tokio::test]
    async fn test_guarded_call_retries_and_respects_pool() {
        let executor = Arc::new(WaterfallExecutor::new(
            Arc::new(ProviderPools::new(4, [("solo".to_string(), 1)].into_iter().collect())),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
        ));

        let counter = AtomicU32::new(0);
        let calls = &counter;
        let answer = executor
            .call_guarded("solo", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ProviderError::RateLimited { retry_after: None })
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(answer.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        let in_flight = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let executor = executor.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    executor
                        .call_guarded("solo", || {
                            let in_flight = in_flight.clone();
                            let peak = peak.clone();
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(10)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, ProviderError>(())
                            }
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
