//! Rate-limit aware retry executor
//!
//! Wraps an upstream call and retries it while the provider answers with
//! HTTP 429, sleeping on an exponential schedule (5, 10, 20, 40, 80 s by
//! default). Exhausting the attempts is not an error: the caller gets an
//! empty `{"data": []}` payload and an error-level event is logged. Any
//! other failure status is returned as an upstream error without retrying.
//!
//! [`RetryExecutor::fetch`] additionally reports whether the payload came
//! from exhaustion, so callers can avoid caching it.

use crate::config::RetryConfig;
use crate::errors::Result;
use crate::metrics;
use crate::providers::ProviderResponse;
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Payload handed back once every attempt was rate limited
pub fn empty_payload() -> Value {
    json!({ "data": [] })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Pause after every response that was not rate limited
    pub courtesy_delay: Duration,
    /// Whether the final rate-limited attempt is also followed by a backoff
    pub sleep_after_last: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
            courtesy_delay: Duration::from_millis(500),
            sleep_after_last: true,
        }
    }
}

impl RetryPolicy {
    /// Policy for graph fetches
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_secs(config.base_delay_secs),
            courtesy_delay: Duration::from_millis(config.courtesy_delay_ms),
            sleep_after_last: true,
        }
    }

    /// Lighter policy for the per-result title lookups of a search: gives up
    /// right after the last rate-limited attempt
    pub fn enrichment(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.enrichment_max_attempts.max(1),
            sleep_after_last: false,
            ..Self::from_config(config)
        }
    }

    fn sleeps_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts || self.sleep_after_last
    }

    /// Deterministic doubling schedule capped at the last attempt's delay
    fn schedule(&self) -> ExponentialBackoff {
        let doublings = self.max_attempts.saturating_sub(1).min(16);
        let ceiling = self.base_delay.saturating_mul(1u32 << doublings);

        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_randomization_factor(0.0)
            .with_multiplier(2.0)
            .with_max_interval(ceiling)
            .with_max_elapsed_time(None)
            .build()
    }

    /// The delays slept when every attempt is rate limited, in order
    pub fn delays(&self) -> Vec<Duration> {
        let mut schedule = self.schedule();
        (1..=self.max_attempts)
            .filter(|attempt| self.sleeps_after(*attempt))
            .map(|_| schedule.next_backoff().unwrap_or(self.base_delay))
            .collect()
    }
}

/// Upstream payload plus whether rate limiting cut it short
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    /// Every attempt was rate limited and `value` is a stand-in
    pub exhausted: bool,
}

impl<T> Fetched<T> {
    pub fn complete(value: T) -> Self {
        Self { value, exhausted: false }
    }

    pub fn is_complete(&self) -> bool {
        !self.exhausted
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            exhausted: self.exhausted,
        }
    }
}

/// Source of delays, swapped out in tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_sleeper(policy, Arc::new(TokioSleeper))
    }

    pub fn with_sleeper(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `call` until it is not rate limited or attempts run out
    pub async fn execute<F, Fut>(&self, service: &str, call: F) -> Result<Value>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<ProviderResponse>> + Send,
    {
        self.fetch(service, call).await.map(Fetched::into_value)
    }

    /// Same as [`execute`](Self::execute), flagging an exhausted result
    pub async fn fetch<F, Fut>(&self, service: &str, mut call: F) -> Result<Fetched<Value>>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<ProviderResponse>> + Send,
    {
        let max_attempts = self.policy.max_attempts;
        let mut schedule = self.policy.schedule();

        for attempt in 1..=max_attempts {
            let response = call().await?;

            if response.is_rate_limited() {
                metrics::record_rate_limited(service);
                if !self.policy.sleeps_after(attempt) {
                    warn!(service = service, attempt = attempt, "Rate limit exceeded on final attempt");
                    continue;
                }
                let delay = schedule.next_backoff().unwrap_or(self.policy.base_delay);
                warn!(
                    service = service,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    wait_secs = delay.as_secs_f64(),
                    "Rate limit exceeded, backing off before retry"
                );
                self.sleeper.sleep(delay).await;
                continue;
            }

            self.sleeper.sleep(self.policy.courtesy_delay).await;
            return response.into_result(service).map(Fetched::complete);
        }

        error!(
            service = service,
            attempts = max_attempts,
            "Giving up after repeated rate limiting, returning empty result"
        );
        metrics::record_retry_exhausted(service);
        Ok(Fetched {
            value: empty_payload(),
            exhausted: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct RecordingSleeper {
        slept: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.slept.lock().unwrap().push(duration);
        }
    }

    impl RecordingSleeper {
        fn recorded(&self) -> Vec<Duration> {
            self.slept.lock().unwrap().clone()
        }
    }

    fn executor() -> (RetryExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::default());
        (RetryExecutor::with_sleeper(RetryPolicy::default(), sleeper.clone()), sleeper)
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[test]
    fn test_default_schedule() {
        assert_eq!(RetryPolicy::default().delays(), secs(&[5, 10, 20, 40, 80]));
    }

    #[tokio::test]
    async fn test_success_after_four_rate_limits() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("s2", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 5 {
                        Ok(ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null))
                    } else {
                        Ok(ProviderResponse::ok(json!({"data": [{"paperId": "p1"}]})))
                    }
                }
            })
            .await;

        let body = assert_ok!(result);
        assert_eq!(body["data"][0]["paperId"], "p1");
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let mut expected = secs(&[5, 10, 20, 40]);
        expected.push(Duration::from_millis(500));
        assert_eq!(sleeper.recorded(), expected);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_empty_payload() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("s2", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null)) }
            })
            .await;

        assert_eq!(assert_ok!(result), empty_payload());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(sleeper.recorded(), secs(&[5, 10, 20, 40, 80]));
    }

    #[tokio::test]
    async fn test_fetch_flags_exhaustion() {
        let (executor, _) = executor();

        let limited = executor
            .fetch("s2", || async { Ok(ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null)) })
            .await;
        let limited = assert_ok!(limited);
        assert!(limited.exhausted);
        assert_eq!(limited.value, empty_payload());

        let served = executor
            .fetch("s2", || async { Ok(ProviderResponse::ok(json!({"data": []}))) })
            .await;
        assert!(assert_ok!(served).is_complete());
    }

    #[tokio::test]
    async fn test_enrichment_gives_up_after_one_wait() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_secs: 5,
            courtesy_delay_ms: 500,
            enrichment_max_attempts: 2,
        };
        let sleeper = Arc::new(RecordingSleeper::default());
        let executor = RetryExecutor::with_sleeper(RetryPolicy::enrichment(&config), sleeper.clone());
        let calls = AtomicU32::new(0);

        let result = executor
            .fetch("s2", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(ProviderResponse::new(StatusCode::TOO_MANY_REQUESTS, Value::Null)) }
            })
            .await;

        assert!(assert_ok!(result).exhausted);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sleeper.recorded(), secs(&[5]));
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let (executor, sleeper) = executor();
        let calls = AtomicU32::new(0);

        let result = executor
            .execute("s2", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Ok(ProviderResponse::new(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({"message": "Internal Server Error"}),
                    ))
                }
            })
            .await;

        match result {
            Err(AppError::Upstream { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected upstream error, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let (executor, sleeper) = executor();
        let result = executor
            .execute("s2", || async {
                Err(AppError::Internal {
                    message: "connection reset".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(AppError::Internal { .. })));
        assert!(sleeper.recorded().is_empty());
    }

    #[test]
    fn test_enrichment_policy() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay_secs: 5,
            courtesy_delay_ms: 500,
            enrichment_max_attempts: 2,
        };
        let policy = RetryPolicy::enrichment(&config);
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.delays(), secs(&[5]));
        assert_eq!(RetryPolicy::from_config(&config).delays(), secs(&[5, 10, 20, 40, 80]));
    }
}
