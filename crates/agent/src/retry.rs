//! Retry/backoff policy for provider round-trips.
//!
//! Only rate limiting is transient at this layer: it is retried with
//! exponential backoff and jitter, up to a bounded count. Timeouts and
//! generic API errors surface immediately.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};
use vireo_config::RetryConfig;
use vireo_core::error::ProviderError;
use vireo_core::progress::{ProgressChannel, ProgressEvent};

/// Exponential backoff with jitter around one provider round-trip.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    base_delay_secs: f64,
    max_delay_secs: f64,
    max_retries: u32,
    jitter_fraction: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_delay_secs: config.base_delay_secs,
            max_delay_secs: config.max_delay_secs,
            max_retries: config.max_retries,
            jitter_fraction: config.jitter_fraction,
        }
    }

    /// The deterministic delay before retrying after the `failure_count`-th
    /// consecutive rate-limit failure (1-based):
    /// `min(max_delay, base_delay * 2^(failure_count - 1))`, jitter aside.
    pub fn delay_for(&self, failure_count: u32) -> Duration {
        let exponent = failure_count.saturating_sub(1).min(63) as i32;
        let delay = (self.base_delay_secs * 2f64.powi(exponent)).min(self.max_delay_secs);
        Duration::from_secs_f64(delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_fraction <= 0.0 {
            return delay;
        }
        let span = delay.as_secs_f64() * self.jitter_fraction;
        let jitter = rand::thread_rng().gen_range(0.0..=span);
        delay + Duration::from_secs_f64(jitter)
    }

    /// Drive `attempt` until it succeeds, fails non-transiently, or the
    /// retry budget is spent. The backoff sleep suspends only this task,
    /// never the runtime.
    pub async fn run<T, F, Fut>(
        &self,
        progress: &ProgressChannel,
        mut attempt: F,
    ) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut failures = 0u32;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_retryable() => {
                    failures += 1;
                    if failures >= self.max_retries {
                        warn!(attempts = failures, "Rate limit retries exhausted");
                        return Err(ProviderError::RetriesExhausted { attempts: failures });
                    }
                    let delay = self.jittered(self.delay_for(failures));
                    let delay_secs = delay.as_secs_f64();
                    info!(attempt = failures, delay_secs, "Rate limited, waiting before retry");
                    progress.publish(ProgressEvent::RateLimitWait {
                        attempt: failures,
                        delay_secs,
                    });
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            base_delay_secs: 2.0,
            max_delay_secs: 60.0,
            max_retries,
            jitter_fraction: 0.0,
        })
    }

    #[test]
    fn delay_doubles_from_the_base() {
        let policy = policy(5);
        assert_eq!(policy.delay_for(1), Duration::from_secs_f64(2.0));
        assert_eq!(policy.delay_for(2), Duration::from_secs_f64(4.0));
        assert_eq!(policy.delay_for(3), Duration::from_secs_f64(8.0));
    }

    #[test]
    fn delay_caps_at_the_maximum() {
        let policy = policy(5);
        assert_eq!(policy.delay_for(6), Duration::from_secs_f64(60.0));
        assert_eq!(policy.delay_for(30), Duration::from_secs_f64(60.0));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs_f64(60.0));
    }

    #[test]
    fn jitter_stays_within_a_tenth_of_the_delay() {
        let policy = RetryPolicy::new(&RetryConfig::default());
        for _ in 0..100 {
            let jittered = policy.jittered(Duration::from_secs_f64(10.0));
            assert!(jittered >= Duration::from_secs_f64(10.0));
            assert!(jittered <= Duration::from_secs_f64(11.0));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_after_consecutive_rate_limits() {
        let policy = policy(5);
        let progress = ProgressChannel::default();
        let attempts = AtomicU32::new(0);

        let started = tokio::time::Instant::now();
        let result: Result<(), _> = policy
            .run(&progress, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::RateLimited) }
            })
            .await;

        match result {
            Err(ProviderError::RetriesExhausted { attempts: n }) => assert_eq!(n, 5),
            other => panic!("Expected RetriesExhausted, got: {other:?}"),
        }
        // The 5th failure terminates without sleeping again.
        assert_eq!(attempts.load(Ordering::SeqCst), 5);
        // Slept 2 + 4 + 8 + 16 seconds between the five attempts.
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_transient_rate_limits() {
        let policy = policy(5);
        let progress = ProgressChannel::default();
        let mut rx = progress.subscribe();
        let attempts = AtomicU32::new(0);

        let result = policy
            .run(&progress, || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ProviderError::RateLimited)
                    } else {
                        Ok("answer")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        // Each wait produced a visible notice with the computed delay.
        match rx.try_recv().unwrap() {
            ProgressEvent::RateLimitWait { attempt, delay_secs } => {
                assert_eq!(attempt, 1);
                assert!((delay_secs - 2.0).abs() < 1e-9);
            }
            other => panic!("Expected RateLimitWait, got: {other:?}"),
        }
        match rx.try_recv().unwrap() {
            ProgressEvent::RateLimitWait { attempt, delay_secs } => {
                assert_eq!(attempt, 2);
                assert!((delay_secs - 4.0).abs() < 1e-9);
            }
            other => panic!("Expected RateLimitWait, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_transient_errors_surface_immediately() {
        let policy = policy(5);
        let progress = ProgressChannel::default();
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(&progress, || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ProviderError::Timeout("read timed out".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(ProviderError::Timeout(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn first_try_success_needs_no_waiting() {
        let policy = policy(5);
        let progress = ProgressChannel::default();

        let result = policy.run(&progress, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
