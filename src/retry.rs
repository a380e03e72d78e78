//! Jittered exponential backoff for rate-limited LLM calls.

use crate::error::Result;
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Where the backoff waits. Injected so tests can observe delays without
/// actually sleeping.
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

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included.
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }
}

/// `base` plus a uniform jitter of up to half of `base`.
pub fn backoff_delay<R: Rng + ?Sized>(base: Duration, rng: &mut R) -> Duration {
    let jitter = rng.gen_range(0.0..=0.5) * base.as_secs_f64();
    base + Duration::from_secs_f64(jitter)
}

/// Run `operation`, retrying only rate-limit failures.
///
/// After each rate-limited attempt that will be followed by another one, waits
/// `delay + uniform(0, delay / 2)` and doubles `delay`. Any other error is
/// returned immediately. When every attempt is rate limited the last
/// rate-limit error is returned.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_retries.max(1);
    let mut delay = policy.initial_delay;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "request succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if error.is_rate_limited() => {
                if attempt >= max_attempts {
                    tracing::error!(
                        attempts = attempt,
                        "failed to get LLM response after retries due to rate limits"
                    );
                    return Err(error);
                }

                let wait = {
                    let mut rng = rand::thread_rng();
                    backoff_delay(delay, &mut rng)
                };
                tracing::warn!(
                    attempt,
                    max_attempts,
                    delay_ms = wait.as_millis() as u64,
                    "rate limit hit, retrying"
                );
                sleeper.sleep(wait).await;
                delay = delay.saturating_mul(2);
            }
            Err(error) => {
                tracing::warn!(error = %error, "non-retryable error during LLM call");
                return Err(error);
            }
        }
    }
}
