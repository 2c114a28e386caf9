//! Bounded retry with backoff for rate-limited collaborators.
//!
//! Sleeping goes through [`Sleeper`] so callers can substitute a fake clock in tests.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::{SignalError, SignalResult};

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// 1.0 grows linearly (base, 2*base, 3*base ...), 2.0 doubles each retry
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    /// Linear backoff: base, 2*base, 3*base ...
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 1.0,
            max_delay: base_delay * max_attempts.max(1),
        }
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2.0,
            max_delay,
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let base = self.base_delay.as_secs_f64();
        let secs = if (self.multiplier - 1.0).abs() < f64::EPSILON {
            base * retry as f64
        } else {
            base * self.multiplier.powi(retry as i32 - 1)
        };
        Duration::from_secs_f64(secs).min(self.max_delay)
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Run `op` until it succeeds, fails with a non rate-limit error, or attempts run out.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    sleeper: &dyn Sleeper,
    label: &str,
    mut op: F,
) -> SignalResult<T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = SignalResult<T>> + Send,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = SignalError::RateLimited(format!("{}: no attempts made", label));

    for attempt in 0..attempts {
        if attempt > 0 {
            let wait = policy.delay_for(attempt);
            tracing::info!(
                "Retry {}/{} for {} after {:.0}s",
                attempt,
                attempts - 1,
                label,
                wait.as_secs_f64()
            );
            sleeper.sleep(wait).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limit() => {
                if attempt + 1 < attempts {
                    tracing::warn!("Rate limit hit for {}, will retry", label);
                } else {
                    tracing::error!("Rate limit exceeded for {} after {} attempts", label, attempts);
                }
                last_err = e;
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err)
}
