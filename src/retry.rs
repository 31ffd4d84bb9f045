// retry.rs - Bounded exponential backoff for transient upstream failures
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;

use crate::config::RetryConfig;

/// Abstraction over waiting so retry schedules can be observed in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retries an operation up to `max_attempts` times, doubling the delay after
/// each transient failure. Permanent failures return immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    fn schedule(&self) -> AttemptLimited {
        let mut exponential = ExponentialBackoff {
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_secs(3600),
            max_elapsed_time: None,
            ..Default::default()
        };
        exponential.reset();
        let max_retries = self.max_attempts.saturating_sub(1);
        AttemptLimited {
            inner: exponential,
            max_retries,
            retries_left: max_retries,
        }
    }

    /// Delays that would be slept between attempts if every attempt failed transiently.
    pub fn delays(&self) -> Vec<Duration> {
        let mut schedule = self.schedule();
        std::iter::from_fn(|| schedule.next_backoff()).collect()
    }

    pub async fn run<T, E, F, Fut>(&self, sleeper: &dyn Sleeper, mut operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, backoff::Error<E>>>,
        E: std::fmt::Display,
    {
        let mut schedule = self.schedule();
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(backoff::Error::Permanent(err)) => {
                    tracing::error!("Attempt {} failed permanently: {}", attempt, err);
                    return Err(err);
                }
                Err(backoff::Error::Transient { err, .. }) => {
                    tracing::error!("Attempt {} failed: {}", attempt, err);
                    let Some(delay) = schedule.next_backoff() else {
                        tracing::error!("Giving up after {} attempts", attempt);
                        return Err(err);
                    };

                    tracing::warn!(
                        "Transient failure, retrying in {:.1}s (attempt {}/{})",
                        delay.as_secs_f64(),
                        attempt + 1,
                        self.max_attempts
                    );
                    sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Exponential schedule that stops after a fixed number of retries.
///
/// `backoff::future::retry` only bounds total elapsed time and sleeps on the
/// runtime timer directly, so attempts are counted here and the wait goes
/// through [`Sleeper`].
struct AttemptLimited {
    inner: ExponentialBackoff,
    max_retries: u32,
    retries_left: u32,
}

impl Backoff for AttemptLimited {
    fn next_backoff(&mut self) -> Option<Duration> {
        if self.retries_left == 0 {
            return None;
        }
        self.retries_left -= 1;
        self.inner.next_backoff().map(whole_millis)
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.retries_left = self.max_retries;
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

// The backoff schedule works in float nanoseconds; snap back to the configured grid.
fn whole_millis(delay: Duration) -> Duration {
    Duration::from_millis(delay.as_millis() as u64)
}
