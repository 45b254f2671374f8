//! Bounded polling with a terminal predicate.

use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

/// Interval, growth and deadline for [`poll_until`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PollConfig {
    /// Delay after the first unsuccessful check.
    pub interval: Duration,
    /// Upper bound for the delay between checks.
    pub max_interval: Duration,
    /// Multiplier applied to the delay after every unsuccessful check; `1`
    /// keeps the interval fixed.
    pub backoff_factor: u32,
    /// Overall deadline measured from the first check.
    pub timeout: Duration,
}

impl PollConfig {
    /// Fixed-interval polling.
    #[must_use]
    pub const fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_factor: 1,
            timeout,
        }
    }

    /// Exponential polling doubling the interval up to `max_interval`.
    #[must_use]
    pub const fn exponential(
        interval: Duration,
        max_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            interval,
            max_interval,
            backoff_factor: 2,
            timeout,
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.backoff_factor.max(1))
            .min(self.max_interval.max(self.interval))
    }
}

/// Failure of [`poll_until`].
#[derive(Debug, Error, Eq, PartialEq)]
pub enum PollError<E> {
    /// The deadline passed without the predicate holding.
    #[error("condition not met after {elapsed:?} ({attempts} checks)")]
    TimedOut {
        /// Time spent waiting.
        elapsed: Duration,
        /// Number of checks performed.
        attempts: u32,
    },
    /// The check itself failed.
    #[error(transparent)]
    Check(E),
}

/// Calls `check` until it yields a value or the deadline passes.
///
/// `check` returns `Ok(Some(value))` when done, `Ok(None)` to keep waiting,
/// and `Err` to stop immediately. It runs at least once; sleeps never extend
/// past the deadline.
///
/// # Errors
///
/// Returns [`PollError::TimedOut`] when the deadline passes and
/// [`PollError::Check`] when `check` fails.
pub async fn poll_until<T, E, F, Fut>(config: PollConfig, mut check: F) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let started = Instant::now();
    let deadline = started + config.timeout;
    let mut delay = config.interval;
    let mut attempts = 0_u32;

    loop {
        attempts = attempts.saturating_add(1);
        if let Some(value) = check().await.map_err(PollError::Check)? {
            return Ok(value);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PollError::TimedOut {
                elapsed: now.duration_since(started),
                attempts,
            });
        }

        let pause = delay.min(deadline.duration_since(now));
        debug!(attempt = attempts, delay_ms = pause.as_millis(), "condition not met, waiting");
        sleep(pause).await;
        delay = config.next_interval(delay);
    }
}
