//! Backoff policies: how long to wait before the next attempt.

use rand::Rng;
use std::time::Duration;

/// Maps the number of the attempt that just failed (1-based) to a wait.
///
/// Any `Fn(u32) -> Duration` closure is a backoff policy.
pub trait Backoff: Send + Sync {
    fn backoff(&self, attempt: u32) -> Duration;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn backoff(&self, attempt: u32) -> Duration {
        self(attempt)
    }
}

/// Exponential backoff starting at 1 s, capped at 30 s, with up to 100 ms jitter.
pub fn default_backoff() -> Exponential {
    Exponential::new(Duration::from_secs(1))
        .with_max(Duration::from_secs(30))
        .with_jitter(Duration::from_millis(100))
}

/// Same wait after every attempt, plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constant {
    wait: Duration,
    max_jitter: Duration,
}

impl Constant {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            max_jitter: Duration::ZERO,
        }
    }

    /// Add a uniformly random `[0, max_jitter)` to every wait.
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }
}

impl Backoff for Constant {
    fn backoff(&self, _attempt: u32) -> Duration {
        self.wait.saturating_add(jitter(self.max_jitter))
    }
}

/// `attempt × base`, plus jitter, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear {
    base: Duration,
    max: Option<Duration>,
    max_jitter: Duration,
}

impl Linear {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: None,
            max_jitter: Duration::ZERO,
        }
    }

    /// Upper bound on the wait. A bound below `base` disables capping.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = (max >= self.base).then_some(max);
        self
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }
}

impl Backoff for Linear {
    fn backoff(&self, attempt: u32) -> Duration {
        let raw = self
            .base
            .saturating_mul(attempt.max(1))
            .saturating_add(jitter(self.max_jitter));
        cap(raw, self.max)
    }
}

/// `base × 2^(attempt−1)`, plus jitter, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exponential {
    base: Duration,
    max: Option<Duration>,
    max_jitter: Duration,
}

impl Exponential {
    pub fn new(base: Duration) -> Self {
        Self {
            base,
            max: None,
            max_jitter: Duration::ZERO,
        }
    }

    /// Upper bound on the wait. A bound below `base` disables capping.
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = (max >= self.base).then_some(max);
        self
    }

    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn max(&self) -> Option<Duration> {
        self.max
    }
}

impl Backoff for Exponential {
    fn backoff(&self, attempt: u32) -> Duration {
        let raw = match 1u32.checked_shl(attempt.max(1) - 1) {
            Some(factor) => self.base.saturating_mul(factor),
            None => Duration::MAX,
        };
        cap(raw.saturating_add(jitter(self.max_jitter)), self.max)
    }
}

fn cap(wait: Duration, max: Option<Duration>) -> Duration {
    match max {
        Some(max) => wait.min(max),
        None => wait,
    }
}

/// Uniform random duration in `[0, max)`; exactly zero when `max` is zero.
pub(crate) fn jitter(max: Duration) -> Duration {
    let nanos = u64::try_from(max.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::rng().random_range(0..nanos))
}
