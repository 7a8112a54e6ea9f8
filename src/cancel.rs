//! Request cancellation: a shared token with an optional deadline.
//!
//! A `CancelToken` is attached to each request. Anyone holding a clone can
//! fire it; the retry loop waits on it between attempts and the curl transport
//! checks it from its progress callback so an in-flight exchange stops too.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Why a token fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// `cancel()` was called explicitly.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => write!(f, "cancelled"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    fired: Mutex<Option<CancelReason>>,
    wake: Condvar,
    deadline: Option<Instant>,
}

/// Cloneable cancellation handle. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that only fires when `cancel()` is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline: Some(deadline),
                ..Inner::default()
            }),
        }
    }

    /// A token that fires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => Self::with_deadline(deadline),
            None => Self::new(),
        }
    }

    /// The deadline, if the token has one.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Fire the token and wake every waiter. Later calls keep the first reason.
    pub fn cancel(&self) {
        let mut fired = self.lock();
        if fired.is_none() {
            *fired = Some(CancelReason::Cancelled);
        }
        self.inner.wake.notify_all();
    }

    /// Reason the token fired, or `None` while it is still live.
    pub fn reason(&self) -> Option<CancelReason> {
        let fired = *self.lock();
        fired.or_else(|| self.deadline_passed(Instant::now()))
    }

    /// True once `cancel()` was called or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Wait for `duration` unless the token fires first.
    ///
    /// Returns `Err(reason)` as soon as the token is cancelled or its deadline
    /// passes; the wait is woken by `cancel()` directly rather than polled.
    pub fn sleep(&self, duration: Duration) -> Result<(), CancelReason> {
        let wake_at = Instant::now().checked_add(duration);
        let mut fired = self.lock();
        loop {
            if let Some(reason) = *fired {
                return Err(reason);
            }
            let now = Instant::now();
            if let Some(reason) = self.deadline_passed(now) {
                return Err(reason);
            }
            if wake_at.is_some_and(|at| now >= at) {
                return Ok(());
            }
            // Wake at whichever comes first: end of the sleep or the deadline.
            let until = match (wake_at, self.inner.deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            fired = match until {
                Some(until) => {
                    let (guard, _) = self
                        .inner
                        .wake
                        .wait_timeout(fired, until.saturating_duration_since(now))
                        .unwrap_or_else(|e| e.into_inner());
                    guard
                }
                None => self
                    .inner
                    .wake
                    .wait(fired)
                    .unwrap_or_else(|e| e.into_inner()),
            };
        }
    }

    fn deadline_passed(&self, now: Instant) -> Option<CancelReason> {
        match self.inner.deadline {
            Some(deadline) if now >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancelReason>> {
        self.inner.fired.lock().unwrap_or_else(|e| e.into_inner())
    }
}
