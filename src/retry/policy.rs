//! Retry predicates: whether an attempt's outcome is worth another try.

use crate::error::Error;
use crate::retry::classify::{classify, is_retryable_status};

/// Decides whether an attempt's outcome should be retried.
///
/// `status` is 0 when no response was obtained. Any
/// `Fn(u16, Option<&Error>) -> bool` closure is a retry policy.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, status: u16, err: Option<&Error>) -> bool;
}

impl<F> RetryPolicy for F
where
    F: Fn(u16, Option<&Error>) -> bool + Send + Sync,
{
    fn should_retry(&self, status: u16, err: Option<&Error>) -> bool {
        self(status, err)
    }
}

/// Retries transient failures and leaves everything else alone.
///
/// Errors are retried unless they are known to be permanent (bad request,
/// unsupported scheme, certificate, cancellation, unreadable body); an error
/// flagged temporary is always retried. Without an error, status 0, 408, 409,
/// 423, 425, 429 and transient 5xx responses are retried.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryPolicy;

/// A fresh [`DefaultRetryPolicy`].
pub fn default_retry_policy() -> DefaultRetryPolicy {
    DefaultRetryPolicy
}

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, status: u16, err: Option<&Error>) -> bool {
        match err {
            Some(e) if e.is_temporary() == Some(true) => true,
            Some(e) => classify(e).is_retryable(),
            None => is_retryable_status(status),
        }
    }
}
