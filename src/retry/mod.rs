//! Retry and backoff policies.
//!
//! Error classification (permanent vs. transient errors, retryable status
//! codes), the retry predicate, and the backoff schedules live here so that
//! the retrying transport and custom policies share the same rules.

mod backoff;
mod classify;
mod policy;

pub use backoff::{default_backoff, Backoff, Constant, Exponential, Linear};
pub use classify::{classify, classify_curl_error, is_retryable_status, ErrorKind};
pub use policy::{default_retry_policy, DefaultRetryPolicy, RetryPolicy};
