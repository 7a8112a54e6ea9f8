//! The retry loop.
//!
//! For each attempt: prepare the body, hand the request to the inner
//! transport, ask the retry policy about the outcome, and either return it or
//! discard the response and wait out the backoff. The wait races the request's
//! cancellation token; a fired token ends the loop with `Error::Cancelled`.

use super::Transport;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::request::{Request, Response};
use crate::retry::{default_backoff, default_retry_policy, Backoff, RetryPolicy};
use std::fmt;
use std::sync::Arc;

/// Bytes of an unwanted response body read before it is dropped.
///
/// Bounds the drain only for inner transports that stream the body;
/// [`CurlTransport`](super::CurlTransport) has already buffered it.
pub const MAX_DRAIN_BYTES: u64 = 16 * 1024;

/// Retries after the first attempt when none are configured.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Wraps a transport and retries failed exchanges.
///
/// Configuration is fixed at construction and shared read-only between
/// concurrent requests; each call to `round_trip` runs its own loop.
pub struct RetryTransport<T> {
    inner: T,
    max_retries: u32,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn Backoff>,
    buffer_bodies: bool,
}

impl<T: Transport> RetryTransport<T> {
    /// Wrap `inner` with the default policies and 3 retries.
    pub fn new(inner: T) -> Self {
        Self::builder(inner).build()
    }

    /// Start configuring a retrying wrapper around `inner`.
    pub fn builder(inner: T) -> RetryTransportBuilder<T> {
        RetryTransportBuilder::new(inner)
    }

    /// Wrap `inner` with settings read from a config file.
    pub fn from_config(inner: T, cfg: &RetryConfig) -> Self {
        Self::builder(inner)
            .max_retries(cfg.max_retries())
            .backoff(cfg.backoff.policy())
            .buffer_bodies(cfg.buffer_bodies)
            .build()
    }
}

impl<T> RetryTransport<T> {
    /// Retries allowed after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether streamed bodies are buffered for replay.
    pub fn buffers_bodies(&self) -> bool {
        self.buffer_bodies
    }

    /// The wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Mutable access to the wrapped transport, e.g. to tune its timeouts.
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Swap the wrapped transport, returning the previous one.
    pub fn replace_inner(&mut self, inner: T) -> T {
        std::mem::replace(&mut self.inner, inner)
    }

    /// Unwrap, returning the wrapped transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transport> Transport for RetryTransport<T> {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempt = 1u32;
        loop {
            let replayable = match request.body_mut() {
                Some(body) => body.prepare(self.buffer_bodies).map_err(Error::Body)?,
                None => true,
            };

            let outcome = self.inner.round_trip(request);
            let status = match &outcome {
                Ok(resp) => resp.status().as_u16(),
                Err(_) => 0,
            };

            if !self.retry_policy.should_retry(status, outcome.as_ref().err()) {
                return outcome;
            }
            if attempt >= max_attempts {
                tracing::debug!(
                    "{} {}: giving up after {} attempts",
                    request.method(),
                    request.url(),
                    attempt
                );
                return outcome;
            }
            if !replayable {
                tracing::warn!(
                    "{} {}: body cannot be replayed, not retrying",
                    request.method(),
                    request.url()
                );
                return outcome;
            }

            let wait = self.backoff.backoff(attempt);
            match outcome {
                Ok(resp) => {
                    tracing::debug!(
                        "{} {}: attempt {} got status {}, retrying in {:?}",
                        request.method(),
                        request.url(),
                        attempt,
                        status,
                        wait
                    );
                    resp.drain_and_close(MAX_DRAIN_BYTES);
                }
                Err(e) => {
                    tracing::debug!(
                        "{} {}: attempt {} failed: {}, retrying in {:?}",
                        request.method(),
                        request.url(),
                        attempt,
                        e,
                        wait
                    );
                }
            }

            if let Err(reason) = request.cancel_token().sleep(wait) {
                tracing::info!(
                    "{} {}: {} while waiting to retry",
                    request.method(),
                    request.url(),
                    reason
                );
                return Err(Error::Cancelled(reason));
            }
            attempt += 1;
        }
    }
}

impl<T: Clone> Clone for RetryTransport<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            max_retries: self.max_retries,
            retry_policy: Arc::clone(&self.retry_policy),
            backoff: Arc::clone(&self.backoff),
            buffer_bodies: self.buffer_bodies,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for RetryTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTransport")
            .field("inner", &self.inner)
            .field("max_retries", &self.max_retries)
            .field("buffer_bodies", &self.buffer_bodies)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryTransport`].
pub struct RetryTransportBuilder<T> {
    inner: T,
    max_retries: u32,
    retry_policy: Arc<dyn RetryPolicy>,
    backoff: Arc<dyn Backoff>,
    buffer_bodies: bool,
}

impl<T: Transport> RetryTransportBuilder<T> {
    /// Builder with 3 retries, the default policies and body buffering on.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_policy: Arc::new(default_retry_policy()),
            backoff: Arc::new(default_backoff()),
            buffer_bodies: true,
        }
    }

    /// Retries after the first attempt; `0` disables retrying.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replace the default retry policy. Closures work too.
    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    /// Replace the default backoff. Gets the 1-based number of the attempt
    /// that just failed.
    pub fn backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.backoff = Arc::new(backoff);
        self
    }

    /// Whether streamed bodies without a factory are buffered in memory so
    /// they can be replayed (default). When off, such requests get exactly
    /// one attempt.
    pub fn buffer_bodies(mut self, buffer: bool) -> Self {
        self.buffer_bodies = buffer;
        self
    }

    pub fn build(self) -> RetryTransport<T> {
        RetryTransport {
            inner: self.inner,
            max_retries: self.max_retries,
            retry_policy: self.retry_policy,
            backoff: self.backoff,
            buffer_bodies: self.buffer_bodies,
        }
    }
}
