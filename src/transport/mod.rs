//! Transports: things that perform one HTTP exchange.
//!
//! [`CurlTransport`] talks to the network; [`RetryTransport`] wraps any other
//! transport and replays failed requests. Both implement [`Transport`], so a
//! retrying transport can stand in wherever a plain one is expected.

mod curl_transport;
mod retry;

use crate::error::Error;
use crate::request::{Request, Response};
use std::sync::Arc;

pub use self::curl_transport::CurlTransport;
pub use self::retry::{RetryTransport, RetryTransportBuilder, MAX_DRAIN_BYTES};

/// Performs one request and returns the response or an error.
///
/// Implementations read the request body from `request.body_mut()` and must
/// not retry on their own account.
pub trait Transport: Send + Sync {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        (**self).round_trip(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        (**self).round_trip(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        (**self).round_trip(request)
    }
}

/// Transport backed by a closure. See [`transport_fn`].
#[derive(Clone)]
pub struct FnTransport<F> {
    f: F,
}

/// Turn a closure into a [`Transport`]; handy for tests and adapters.
pub fn transport_fn<F>(f: F) -> FnTransport<F>
where
    F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync,
{
    FnTransport { f }
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync,
{
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        (self.f)(request)
    }
}

impl<F> std::fmt::Debug for FnTransport<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTransport").finish_non_exhaustive()
    }
}
