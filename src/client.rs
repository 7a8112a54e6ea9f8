//! Small client wrapper over a transport.
//!
//! `Client::new()` gives a retrying curl client with default policies. Any
//! other transport can be wrapped with `Client::with_transport` and upgraded
//! with `make_retryable`.

use crate::body::Body;
use crate::config::RetryConfig;
use crate::error::Error;
use crate::request::{Request, Response};
use crate::transport::{CurlTransport, RetryTransport, RetryTransportBuilder, Transport};

/// Sends requests through a transport.
#[derive(Debug, Clone)]
pub struct Client<T = RetryTransport<CurlTransport>> {
    transport: T,
}

impl Client {
    /// Retrying curl client: 3 retries, default retry and backoff policies.
    pub fn new() -> Self {
        Self::with_transport(RetryTransport::new(CurlTransport::new()))
    }

    /// Retrying curl client configured from `cfg`.
    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::with_transport(RetryTransport::from_config(CurlTransport::new(), cfg))
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Client<T> {
    /// Client over an arbitrary transport, used as is.
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }

    /// Wrap this client's transport in a `RetryTransport`, letting `configure`
    /// adjust the defaults.
    pub fn make_retryable<F>(self, configure: F) -> Client<RetryTransport<T>>
    where
        F: FnOnce(RetryTransportBuilder<T>) -> RetryTransportBuilder<T>,
    {
        let builder = configure(RetryTransport::builder(self.transport));
        Client::with_transport(builder.build())
    }

    /// Send `request` through the transport.
    pub fn execute(&self, mut request: Request) -> Result<Response, Error> {
        self.transport.round_trip(&mut request)
    }

    /// `GET url`.
    pub fn get(&self, url: &str) -> Result<Response, Error> {
        self.execute(Request::get(url)?)
    }

    /// `POST url` with `body`.
    pub fn post(&self, url: &str, body: impl Into<Body>) -> Result<Response, Error> {
        self.execute(Request::post(url, body)?)
    }

    /// The transport requests go through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Swap the whole transport, returning the previous one.
    pub fn replace_transport(&mut self, transport: T) -> T {
        std::mem::replace(&mut self.transport, transport)
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

impl<T: Transport> Client<RetryTransport<T>> {
    /// The transport wrapped by the retry layer.
    pub fn inner_transport(&self) -> &T {
        self.transport.inner()
    }

    pub fn inner_transport_mut(&mut self) -> &mut T {
        self.transport.inner_mut()
    }

    /// Swap the transport under the retry layer, keeping retry settings.
    pub fn replace_inner_transport(&mut self, inner: T) -> T {
        self.transport.replace_inner(inner)
    }
}
