//! Retrying HTTP transport.
//!
//! [`RetryTransport`] wraps any [`Transport`] (by default the libcurl-backed
//! [`CurlTransport`]) and replays failed requests according to a
//! [`RetryPolicy`] and a [`Backoff`] policy. Request bodies are made
//! replayable either through a regeneration factory or by buffering them once.

pub mod body;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod request;
pub mod retry;
pub mod transport;

pub use body::Body;
pub use cancel::{CancelReason, CancelToken};
pub use client::Client;
pub use config::RetryConfig;
pub use error::Error;
pub use request::{Request, Response};
pub use retry::{
    default_backoff, default_retry_policy, Backoff, Constant, DefaultRetryPolicy, Exponential,
    Linear, RetryPolicy,
};
pub use transport::{
    transport_fn, CurlTransport, RetryTransport, RetryTransportBuilder, Transport,
};
