//! Error type shared by every transport.
//!
//! Variants are shaped so the default retry policy can tell errors that a
//! second attempt cannot fix (bad URL, unsupported scheme, rejected
//! certificate) from transient ones.

use crate::cancel::CancelReason;
use std::io;
use thiserror::Error;

/// Boxed error used by custom transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by a single exchange or by the retry loop.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be built (e.g. URL parse failure, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The URL scheme is not supported by the transport.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// The peer certificate was rejected.
    #[error("TLS certificate error: {0}")]
    Certificate(String),

    /// The exchange timed out at the transport level.
    #[error("request timed out")]
    Timeout,

    /// Any other libcurl failure (connect, DNS, reset, ...).
    #[error("curl: {0}")]
    Curl(#[source] curl::Error),

    /// The request body could not be read or regenerated. Never retried.
    #[error("failed to read request body: {0}")]
    Body(#[source] io::Error),

    /// The request's cancellation token fired.
    #[error("request cancelled: {0}")]
    Cancelled(CancelReason),

    /// Error raised by a custom transport, with an optional temporary hint.
    #[error("{source}")]
    Other {
        source: BoxError,
        temporary: Option<bool>,
    },
}

impl Error {
    /// Wraps an arbitrary error without a temporary classification.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Error::Other {
            source: err.into(),
            temporary: None,
        }
    }

    /// Wraps an arbitrary error and marks it temporary (or not).
    pub fn with_temporary(err: impl Into<BoxError>, temporary: bool) -> Self {
        Error::Other {
            source: err.into(),
            temporary: Some(temporary),
        }
    }

    /// Temporary classification, if the error carries one.
    pub fn is_temporary(&self) -> Option<bool> {
        match self {
            Error::Timeout => Some(true),
            Error::Curl(e) if e.is_operation_timedout() => Some(true),
            Error::Other { temporary, .. } => *temporary,
            _ => None,
        }
    }

    /// The cancellation reason when this error came from a fired token.
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        match self {
            Error::Cancelled(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidRequest(e.to_string())
    }
}
