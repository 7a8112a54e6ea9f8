//! Classify transport errors and HTTP status codes for retry decisions.

use crate::error::Error;

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Request could not be built or the URL did not parse.
    InvalidRequest,
    /// Scheme the transport cannot speak.
    UnsupportedScheme,
    /// Peer certificate rejected; retrying will not change the certificate.
    Certificate,
    /// The request's cancellation token fired.
    Cancelled,
    /// The request body could not be read, or not rewound for a resend.
    Body,
    /// Operation timed out (connect/read).
    Timeout,
    /// Network-level failure (connection refused or reset, DNS, ...).
    Connection,
    /// Anything else. Retried, since we cannot tell it is permanent.
    Unknown,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        match self {
            ErrorKind::InvalidRequest
            | ErrorKind::UnsupportedScheme
            | ErrorKind::Certificate
            | ErrorKind::Cancelled
            | ErrorKind::Body => false,
            ErrorKind::Timeout | ErrorKind::Connection | ErrorKind::Unknown => true,
        }
    }
}

/// Classify an HTTP status code. Status 0 (no response) counts as retryable.
pub fn is_retryable_status(status: u16) -> bool {
    match status {
        0 => true,
        408 | 409 | 423 | 425 | 429 => true,
        // Not Implemented, Version Not Supported, Variant Also Negotiates,
        // Loop Detected, Not Extended, Network Authentication Required.
        501 | 505 | 506 | 508 | 510 | 511 => false,
        500..=599 => true,
        _ => false,
    }
}

/// Classify a curl error.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_url_malformed() {
        return ErrorKind::InvalidRequest;
    }
    if e.is_unsupported_protocol() {
        return ErrorKind::UnsupportedScheme;
    }
    if e.is_peer_failed_verification() || e.is_ssl_certproblem() || e.is_ssl_cacert_badfile() {
        return ErrorKind::Certificate;
    }
    if e.is_send_fail_rewind() {
        return ErrorKind::Body;
    }
    if e.is_aborted_by_callback() {
        return ErrorKind::Cancelled;
    }
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_ssl_connect_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return ErrorKind::Connection;
    }
    ErrorKind::Unknown
}

/// Classify a transport error into an `ErrorKind`.
pub fn classify(e: &Error) -> ErrorKind {
    match e {
        Error::InvalidRequest(_) => ErrorKind::InvalidRequest,
        Error::UnsupportedScheme(_) => ErrorKind::UnsupportedScheme,
        Error::Certificate(_) => ErrorKind::Certificate,
        Error::Cancelled(_) => ErrorKind::Cancelled,
        Error::Body(_) => ErrorKind::Body,
        Error::Timeout => ErrorKind::Timeout,
        Error::Curl(ce) => classify_curl_error(ce),
        Error::Other { .. } => ErrorKind::Unknown,
    }
}
