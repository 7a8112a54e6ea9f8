//! libcurl-backed transport.
//!
//! One `Easy` handle per exchange. The request body is streamed through the
//! read callback and the response body is collected in memory. The progress
//! callback aborts the transfer once the request's cancel token fires.

use super::Transport;
use crate::body::Body;
use crate::error::Error;
use crate::request::{Request, Response};
use crate::retry::{classify_curl_error, ErrorKind};
use curl::easy::{Easy, List, ReadError, SeekResult};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::cell::RefCell;
use std::io::{self, Read, SeekFrom};
use std::time::{Duration, Instant};

/// Performs a single HTTP exchange with libcurl. Never retries by itself.
///
/// The whole response body is read into memory before `round_trip`
/// returns, with no size limit. A retrying wrapper's drain bound
/// ([`MAX_DRAIN_BYTES`](super::MAX_DRAIN_BYTES)) therefore only limits how
/// much of that buffer is skipped, not what is downloaded. Set a
/// [`timeout`](Self::set_timeout) or a token deadline to bound slow or huge
/// bodies.
///
/// Redirects are followed by default. A 307/308 redirect resends the body:
/// buffered bodies are rewound and factory bodies regenerated, while a plain
/// stream fails with [`Error::Body`].
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    timeout: Option<Duration>,
    follow_redirects: bool,
    max_redirections: u32,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            timeout: None,
            follow_redirects: true,
            max_redirections: 10,
        }
    }
}

impl CurlTransport {
    /// 30 s connect timeout, no overall timeout, up to 10 redirects.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Hard limit on a whole exchange (`None` = no limit).
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn set_follow_redirects(&mut self, follow: bool) {
        self.follow_redirects = follow;
    }

    /// Redirects followed before giving up.
    pub fn set_max_redirections(&mut self, max: u32) {
        self.max_redirections = max;
    }

    fn configure(&self, easy: &mut Easy, request: &Request) -> Result<(), Error> {
        easy.url(request.url().as_str())?;
        easy.follow_location(self.follow_redirects)?;
        if self.follow_redirects {
            easy.max_redirections(self.max_redirections)?;
        }
        easy.connect_timeout(self.connect_timeout)?;

        // Bound the exchange by the token deadline too, so a stalled peer
        // cannot outlive it.
        let until_deadline = request
            .cancel_token()
            .deadline()
            .map(|d| d.saturating_duration_since(Instant::now()));
        let timeout = match (self.timeout, until_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if let Some(timeout) = timeout {
            easy.timeout(timeout.max(Duration::from_millis(1)))?;
        }
        easy.progress(true)?;

        let mut list = List::new();
        for (name, value) in request.headers() {
            list.append(&format!(
                "{}: {}",
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).trim()
            ))?;
        }

        let method = request.method();
        match request.body() {
            Some(body) => {
                easy.post(true)?;
                match body.len() {
                    Some(len) => easy.post_field_size(len)?,
                    None => list.append("Transfer-Encoding: chunked")?,
                }
                // Skip the 100-continue round trip.
                list.append("Expect:")?;
                if *method != Method::POST {
                    easy.custom_request(method.as_str())?;
                }
            }
            None if *method == Method::GET => easy.get(true)?,
            None if *method == Method::HEAD => easy.nobody(true)?,
            None if *method == Method::POST => {
                easy.post(true)?;
                easy.post_field_size(0)?;
            }
            None => easy.custom_request(method.as_str())?,
        }
        easy.http_headers(list)?;
        Ok(())
    }
}

impl Transport for CurlTransport {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        let cancel = request.cancel_token().clone();
        if let Some(reason) = cancel.reason() {
            return Err(Error::Cancelled(reason));
        }

        let mut easy = Easy::new();
        self.configure(&mut easy, request)?;

        let mut header_lines: Vec<String> = Vec::new();
        let mut data: Vec<u8> = Vec::new();
        // Shared by the read and seek callbacks; libcurl calls them in turn.
        let upload = request
            .body_mut()
            .map(|body| RefCell::new(Upload { body, error: None }));

        let result = {
            let mut transfer = easy.transfer();
            if let Some(upload) = &upload {
                transfer.read_function(move |buf| upload.borrow_mut().read(buf))?;
                transfer.seek_function(move |pos| upload.borrow_mut().seek(pos))?;
            }
            transfer.header_function(|line| {
                let line = String::from_utf8_lossy(line);
                let line = line.trim_end();
                if line.starts_with("HTTP/") {
                    // New status line (redirect or 100-continue): start over.
                    header_lines.clear();
                } else if !line.is_empty() {
                    header_lines.push(line.to_string());
                }
                true
            })?;
            transfer.write_function(|chunk| {
                data.extend_from_slice(chunk);
                Ok(chunk.len())
            })?;
            transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
            transfer.perform()
        };
        let body_error = upload.and_then(|u| u.into_inner().error);

        if let Err(e) = result {
            if let Some(reason) = cancel.reason() {
                return Err(Error::Cancelled(reason));
            }
            if let Some(be) = body_error {
                return Err(Error::Body(be));
            }
            return Err(e.into());
        }

        let code = easy.response_code()?;
        let status = u16::try_from(code)
            .ok()
            .and_then(|c| StatusCode::from_u16(c).ok())
            .ok_or_else(|| Error::other(format!("invalid HTTP status {code}")))?;

        let mut resp = Response::with_body(status, data);
        parse_header_lines(&header_lines, resp.headers_mut());
        tracing::trace!(
            "{} {} -> {}",
            request.method(),
            request.url(),
            resp.status()
        );
        Ok(resp)
    }
}

/// Request body as seen by the libcurl callbacks.
struct Upload<'a> {
    body: &'a mut Body,
    error: Option<io::Error>,
}

impl Upload<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        self.body.read(buf).map_err(|e| {
            self.error = Some(e);
            ReadError::Abort
        })
    }

    /// libcurl seeks back to the start to resend the body, e.g. after a
    /// 307/308 redirect. Buffered bodies rewind and factory bodies are
    /// regenerated; a plain stream cannot go back.
    fn seek(&mut self, pos: SeekFrom) -> SeekResult {
        if pos != SeekFrom::Start(0) {
            return SeekResult::CantSeek;
        }
        match self.body.prepare(false) {
            Ok(true) => SeekResult::Ok,
            Ok(false) => SeekResult::CantSeek,
            Err(e) => {
                self.error = Some(e);
                SeekResult::Fail
            }
        }
    }
}

/// Parse collected `Name: value` lines into a header map, skipping invalid ones.
fn parse_header_lines(lines: &[String], headers: &mut HeaderMap) {
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = HeaderName::from_bytes(name.trim().as_bytes());
        let value = HeaderValue::from_str(value.trim());
        if let (Ok(name), Ok(value)) = (name, value) {
            headers.append(name, value);
        }
    }
}

impl From<curl::Error> for Error {
    fn from(e: curl::Error) -> Self {
        match classify_curl_error(&e) {
            ErrorKind::InvalidRequest => Error::InvalidRequest(e.to_string()),
            ErrorKind::UnsupportedScheme => Error::UnsupportedScheme(e.to_string()),
            ErrorKind::Certificate => Error::Certificate(e.to_string()),
            ErrorKind::Timeout => Error::Timeout,
            ErrorKind::Body => Error::Body(io::Error::other(e)),
            _ => Error::Curl(e),
        }
    }
}
