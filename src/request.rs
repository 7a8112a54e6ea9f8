//! HTTP request and response values passed through transports.

use crate::body::Body;
use crate::cancel::CancelToken;
use crate::error::Error;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::io::{self, Read};
use url::Url;

/// An outgoing HTTP request.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    cancel: CancelToken,
}

impl Request {
    /// Request without headers or body, with a token that never fires.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            cancel: CancelToken::new(),
        }
    }

    /// Build a request from a URL string; a parse failure is `Error::InvalidRequest`.
    pub fn parse(method: Method, url: &str) -> Result<Self, Error> {
        Ok(Self::new(method, Url::parse(url)?))
    }

    /// `GET` request for `url`.
    pub fn get(url: &str) -> Result<Self, Error> {
        Self::parse(Method::GET, url)
    }

    /// `POST` request for `url` carrying `body`.
    pub fn post(url: &str, body: impl Into<Body>) -> Result<Self, Error> {
        Ok(Self::parse(Method::POST, url)?.with_body(body))
    }

    /// Add a header, validating name and value.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidRequest(e.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::InvalidRequest(e.to_string()))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Set the request body, replacing any previous one.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Attach a cancellation token. Clones of it can cancel the request.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers, sent as is by the transport.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The body, if any. Its read position moves as attempts consume it.
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Mutable body access; transports read the upload from here.
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut()
    }

    /// Remove and return the body.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// The token that cancels this request.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

/// Response to one exchange. Dropping it releases the underlying body.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Box<dyn Read + Send>,
}

impl Response {
    /// Response with an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self::with_body(status, Vec::new())
    }

    /// Response with an in-memory body.
    pub fn with_body(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(status, io::Cursor::new(body.into()))
    }

    /// Response whose body is read from `body` on demand.
    pub fn from_reader(status: StatusCode, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Box::new(body),
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers. Repeated headers keep every value.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Reader over the unread part of the body.
    pub fn body_mut(&mut self) -> &mut (dyn Read + Send) {
        &mut *self.body
    }

    /// Take the body reader, dropping status and headers.
    pub fn into_body(self) -> Box<dyn Read + Send> {
        self.body
    }

    /// Read the remaining body into memory.
    pub fn bytes(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.body.read_to_end(&mut out)?;
        Ok(out)
    }

    /// Read the remaining body as UTF-8 (lossy).
    pub fn text(self) -> io::Result<String> {
        let bytes = self.bytes()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Discard up to `max_bytes` of the unread body, then drop it.
    ///
    /// Reading the remainder lets a pooled connection be reused; the bound
    /// keeps a slow or huge body from stalling the retry loop.
    pub fn drain_and_close(mut self, max_bytes: u64) {
        let mut limited = (&mut self.body).take(max_bytes);
        if let Err(e) = io::copy(&mut limited, &mut io::sink()) {
            tracing::debug!("discarding response body failed: {}", e);
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn parse_rejects_bad_url() {
        let err = Request::get("::not a url::").unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn header_validation() {
        let req = Request::get("http://example.com/")
            .unwrap()
            .header("x-trace", "abc")
            .unwrap();
        assert_eq!(req.headers().get("x-trace").unwrap(), "abc");
        let err = Request::get("http://example.com/")
            .unwrap()
            .header("bad header", "v")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn post_carries_body() {
        let req = Request::post("http://example.com/items", "payload").unwrap();
        assert_eq!(*req.method(), Method::POST);
        assert_eq!(req.body().and_then(Body::len), Some(7));
    }

    /// Endless reader that counts bytes handed out.
    struct Endless(Arc<AtomicUsize>);

    impl Read for Endless {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.fetch_add(buf.len(), Ordering::SeqCst);
            buf.fill(b'x');
            Ok(buf.len())
        }
    }

    #[test]
    fn drain_is_bounded() {
        let served = Arc::new(AtomicUsize::new(0));
        let resp = Response::from_reader(StatusCode::OK, Endless(Arc::clone(&served)));
        resp.drain_and_close(16 * 1024);
        assert_eq!(served.load(Ordering::SeqCst), 16 * 1024);
    }

    #[test]
    fn text_reads_body() {
        let resp = Response::with_body(StatusCode::OK, "OK");
        assert_eq!(resp.text().unwrap(), "OK");
    }
}
