//! Request bodies and the replay buffer.
//!
//! A body is normally a single-use stream. Before each attempt the retry loop
//! calls [`Body::prepare`], which either regenerates the stream from the
//! body's factory or, the first time, reads the stream fully into memory and
//! from then on rewinds that buffer. Large uploads that must not be buffered
//! should be built with [`Body::replayable`].

use std::fmt;
use std::io::{self, Cursor, Read};
use std::sync::Arc;

type BoxReader = Box<dyn Read + Send>;

/// Produces a fresh reader over the same body content on every call.
pub type BodyFactory = Arc<dyn Fn() -> io::Result<BoxReader> + Send + Sync>;

enum Source {
    /// Factory body that has not produced a reader yet.
    Pending,
    Stream(BoxReader),
    Buffered(Cursor<Vec<u8>>),
}

/// Request body.
pub struct Body {
    source: Source,
    factory: Option<BodyFactory>,
    len: Option<u64>,
}

impl Body {
    /// In-memory body. Already replayable; no extra copy is made on retry.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let data = bytes.into();
        Self {
            len: Some(data.len() as u64),
            source: Source::Buffered(Cursor::new(data)),
            factory: None,
        }
    }

    /// Single-use stream of unknown length.
    pub fn from_reader(reader: impl Read + Send + 'static) -> Self {
        Self {
            source: Source::Stream(Box::new(reader)),
            factory: None,
            len: None,
        }
    }

    /// Single-use stream with a known length.
    pub fn from_sized_reader(reader: impl Read + Send + 'static, len: u64) -> Self {
        Self {
            len: Some(len),
            ..Self::from_reader(reader)
        }
    }

    /// Body regenerated from `factory` before every attempt, never buffered.
    pub fn replayable<F, R>(len: Option<u64>, factory: F) -> Self
    where
        F: Fn() -> io::Result<R> + Send + Sync + 'static,
        R: Read + Send + 'static,
    {
        let factory: BodyFactory = Arc::new(move || factory().map(|r| Box::new(r) as BoxReader));
        Self {
            source: Source::Pending,
            factory: Some(factory),
            len,
        }
    }

    /// Length in bytes, when known.
    pub fn len(&self) -> Option<u64> {
        self.len
    }

    /// True only for a body known to be zero bytes long.
    pub fn is_empty(&self) -> bool {
        self.len == Some(0)
    }

    /// True if the body can be sent again without buffering a stream.
    pub fn is_replayable(&self) -> bool {
        self.factory.is_some() || self.is_buffered()
    }

    /// True once the body is held in memory.
    pub fn is_buffered(&self) -> bool {
        matches!(self.source, Source::Buffered(_))
    }

    /// Get the body ready for the next attempt.
    ///
    /// Factory bodies get a fresh reader, buffered bodies are rewound. A plain
    /// stream is read into memory on first use when `buffer` is set and the
    /// original reader is dropped; without `buffer` it is left as is and
    /// `Ok(false)` reports that it cannot be sent a second time.
    pub fn prepare(&mut self, buffer: bool) -> io::Result<bool> {
        if let Some(factory) = &self.factory {
            self.source = Source::Stream(factory()?);
            return Ok(true);
        }
        match self.source {
            Source::Buffered(_) => {
                self.rewind();
                Ok(true)
            }
            Source::Stream(_) if buffer => {
                self.buffer()?;
                Ok(true)
            }
            Source::Stream(_) | Source::Pending => Ok(false),
        }
    }

    /// Read a streamed body fully into memory. No-op for other bodies.
    pub fn buffer(&mut self) -> io::Result<()> {
        match std::mem::replace(&mut self.source, Source::Pending) {
            Source::Stream(mut reader) => {
                let mut data = Vec::new();
                let read = reader.read_to_end(&mut data);
                drop(reader);
                read?;
                tracing::trace!("request body buffered for replay ({} bytes)", data.len());
                self.len = Some(data.len() as u64);
                self.source = Source::Buffered(Cursor::new(data));
            }
            other => self.source = other,
        }
        Ok(())
    }

    /// Seek a buffered body back to its first byte.
    pub fn rewind(&mut self) {
        if let Source::Buffered(cursor) = &mut self.source {
            cursor.set_position(0);
        }
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if matches!(self.source, Source::Pending) {
            self.source = match &self.factory {
                Some(factory) => Source::Stream(factory()?),
                None => return Ok(0),
            };
        }
        match &mut self.source {
            Source::Stream(reader) => reader.read(buf),
            Source::Buffered(cursor) => cursor.read(buf),
            Source::Pending => Ok(0),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Pending => "pending",
            Source::Stream(_) => "stream",
            Source::Buffered(_) => "buffered",
        };
        f.debug_struct("Body")
            .field("kind", &kind)
            .field("len", &self.len)
            .field("replayable", &self.is_replayable())
            .finish()
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::from_bytes(v)
    }
}

impl From<&[u8]> for Body {
    fn from(v: &[u8]) -> Self {
        Body::from_bytes(v.to_vec())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::from_bytes(s.into_bytes())
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::from_bytes(s.as_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn read_all(body: &mut Body) -> Vec<u8> {
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        out
    }

    /// Reader that counts calls to `read`.
    struct OnceReader {
        data: Cursor<Vec<u8>>,
        reads: Arc<AtomicUsize>,
    }

    impl Read for OnceReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.data.read(buf)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "upstream closed"))
        }
    }

    #[test]
    fn buffered_rewind_reproduces_bytes_every_time() {
        let mut body = Body::from_reader(Cursor::new(b"payload".to_vec()));
        for n in 0..10 {
            assert!(body.prepare(true).unwrap(), "attempt {n}");
            assert_eq!(read_all(&mut body), b"payload");
        }
        assert!(body.is_buffered());
        assert_eq!(body.len(), Some(7));
    }

    #[test]
    fn stream_is_read_only_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut body = Body::from_reader(OnceReader {
            data: Cursor::new(b"abc".to_vec()),
            reads: Arc::clone(&reads),
        });
        body.prepare(true).unwrap();
        let after_first = reads.load(Ordering::SeqCst);
        read_all(&mut body);
        body.prepare(true).unwrap();
        read_all(&mut body);
        assert_eq!(reads.load(Ordering::SeqCst), after_first);
    }

    #[test]
    fn factory_is_called_for_every_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let mut body = Body::replayable(Some(4), move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Cursor::new(b"data".to_vec()))
        });
        for _ in 0..3 {
            assert!(body.prepare(true).unwrap());
            assert_eq!(read_all(&mut body), b"data");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!body.is_buffered());
    }

    #[test]
    fn factory_body_reads_without_prepare() {
        let mut body = Body::replayable(None, || Ok(Cursor::new(b"lazy".to_vec())));
        assert_eq!(read_all(&mut body), b"lazy");
    }

    #[test]
    fn stream_without_buffering_is_not_replayable() {
        let mut body = Body::from_reader(Cursor::new(b"x".to_vec()));
        assert!(!body.prepare(false).unwrap());
        assert!(!body.is_buffered());
        assert_eq!(read_all(&mut body), b"x");
    }

    #[test]
    fn buffer_error_is_returned() {
        let mut body = Body::from_reader(FailingReader);
        let err = body.prepare(true).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn bytes_body_is_replayable_up_front() {
        let body = Body::from("hello");
        assert!(body.is_replayable());
        assert_eq!(body.len(), Some(5));
        assert!(!Body::from_reader(io::empty()).is_replayable());
    }
}
