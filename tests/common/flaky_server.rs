//! Minimal HTTP/1.1 server that fails a fixed number of requests first.
//!
//! The first `failures` requests get `fail_status`; later ones get 200 with
//! body `ok`. Every request body is recorded so tests can check what was
//! replayed. Each response carries `X-Attempt: n` and closes the connection.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub struct FlakyServer {
    /// Base URL, e.g. "http://127.0.0.1:12345/".
    pub url: String,
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FlakyServer {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

/// Starts the server in a background thread. It runs until the process exits.
pub fn start(failures: usize, fail_status: u16) -> FlakyServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let hits = Arc::new(AtomicUsize::new(0));
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let (h, b) = (Arc::clone(&hits), Arc::clone(&bodies));
    thread::spawn(move || {
        // One connection at a time keeps the attempt numbering deterministic.
        for stream in listener.incoming().flatten() {
            handle(stream, &h, &b, failures, fail_status);
        }
    });
    FlakyServer {
        url: format!("http://127.0.0.1:{}/", port),
        hits,
        bodies,
    }
}

fn handle(
    mut stream: TcpStream,
    hits: &AtomicUsize,
    bodies: &Mutex<Vec<Vec<u8>>>,
    failures: usize,
    fail_status: u16,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some((_head, body)) = read_request(&mut stream) else {
        return;
    };
    bodies.lock().unwrap().push(body);
    let attempt = hits.fetch_add(1, Ordering::SeqCst) + 1;

    let (status, reply): (String, &[u8]) = if attempt <= failures {
        (format!("{} Failed", fail_status), b"fail")
    } else {
        ("200 OK".to_string(), b"ok")
    };
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nX-Attempt: {}\r\nConnection: close\r\n\r\n",
        status,
        reply.len(),
        attempt
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(reply);
}

/// Reads one request and returns its head and body (sized by `Content-Length`).
pub fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let len = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buf.len() < header_end + len {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (header_end + len).min(buf.len());
    Some((head, buf[header_end..end].to_vec()))
}
