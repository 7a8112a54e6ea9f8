//! HTTP/1.1 server that answers `/start` with a redirect to `/next`.
//!
//! `/next` answers 200 with body `ok`. Every request is recorded as
//! (method, path, body).

use super::flaky_server::read_request;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub type Seen = Vec<(String, String, Vec<u8>)>;

pub struct RedirectServer {
    /// URL of the redirecting path.
    pub url: String,
    seen: Arc<Mutex<Seen>>,
}

impl RedirectServer {
    pub fn seen(&self) -> Seen {
        self.seen.lock().unwrap().clone()
    }
}

/// Starts the server; `/start` replies with `status` (e.g. 307 or 308).
pub fn start(status: u16) -> RedirectServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            handle(stream, &s, status);
        }
    });
    RedirectServer {
        url: format!("http://127.0.0.1:{}/start", port),
        seen,
    }
}

fn handle(mut stream: TcpStream, seen: &Mutex<Seen>, status: u16) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };
    let mut parts = head.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();
    seen.lock().unwrap().push((method, path.clone(), body));

    let reply = if path == "/start" {
        format!(
            "HTTP/1.1 {} Redirect\r\nLocation: /next\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            status
        )
    } else {
        "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok".to_string()
    };
    let _ = stream.write_all(reply.as_bytes());
}
