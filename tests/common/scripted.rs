//! In-process transport that plays back a fixed script of outcomes.

use httpretry::{Error, Request, Response, Transport};
use http::StatusCode;
use std::io::Read;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Respond with this status and body `attempt N`.
    Respond(u16),
    /// Fail with an unclassified transport error.
    Fail,
    /// Fail with an unsupported-scheme error.
    BadScheme,
}

/// Plays `steps` in order; the last step repeats once the script runs out.
pub struct Scripted {
    steps: Vec<Step>,
    calls: AtomicUsize,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl Scripted {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps,
            calls: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn round_trip(&self, request: &mut Request) -> Result<Response, Error> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let mut sent = Vec::new();
        if let Some(body) = request.body_mut() {
            body.read_to_end(&mut sent).map_err(Error::Body)?;
        }
        self.bodies.lock().unwrap().push(sent);

        let step = self.steps.get(n).or(self.steps.last()).copied();
        match step {
            Some(Step::Respond(code)) => Ok(Response::with_body(
                StatusCode::from_u16(code).unwrap(),
                format!("attempt {}", n + 1),
            )),
            Some(Step::Fail) => Err(Error::other(format!("connection reset (attempt {})", n + 1))),
            Some(Step::BadScheme) => Err(Error::UnsupportedScheme("gopher".into())),
            None => Ok(Response::new(StatusCode::OK)),
        }
    }
}
