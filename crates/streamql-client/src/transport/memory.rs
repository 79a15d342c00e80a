//! In-process transport serving scripted responses.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use super::{BodyStream, Envelope, SendFuture, Transport, TransportResponse};
use crate::error::ClientError;

/// One scripted response.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    status: u16,
    parts: Vec<Bytes>,
    delay: Duration,
    hold_open: bool,
}

impl ScriptedResponse {
    /// A response with a single body part.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self::parts(status, [body.into()])
    }

    /// A 200 response sending one part per line, each with its newline.
    pub fn streaming<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts = lines.into_iter().map(|line| {
            let mut line = line.into();
            line.push('\n');
            Bytes::from(line)
        });
        Self::parts(200, parts)
    }

    /// A response sending `parts` exactly as given.
    pub fn parts(status: u16, parts: impl IntoIterator<Item = Bytes>) -> Self {
        Self {
            status,
            parts: parts.into_iter().collect(),
            delay: Duration::ZERO,
            hold_open: false,
        }
    }

    /// Waits `delay` before each body part.
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keeps the body open after the last part instead of ending it.
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    fn into_response(self) -> TransportResponse {
        let delay = self.delay;
        let parts = stream::iter(self.parts).then(move |part| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, io::Error>(part)
        });
        let body: BodyStream = if self.hold_open {
            Box::pin(parts.chain(stream::pending()))
        } else {
            Box::pin(parts)
        };
        TransportResponse {
            status: self.status,
            body,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<ScriptedResponse>,
    fallback: Option<ScriptedResponse>,
}

/// Serves scripted responses without touching the network.
///
/// Each send takes the next queued response, or the fallback once the
/// queue is empty; with neither, the send fails as a refused connection.
/// Request bodies are recorded for inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<String>>>,
    sends: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// Creates a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the next send.
    pub fn push(&self, response: ScriptedResponse) -> &Self {
        self.script.lock().queue.push_back(response);
        self
    }

    /// Serves `response` whenever the queue is empty.
    pub fn fallback(&self, response: ScriptedResponse) -> &Self {
        self.script.lock().fallback = Some(response);
        self
    }

    /// JSON bodies of the requests received so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    /// Number of sends attempted.
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> Option<ScriptedResponse> {
        let mut script = self.script.lock();
        script.queue.pop_front().or_else(|| script.fallback.clone())
    }
}

impl Transport for MemoryTransport {
    fn send<'a>(&'a self, _path: &'a str, envelope: &'a Envelope) -> SendFuture<'a> {
        Box::pin(async move {
            self.sends.fetch_add(1, Ordering::SeqCst);
            let response = self.next_response().ok_or_else(|| {
                ClientError::CannotDial(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "no scripted response",
                ))
            })?;
            self.requests.lock().push(serde_json::to_string(envelope)?);
            Ok(response.into_response())
        })
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}
