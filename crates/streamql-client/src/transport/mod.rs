//! Request transport to the engine.
//!
//! - `Transport` trait: sends one envelope and returns the response status
//!   and its body as a byte stream
//! - `HttpTransport`: HTTP over `reqwest` for production use
//! - `MemoryTransport`: scripted in-process responses for testing

mod http;
mod memory;

pub use http::HttpTransport;
pub use memory::{MemoryTransport, ScriptedResponse};

pub use crate::protocol::Envelope;

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;

use crate::error::ClientResult;

/// Response body as it arrives.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Status and body of one response.
pub struct TransportResponse {
    /// HTTP status code.
    pub status: u16,
    /// Body chunks.
    pub body: BodyStream,
}

impl TransportResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// Future returned by [`Transport::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = ClientResult<TransportResponse>> + Send + 'a>>;

/// Sends requests to one engine endpoint.
///
/// Every call is an independent request; nothing is shared between two
/// sends.
pub trait Transport: Send + Sync + fmt::Debug {
    /// Posts `envelope` to `path` and returns once the response head arrives.
    fn send<'a>(&'a self, path: &'a str, envelope: &'a Envelope) -> SendFuture<'a>;

    /// Where requests go, for logging.
    fn endpoint(&self) -> String;
}
