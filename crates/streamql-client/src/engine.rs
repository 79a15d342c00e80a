//! Network execution engine.
//!
//! Every dispatch is its own request: it sends one statement and reads the
//! response under the engine's requests-in-flight budget.
//!
//! - *Single* consumption buffers the whole body and releases its slot.
//!   When the budget is saturated it waits behind the admission lock.
//! - *Streaming* consumption holds its slot while the body is read line
//!   by line. It is rejected outright when the budget is saturated.
//!
//! While a stream is read, an empty line seen with the budget saturated
//! aborts the read. The stream gives up its slot, waits for a new one
//! under the admission lock and is dispatched again, at most
//! `max_rebalance_retries` times.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use streamql_common::{
    ClientConfig, FINAL_MESSAGE_MARKER, MAX_LINE_LENGTH, MAX_RESPONSE_BODY_SIZE,
};

use crate::budget::{Budget, Permit};
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::protocol::{self, Envelope, LineReader};
use crate::transport::{Transport, TransportResponse};

const CHUNK_CHANNEL_CAPACITY: usize = 64;

/// How a response is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// One request, one fully buffered response.
    Single,
    /// One request holding its slot for a continuous read.
    Streaming,
}

impl fmt::Display for Consumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumption::Single => write!(f, "single"),
            Consumption::Streaming => write!(f, "streaming"),
        }
    }
}

/// Statistics about engine usage.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    /// Single-response requests completed successfully.
    pub statements_executed: u64,
    /// Streams opened, counting re-dispatches.
    pub streams_opened: u64,
    /// Rebalances detected while reading streams.
    pub rebalances: u64,
    /// Streaming requests rejected at the budget ceiling.
    pub rejected_streams: u64,
    /// Rows dropped because they could not be decoded.
    pub decode_failures: u64,
    /// Highest number of requests in flight at once.
    pub peak_in_flight: usize,
    /// Total time spent in single-response requests.
    pub total_request_time_ms: u64,
}

/// Payload chunks of a streaming dispatch, in the order received.
///
/// The stream ends after the engine's final message, when the connection
/// closes, or when the dispatch context is cancelled. Dropping it stops
/// the read and returns the budget slot.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<ClientResult<Bytes>>,
}

impl ChunkStream {
    /// Waits for the next chunk.
    pub async fn next(&mut self) -> Option<ClientResult<Bytes>> {
        self.rx.recv().await
    }

    /// Stops the read; chunks already buffered are still returned.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

/// Response of [`Engine::execute`], shaped by its consumption.
#[derive(Debug)]
pub enum Response {
    /// Fully buffered body of a single-response request.
    Body(Bytes),
    /// Payload chunks of a streaming request.
    Stream(ChunkStream),
}

/// Dispatches statements to one engine endpoint.
#[derive(Clone)]
pub struct Engine {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    budget: Arc<Budget>,
    stats: Arc<RwLock<ClientStats>>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("transport", &self.transport)
            .field("in_flight", &self.budget.in_flight())
            .field("max_in_flight", &self.budget.max())
            .finish()
    }
}

impl Engine {
    /// Creates an engine sending requests through `transport`.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            budget: Budget::new(config.max_in_flight),
            config: Arc::new(config),
            transport,
            stats: Arc::new(RwLock::new(ClientStats::default())),
        }
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.budget.in_flight()
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> ClientStats {
        let mut stats = self.stats.read().clone();
        stats.peak_in_flight = self.budget.peak();
        stats
    }

    pub(crate) fn record_decode_failure(&self) {
        self.stats.write().decode_failures += 1;
    }

    /// Sends `statement` to `path`, consuming the response as requested.
    pub async fn execute(
        &self,
        ctx: &Context,
        consumption: Consumption,
        path: &str,
        statement: &str,
    ) -> ClientResult<Response> {
        match consumption {
            Consumption::Single => self.dispatch(ctx, path, statement).await.map(Response::Body),
            Consumption::Streaming => self
                .dispatch_streaming(ctx, path, statement)
                .await
                .map(Response::Stream),
        }
    }

    /// Sends `statement` to `path` and returns the buffered response body.
    pub async fn dispatch(&self, ctx: &Context, path: &str, statement: &str) -> ClientResult<Bytes> {
        let started = std::time::Instant::now();
        let deadline = ctx.deadline_or(self.config.request_timeout);

        let permit = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!("Single request to {} cancelled before admission", path);
                return Err(ClientError::Cancelled);
            }
            _ = tokio::time::sleep_until(deadline) => return Err(ClientError::deadline_exceeded()),
            permit = self.budget.acquire() => permit,
        };
        debug!(
            "Dispatching {} request to {} ({}/{} in flight)",
            Consumption::Single,
            path,
            self.budget.in_flight(),
            self.budget.max()
        );

        let result = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                debug!("Single request to {} cancelled", path);
                Err(ClientError::Cancelled)
            }
            res = tokio::time::timeout_at(deadline, self.round_trip(path, statement)) => {
                res.unwrap_or_else(|_| Err(ClientError::deadline_exceeded()))
            }
        };
        drop(permit);

        let elapsed = started.elapsed();
        if result.is_ok() {
            let mut stats = self.stats.write();
            stats.statements_executed += 1;
            stats.total_request_time_ms += elapsed.as_millis() as u64;
        }
        debug!("Single request to {} finished in {:?}", path, elapsed);
        result
    }

    /// Sends `statement` to `path` and returns its payload lines as they
    /// arrive.
    ///
    /// Fails with [`ClientError::TooManyRequests`] when the budget is
    /// saturated. Dial and status errors of the first dispatch are returned
    /// here; later errors arrive through the stream.
    pub async fn dispatch_streaming(
        &self,
        ctx: &Context,
        path: &str,
        statement: &str,
    ) -> ClientResult<ChunkStream> {
        if ctx.is_cancelled() {
            return Err(ClientError::Cancelled);
        }
        let Some(permit) = self.budget.try_acquire() else {
            self.stats.write().rejected_streams += 1;
            warn!(
                "Rejecting streaming request to {}: {}/{} in flight",
                path,
                self.budget.in_flight(),
                self.budget.max()
            );
            return Err(ClientError::TooManyRequests);
        };
        debug!(
            "Dispatching {} request to {} ({}/{} in flight)",
            Consumption::Streaming,
            path,
            self.budget.in_flight(),
            self.budget.max()
        );

        let lines = self.open_stream_within(ctx, path, statement).await?;
        let (tx, rx) = mpsc::channel(CHUNK_CHANNEL_CAPACITY);
        let pump = StreamPump {
            engine: self.clone(),
            ctx: ctx.clone(),
            path: path.to_string(),
            statement: statement.to_string(),
            tx,
        };
        tokio::spawn(pump.run(permit, lines));
        Ok(ChunkStream { rx })
    }

    /// Opens a stream, bounding dial and response head by the context
    /// deadline or the default request timeout.
    async fn open_stream_within(
        &self,
        ctx: &Context,
        path: &str,
        statement: &str,
    ) -> ClientResult<LineReader> {
        let deadline = ctx.deadline_or(self.config.request_timeout);
        let lines = tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ClientError::Cancelled),
            res = tokio::time::timeout_at(deadline, self.open_stream(path, statement)) => {
                res.unwrap_or_else(|_| Err(ClientError::deadline_exceeded()))
            }
        }?;
        self.stats.write().streams_opened += 1;
        Ok(lines)
    }

    async fn open_stream(&self, path: &str, statement: &str) -> ClientResult<LineReader> {
        let mut response = self.send(path, statement).await?;
        if !response.is_success() {
            let bytes = protocol::read_to_end(&mut response.body, MAX_RESPONSE_BODY_SIZE).await?;
            return Err(bad_status(response.status, &bytes));
        }
        Ok(LineReader::new(response.body, MAX_LINE_LENGTH))
    }

    async fn round_trip(&self, path: &str, statement: &str) -> ClientResult<Bytes> {
        let mut response = self.send(path, statement).await?;
        let bytes = protocol::read_to_end(&mut response.body, MAX_RESPONSE_BODY_SIZE).await?;
        if !response.is_success() {
            return Err(bad_status(response.status, &bytes));
        }
        Ok(bytes)
    }

    async fn send(&self, path: &str, statement: &str) -> ClientResult<TransportResponse> {
        let envelope = Envelope::new(statement, &self.config.streams_properties);
        let response = self.transport.send(path, &envelope).await?;
        debug!("Response {} from {}", response.status, path);
        Ok(response)
    }

    fn rebalance_backoff(&self) -> Duration {
        self.config.rebalance_backoff
    }
}

fn bad_status(status: u16, body: &[u8]) -> ClientError {
    ClientError::BadStatus {
        status,
        message: protocol::error_message(body),
    }
}

/// Background task feeding one [`ChunkStream`].
struct StreamPump {
    engine: Engine,
    ctx: Context,
    path: String,
    statement: String,
    tx: mpsc::Sender<ClientResult<Bytes>>,
}

impl StreamPump {
    async fn run(self, mut permit: Permit, mut lines: LineReader) {
        let mut attempts: u32 = 1;
        loop {
            let outcome = tokio::select! {
                biased;
                _ = self.ctx.cancelled() => {
                    debug!("Stream from {} cancelled", self.path);
                    return;
                }
                _ = self.tx.closed() => {
                    debug!("Stream consumer for {} went away", self.path);
                    return;
                }
                _ = self.ctx.expired() => Err(ClientError::deadline_exceeded()),
                res = self.forward(&mut lines) => res,
            };
            match outcome {
                Ok(()) => {
                    debug!("Stream from {} completed", self.path);
                    return;
                }
                Err(ClientError::Rebalance) => {
                    self.engine.stats.write().rebalances += 1;
                    if attempts > self.engine.config.max_rebalance_retries {
                        warn!(
                            "Stream from {} rebalanced {} times, giving up",
                            self.path, attempts
                        );
                        let _ = self
                            .tx
                            .send(Err(ClientError::RebalanceExhausted { attempts }))
                            .await;
                        return;
                    }
                    info!(
                        "Rebalancing stream from {} (attempt {})",
                        self.path,
                        attempts + 1
                    );
                    drop(lines);
                    drop(permit);
                    match self.redispatch().await {
                        Some(Ok((next_permit, next_lines))) => {
                            permit = next_permit;
                            lines = next_lines;
                            attempts += 1;
                        }
                        Some(Err(e)) => {
                            let _ = self.tx.send(Err(e)).await;
                            return;
                        }
                        None => return,
                    }
                }
                Err(e) => {
                    let _ = self.tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }

    /// Forwards payload lines until the final message or end of body.
    async fn forward(&self, lines: &mut LineReader) -> ClientResult<()> {
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                if self.engine.budget.is_saturated() {
                    debug!(
                        "Budget saturated ({}/{}) while streaming from {}",
                        self.engine.budget.in_flight(),
                        self.engine.budget.max(),
                        self.path
                    );
                    return Err(ClientError::Rebalance);
                }
                continue;
            }
            if line.contains(FINAL_MESSAGE_MARKER) {
                debug!("Final message from {}: {}", self.path, line);
                return Ok(());
            }
            if self.tx.send(Ok(Bytes::from(line))).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }

    /// Waits out the backoff, takes a new slot and dispatches again.
    ///
    /// Returns `None` when the context is cancelled or the consumer left.
    async fn redispatch(&self) -> Option<ClientResult<(Permit, LineReader)>> {
        let admitted = tokio::select! {
            biased;
            _ = self.ctx.cancelled() => return None,
            _ = self.tx.closed() => return None,
            _ = self.ctx.expired() => return Some(Err(ClientError::deadline_exceeded())),
            permit = async {
                tokio::time::sleep(self.engine.rebalance_backoff()).await;
                self.engine.budget.reacquire().await
            } => permit,
        };
        let opened = tokio::select! {
            biased;
            _ = self.tx.closed() => return None,
            res = self.engine.open_stream_within(&self.ctx, &self.path, &self.statement) => res,
        };
        match opened {
            Ok(lines) => Some(Ok((admitted, lines))),
            Err(ClientError::Cancelled) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
