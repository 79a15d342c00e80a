//! Client facade over the engine, the schema registry and the decoder.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use streamql_common::{ClientConfig, RelationKind, QUERY_ENDPOINT, STATEMENT_ENDPOINT};
use streamql_query::expr::{Expr, Expression};
use streamql_query::schema::{
    remote_fields_representation, Linter, Record, RelationSchema, SchemaRegistry,
    SourceDescription,
};
use streamql_query::statement::{select, Create, Describe, List, Select, Terminate};
use streamql_query::Statement;

use crate::context::Context;
use crate::decode::{RowDecoder, StreamMessage};
use crate::engine::{ChunkStream, ClientStats, Consumption, Engine, Response};
use crate::error::{ClientError, ClientResult};
use crate::transport::{HttpTransport, Transport};

/// Client for one engine endpoint.
///
/// Cheap to clone; clones share the engine budget, statistics and schema
/// registry.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    engine: Engine,
    linter: Linter,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.config.endpoint())
            .field("engine", &self.engine)
            .field("relations", &self.registry().relations())
            .finish()
    }
}

impl Client {
    /// Creates a client sending requests over HTTP to the configured
    /// endpoint.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Creates a client sending requests through `transport`.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> ClientResult<Self> {
        config.validate()?;
        debug!("Creating client for {}", transport.endpoint());
        Ok(Self {
            engine: Engine::new(config.clone(), transport),
            config: Arc::new(config),
            linter: Linter::new(SchemaRegistry::new()),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the schema registry shared by this client.
    pub fn registry(&self) -> &SchemaRegistry {
        self.linter.registry()
    }

    /// Returns the underlying engine.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns the client statistics.
    pub fn stats(&self) -> ClientStats {
        self.engine.stats()
    }

    /// Starts a SELECT whose joins are validated against this client's
    /// registry.
    pub fn select<I, E>(&self, fields: I) -> Select
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        select(fields).with_registry(self.registry().clone())
    }

    /// Starts a `CREATE` whose source kind is resolved against this
    /// client's registry.
    pub fn create(&self, kind: RelationKind, name: impl Into<String>) -> Create {
        Create::new(kind, name).with_registry(self.registry().clone())
    }

    /// Sends a statement, streaming the response of push queries.
    pub async fn dispatch(
        &self,
        ctx: &Context,
        statement: impl Into<Statement>,
    ) -> ClientResult<Response> {
        let statement = statement.into();
        let sql = statement.to_sql()?;
        let consumption = if statement.is_push() {
            Consumption::Streaming
        } else {
            Consumption::Single
        };
        debug!("Executing {} as {}", statement.name(), consumption);
        self.engine
            .execute(ctx, consumption, statement.endpoint(), &sql)
            .await
    }

    /// Sends a statement and returns the parsed response.
    ///
    /// The whole response is buffered, so a push query only completes here
    /// when it carries a LIMIT.
    pub async fn execute(
        &self,
        ctx: &Context,
        statement: impl Into<Statement>,
    ) -> ClientResult<serde_json::Value> {
        let statement = statement.into();
        let sql = statement.to_sql()?;
        debug!("Executing {}", statement.name());
        let body = self.engine.dispatch(ctx, statement.endpoint(), &sql).await?;
        if body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Describes `relation` and stores the result in the registry.
    pub async fn describe(&self, ctx: &Context, relation: &str) -> ClientResult<RelationSchema> {
        let sql = Describe::new(relation).to_sql()?;
        let body = self.engine.dispatch(ctx, STATEMENT_ENDPOINT, &sql).await?;
        let description = SourceDescription::from_response(&body)?;
        let schema = remote_fields_representation(relation, &description)?;
        self.registry().set(schema.clone());
        Ok(schema)
    }

    /// Checks `T` against the registered schema of `relation`.
    pub fn lint<T: Record>(&self, relation: &str) -> ClientResult<()> {
        Ok(self.linter.lint::<T>(relation)?)
    }

    /// Refreshes `relation` from the engine, then checks `T` against it.
    pub async fn lint_remote<T: Record>(&self, ctx: &Context, relation: &str) -> ClientResult<()> {
        self.describe(ctx, relation).await?;
        self.lint::<T>(relation)
    }

    /// Runs a LIST statement.
    pub async fn list(&self, ctx: &Context, list: List) -> ClientResult<serde_json::Value> {
        self.execute(ctx, list).await
    }

    /// Terminates a push query by the identifier from its header.
    pub async fn terminate(&self, ctx: &Context, query_id: &str) -> ClientResult<serde_json::Value> {
        self.execute(ctx, Terminate::query(query_id)).await
    }

    /// Runs a query to completion and decodes every row.
    ///
    /// Fails on the first row that cannot be decoded.
    pub async fn pull<T>(&self, ctx: &Context, query: Select) -> ClientResult<Vec<T>>
    where
        T: Record + DeserializeOwned,
    {
        let sql = query.to_sql()?;
        let body = self.engine.dispatch(ctx, QUERY_ENDPOINT, &sql).await?;

        let mut decoder: Option<RowDecoder<T>> = None;
        let mut rows = Vec::new();
        for message in StreamMessage::parse_body(&body)? {
            match message {
                StreamMessage::Header(header) => decoder = Some(RowDecoder::new(&header)?),
                StreamMessage::Row(values) => {
                    let decoder = decoder
                        .as_ref()
                        .ok_or_else(|| ClientError::Protocol("row before header".to_string()))?;
                    match decoder.decode(&values) {
                        Ok(row) => rows.push(row),
                        Err(e) => {
                            self.engine.record_decode_failure();
                            warn!("Dropping undecodable row: {}", e);
                            return Err(e);
                        }
                    }
                }
                StreamMessage::Final(reason) => {
                    debug!("Query finished: {}", reason);
                    break;
                }
                StreamMessage::Error(message) => return Err(in_band_error(message)),
            }
        }
        Ok(rows)
    }

    /// Starts a streaming query and decodes rows as they arrive.
    pub async fn push<T>(&self, ctx: &Context, query: Select) -> ClientResult<RowStream<T>>
    where
        T: Record + DeserializeOwned,
    {
        let sql = query.to_sql()?;
        let chunks = self
            .engine
            .dispatch_streaming(ctx, QUERY_ENDPOINT, &sql)
            .await?;
        Ok(RowStream {
            chunks,
            decoder: None,
            query_id: None,
            engine: self.engine.clone(),
        })
    }
}

fn in_band_error(message: String) -> ClientError {
    ClientError::Protocol(format!("query failed: {}", message))
}

/// Decoded rows of a streaming query.
///
/// A row that cannot be decoded is reported as an error and dropped; the
/// stream continues with the next row. A stream that was rebalanced is
/// restarted from its header, so rows may repeat.
pub struct RowStream<T> {
    chunks: ChunkStream,
    decoder: Option<RowDecoder<T>>,
    query_id: Option<String>,
    engine: Engine,
}

impl<T> fmt::Debug for RowStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowStream")
            .field("query_id", &self.query_id)
            .field("decoder", &self.decoder)
            .finish()
    }
}

impl<T: Record + DeserializeOwned> RowStream<T> {
    /// Identifier of the query, once its header has arrived.
    pub fn query_id(&self) -> Option<&str> {
        self.query_id.as_deref()
    }

    /// Waits for the next row.
    pub async fn next(&mut self) -> Option<ClientResult<T>> {
        loop {
            let chunk = match self.chunks.next().await? {
                Ok(chunk) => chunk,
                Err(e) => return Some(Err(e)),
            };
            let message = match StreamMessage::parse(&String::from_utf8_lossy(&chunk)) {
                Ok(Some(message)) => message,
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            };
            match message {
                StreamMessage::Header(header) => {
                    match RowDecoder::new(&header) {
                        Ok(decoder) => self.decoder = Some(decoder),
                        Err(e) => return Some(Err(e)),
                    }
                    self.query_id = header.query_id;
                }
                StreamMessage::Row(values) => {
                    let Some(decoder) = &self.decoder else {
                        return Some(Err(ClientError::Protocol("row before header".to_string())));
                    };
                    let row = decoder.decode(&values);
                    if let Err(e) = &row {
                        self.engine.record_decode_failure();
                        warn!("Dropping undecodable row: {}", e);
                    }
                    return Some(row);
                }
                StreamMessage::Final(reason) => {
                    debug!("Stream finished: {}", reason);
                    self.chunks.close();
                    return None;
                }
                StreamMessage::Error(message) => return Some(Err(in_band_error(message))),
            }
        }
    }

    /// Stops reading; the engine releases the stream's budget slot.
    pub fn close(&mut self) {
        self.chunks.close();
    }
}
