//! # streamql-client
//!
//! Executes statements built with `streamql-query` against a streaming SQL
//! engine over its REST interface.
//!
//! - **Engine**: one HTTP request per dispatch under a requests-in-flight budget,
//!   single or streaming consumption, rebalancing of saturated streams
//! - **Context**: deadlines and cancellation for every dispatch
//! - **Decoder**: query headers and rows back into native records
//! - **Client**: statements, DESCRIBE into the schema registry, linting,
//!   pull and push queries
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use streamql_client::{Client, Context};
//! use streamql_common::ClientConfig;
//! use streamql_query::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct Order {
//!     id: i64,
//!     item: String,
//! }
//!
//! impl Record for Order {
//!     fn fields() -> Vec<NativeField> {
//!         vec![NativeField::of::<i64>("id").primary(), NativeField::of::<String>("item")]
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new(ClientConfig::new().host("localhost").port(8088))?;
//! let ctx = Context::background();
//!
//! client.lint_remote::<Order>(&ctx, "ORDERS").await?;
//!
//! let mut rows = client
//!     .push::<Order>(&ctx, select([f("id"), f("item")]).from("orders").emit_changes())
//!     .await?;
//! while let Some(row) = rows.next().await {
//!     println!("{:?}", row?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod budget;
pub mod client;
pub mod context;
pub mod decode;
pub mod engine;
pub mod error;
mod protocol;
pub mod transport;

pub use client::{Client, RowStream};
pub use context::{CancelHandle, Context};
pub use decode::{parse_headers_and_values, QueryHeader, RowDecoder, StreamMessage};
pub use engine::{ChunkStream, ClientStats, Consumption, Engine, Response};
pub use error::{ClientError, ClientResult};
pub use transport::{
    BodyStream, Envelope, HttpTransport, MemoryTransport, ScriptedResponse, Transport,
    TransportResponse,
};
