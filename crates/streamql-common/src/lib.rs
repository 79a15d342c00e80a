//! # streamql-common
//!
//! Shared foundations for the streamql crates.
//!
//! - **Errors**: stable `ErrorCode`s and the configuration error type
//! - **Config**: `ClientConfig` and `RelationSettings`, loadable from TOML
//! - **Constants**: endpoint paths, media types and protocol markers
//!
//! ## Example
//!
//! ```rust
//! use streamql_common::config::ClientConfig;
//!
//! let config = ClientConfig::new().host("ksql.internal").port(8088);
//! assert_eq!(config.endpoint(), "ksql.internal:8088");
//! assert!(config.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;

pub use config::{ClientConfig, RelationKind, RelationSettings};
pub use constants::*;
pub use error::{ConfigError, ConfigResult, ErrorCode};
