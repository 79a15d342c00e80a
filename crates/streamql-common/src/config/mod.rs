//! Configuration for streamql clients.
//!
//! This module provides the client configuration and the per-relation
//! settings consumed when creating relations.

mod client;

pub use client::{ClientConfig, RelationKind, RelationSettings};
