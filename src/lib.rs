//! codegraph: code property-graph extraction core.
//!
//! Ingests a source tree, extracts a typed graph of code entities and the
//! relationships between them, persists it in an embedded Cypher store,
//! and keeps the store consistent as files are added, modified, and
//! deleted. The two-pass pipeline (parse, then resolve against a symbol
//! registry) produces deterministic identities, so incremental updates
//! are a set-diff rather than a rebuild.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod incremental;
pub mod ingest;
pub mod model;
pub mod registry;
pub mod store;

/// Re-export common error types for convenience.
pub use error::{CodegraphError, Result};

/// Re-export the driver and store handles for convenience.
pub use extract::Extractor;
pub use store::GraphStore;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
