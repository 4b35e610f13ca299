//! Codegraph error types.
//!
//! All errors are typed and provide root cause information. Per-file parse
//! problems are not errors at this level: front-ends report them in-band as
//! [`crate::model::ParseIssue`] records and the run continues. Only setup
//! and store-I/O failures surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for codegraph operations.
#[derive(Error, Debug)]
pub enum CodegraphError {
    /// I/O error during file operations.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The file path that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Kuzu backend error.
    #[error("Store error: {0}")]
    Store(#[from] kuzu::Error),

    /// Store schema does not declare a kind the extractor produced.
    #[error("Schema does not declare table for kind '{kind}'")]
    SchemaMismatch {
        /// The undeclared entity or relationship kind.
        kind: String,
    },

    /// Read query contained a write verb.
    #[error("Query rejected: {reason}")]
    QueryRejected {
        /// Why the query was refused pre-dispatch.
        reason: String,
    },

    /// Configuration file missing or malformed.
    #[error("Config error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// A directory walk or glob pattern failed.
    #[error("Discovery error under {root}: {message}")]
    Discovery {
        /// The root that was being walked.
        root: PathBuf,
        /// The discovery error message.
        message: String,
    },

    /// Extraction run was cancelled before completion.
    #[error("Extraction cancelled")]
    Cancelled,

    /// UTF-8 validation error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Generic error with context.
    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for CodegraphError {
    fn from(err: std::io::Error) -> Self {
        CodegraphError::Io {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl CodegraphError {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CodegraphError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for codegraph operations.
pub type Result<T> = std::result::Result<T, CodegraphError>;
