//! Error types for the rengu document store.
//!
//! All fallible operations return [`Result`], whose error is the [`StoreError`]
//! enum. Malformed queries and invalid documents are user-correctable and are
//! reported as-is; substrate failures (I/O, a full map, a busy database) are
//! propagated unchanged and never retried.
//!
//! # Examples
//!
//! ```
//! use rengu_store::error::{Result, StoreError};
//!
//! fn parse_operator(symbol: &str) -> Result<()> {
//!     Err(StoreError::query(format!("unknown operator {symbol}")))
//! }
//!
//! assert!(parse_operator("~").is_err());
//! ```

use std::io;

use thiserror::Error;
use uuid::Uuid;

/// The main error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O errors (reading document files, the network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors raised by LMDB
    #[error("LMDB error: {0}")]
    Lmdb(#[from] heed::Error),

    /// Generic substrate errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// A key or value violates the substrate's size constraints
    #[error("Invalid key/value size: {0}")]
    ValueSize(String),

    /// The document failed schema validation
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A query contained a `)` without a matching `(` or the reverse
    #[error("Unbalanced parenthesis: {0}")]
    UnbalancedParenthesis(String),

    /// Two operands were adjacent with neither an explicit nor a default operator
    #[error("No operator specified: {0}")]
    NoOperatorSpecified(String),

    /// A posting could not be written; the whole transaction was aborted
    #[error("Failed to write posting {term:?} for {id}: {reason}")]
    IndexWriteFailed {
        term: String,
        id: Uuid,
        reason: String,
    },

    /// A posting value could not be decoded
    #[error("Corrupt index entry: {0}")]
    CorruptIndexEntry(String),

    /// A write was attempted on a store opened read-only
    #[error("Store is read-only")]
    ReadOnly,

    /// A store location string could not be understood
    #[error("Invalid store location: {0}")]
    InvalidLocation(String),

    /// Query-related errors other than the structural ones above
    #[error("Query error: {0}")]
    Query(String),

    /// Errors talking to a remote store
    #[cfg(feature = "remote")]
    #[error("Remote error: {0}")]
    Remote(#[from] reqwest::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        StoreError::Storage(msg.into())
    }

    /// Create a new invalid document error.
    pub fn invalid_document<S: Into<String>>(msg: S) -> Self {
        StoreError::InvalidDocument(msg.into())
    }

    /// Create a new unbalanced parenthesis error.
    pub fn unbalanced<S: Into<String>>(msg: S) -> Self {
        StoreError::UnbalancedParenthesis(msg.into())
    }

    /// Create a new corrupt index entry error.
    pub fn corrupt<S: Into<String>>(msg: S) -> Self {
        StoreError::CorruptIndexEntry(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        StoreError::Query(msg.into())
    }

    /// Create a new invalid location error.
    pub fn invalid_location<S: Into<String>>(msg: S) -> Self {
        StoreError::InvalidLocation(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        StoreError::Other(msg.into())
    }

    /// Whether the error comes from a malformed query rather than the store.
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            StoreError::UnbalancedParenthesis(_)
                | StoreError::NoOperatorSpecified(_)
                | StoreError::Query(_)
        )
    }
}
