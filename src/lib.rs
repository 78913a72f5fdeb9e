//! # rengu-store
//!
//! An embedded document store with a transactional inverted term index.
//!
//! ## Features
//!
//! - Documents and their postings written in one transaction
//! - Lazy, deduplicating result sets over the term index
//! - Boolean queries with `&`, `|`, `^`, `-`, parentheses and glob terms
//! - Pluggable storage backends (LMDB, in-memory)
//! - Optional HTTP client for remote stores
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use rengu_store::prelude::*;
//!
//! # fn main() -> rengu_store::error::Result<()> {
//! let store = DocumentStore::open(StoreConfig::memory(), Arc::new(FieldSchema::new()))?;
//!
//! store.save(&mut Document::new().with_field("tag", "x").with_field("year", 905))?;
//! store.save(&mut Document::new().with_field("tag", "y").with_field("year", 1205))?;
//!
//! let hits = store.query(&["tag=x", "|", "year=12*"], Some(Operator::And), false)?;
//! assert_eq!(hits.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod key_codec;
pub mod query;
#[cfg(feature = "remote")]
pub mod remote;
pub mod schema;
pub mod storage;
pub mod store;

pub mod prelude {
    pub use crate::config::{Location, StoreConfig};
    pub use crate::document::{Document, Posting};
    pub use crate::error::{Result, StoreError};
    pub use crate::query::{Operator, QueryParser, ResultSet};
    pub use crate::schema::{FieldSchema, Schema};
    pub use crate::store::{DocumentStore, QueryHit, StoreReader};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
