//! Store locations and configuration.
//!
//! A location is written `scheme:path`:
//!
//! | location              | store                           |
//! |-----------------------|---------------------------------|
//! | `lmdb:<dir>`          | LMDB environment, read-write    |
//! | `lmdb-ro:<dir>`       | LMDB environment, read-only     |
//! | `memory:`             | ephemeral in-memory store       |
//! | `http(s)://host/path` | remote query endpoint           |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, StoreError};
use crate::storage::{LmdbStorageConfig, StorageConfig};

/// Where a store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// An LMDB environment directory.
    Lmdb { path: PathBuf, read_only: bool },

    /// An ephemeral in-memory store.
    Memory,

    /// A remote query endpoint.
    Remote(String),
}

impl Location {
    /// Whether the location only serves reads.
    pub fn is_read_only(&self) -> bool {
        match self {
            Location::Lmdb { read_only, .. } => *read_only,
            Location::Memory => false,
            Location::Remote(_) => true,
        }
    }

    /// Whether the location is served over HTTP.
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// Configuration for opening a local store at this location.
    pub fn to_config(&self) -> Result<StoreConfig> {
        match self {
            Location::Lmdb { path, read_only } => {
                Ok(StoreConfig::lmdb(path).read_only(*read_only))
            }
            Location::Memory => Ok(StoreConfig::memory()),
            Location::Remote(uri) => Err(StoreError::invalid_location(format!(
                "{uri} is a remote endpoint, not a local store"
            ))),
        }
    }
}

impl FromStr for Location {
    type Err = StoreError;

    fn from_str(location: &str) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Location::Remote(location.to_string()));
        }

        let (scheme, path) = location.split_once(':').ok_or_else(|| {
            StoreError::invalid_location(format!("{location:?} is not of the form scheme:path"))
        })?;

        match scheme {
            "lmdb" | "lmdb-ro" if path.is_empty() => Err(StoreError::invalid_location(format!(
                "{location:?} has no database directory"
            ))),
            "lmdb" => Ok(Location::Lmdb {
                path: PathBuf::from(path),
                read_only: false,
            }),
            "lmdb-ro" => Ok(Location::Lmdb {
                path: PathBuf::from(path),
                read_only: true,
            }),
            "memory" => Ok(Location::Memory),
            other => Err(StoreError::invalid_location(format!(
                "unknown scheme {other:?} in {location:?}"
            ))),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Lmdb {
                path,
                read_only: false,
            } => write!(f, "lmdb:{}", path.display()),
            Location::Lmdb {
                path,
                read_only: true,
            } => write!(f, "lmdb-ro:{}", path.display()),
            Location::Memory => f.write_str("memory:"),
            Location::Remote(uri) => f.write_str(uri),
        }
    }
}

/// Configuration for opening a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Storage backend.
    pub storage: StorageConfig,

    /// Reject `save` and `delete`.
    pub read_only: bool,
}

impl StoreConfig {
    /// An ephemeral in-memory store.
    pub fn memory() -> Self {
        StoreConfig {
            storage: StorageConfig::Memory,
            read_only: false,
        }
    }

    /// An LMDB environment in `path`.
    pub fn lmdb<P: Into<PathBuf>>(path: P) -> Self {
        StoreConfig {
            storage: StorageConfig::Lmdb(LmdbStorageConfig::new(path.into())),
            read_only: false,
        }
    }

    /// Set whether the store is read-only.
    ///
    /// A read-only LMDB store opens an existing environment without write
    /// access, so it can run alongside a writer.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        if let StorageConfig::Lmdb(ref mut lmdb) = self.storage {
            lmdb.read_only = read_only;
        }
        self
    }
}
