//! Transactional key-value substrate.
//!
//! The document store keeps two namespaces in an ordered key-value engine:
//! [`Namespace::Data`] maps document ids to serialized documents, and
//! [`Namespace::Index`] maps terms to posting values with duplicate keys
//! allowed. Backends implement [`Storage`]; the store only ever talks to the
//! traits in this module.
//!
//! # Storage Types
//!
//! ## LmdbStorage
//! - Persistent storage in an LMDB environment
//! - Duplicate-sorted index database, snapshot read transactions
//! - Read-only handles may run alongside a writer
//!
//! ## MemoryStorage
//! - In-memory storage for testing and scratch stores
//! - Readers pin a consistent snapshot
//!
//! # Example
//!
//! ```
//! use rengu_store::storage::{Namespace, StorageConfig, StorageFactory};
//!
//! # fn main() -> rengu_store::error::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::Memory)?;
//!
//! storage.write(&|txn| {
//!     txn.put(Namespace::Index, b"tag=x", b"first")?;
//!     txn.put(Namespace::Index, b"tag=x", b"second")?;
//!     Ok(())
//! })?;
//!
//! let txn = storage.begin_read()?;
//! let entries: Vec<_> = txn.scan(Namespace::Index, b"tag=")?.collect::<Result<_, _>>()?;
//! assert_eq!(entries.len(), 2);
//! # Ok(())
//! # }
//! ```

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::{Result, StoreError};

pub mod lmdb;
pub mod memory;

pub use lmdb::{LmdbStorage, LmdbStorageConfig};
pub use memory::MemoryStorage;

/// Largest key, and largest value in a duplicate-sorted namespace, in bytes.
pub const MAX_KEY_SIZE: usize = 511;

/// The namespaces kept by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `document_id -> serialized document`
    Data,
    /// `term -> posting value`, duplicate keys allowed
    Index,
}

impl Namespace {
    /// Name of the namespace in the substrate.
    pub fn name(&self) -> &'static str {
        match self {
            Namespace::Data => "data",
            Namespace::Index => "index",
        }
    }

    /// Whether a key may hold several values.
    pub fn allows_duplicates(&self) -> bool {
        matches!(self, Namespace::Index)
    }
}

/// A `(key, value)` pair read from a namespace.
pub type Entry = (Vec<u8>, Vec<u8>);

/// An ordered scan over a namespace.
///
/// Entries come in `(key, value)` order. The cursor borrows its transaction
/// and is closed when dropped.
pub type Cursor<'t> = Box<dyn Iterator<Item = Result<Entry>> + 't>;

/// A read-only view of the store.
pub trait ReadTransaction {
    /// Get the value stored under `key`, or the first value for duplicate keys.
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Scan every entry whose key is greater than or equal to `start`.
    fn scan(&self, namespace: Namespace, start: &[u8]) -> Result<Cursor<'_>>;

    /// Number of entries in the namespace.
    fn count(&self, namespace: Namespace) -> Result<usize>;
}

/// The mutable view handed to a [`Storage::write`] closure.
pub trait WriteTransaction {
    /// Get the value stored under `key`, or the first value for duplicate keys.
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Store a value. Replaces in [`Namespace::Data`], adds a duplicate in
    /// [`Namespace::Index`].
    fn put(&mut self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove a key, or a single `(key, value)` pair when `value` is given.
    ///
    /// Returns whether anything was removed.
    fn delete(&mut self, namespace: Namespace, key: &[u8], value: Option<&[u8]>)
    -> Result<bool>;
}

/// A transactional ordered key-value backend.
pub trait Storage: Send + Sync + Debug {
    /// Begin a read transaction on a snapshot of the current state.
    fn begin_read(&self) -> Result<Box<dyn ReadTransaction + '_>>;

    /// Run `txn` as one atomic write transaction across both namespaces.
    ///
    /// The transaction commits when the closure returns `Ok` and is aborted,
    /// leaving the previous state intact, when it returns `Err`. Writes are
    /// serialized.
    fn write(&self, txn: &dyn Fn(&mut dyn WriteTransaction) -> Result<()>) -> Result<()>;

    /// Persist pending writes.
    fn flush(&self) -> Result<()>;
}

/// Check a key/value pair against the substrate size constraints.
pub fn check_entry(namespace: Namespace, key: &[u8], value: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_SIZE {
        return Err(StoreError::ValueSize(format!(
            "key of {} bytes in {} namespace, expected 1..={MAX_KEY_SIZE}",
            key.len(),
            namespace.name()
        )));
    }
    if namespace.allows_duplicates() && value.len() > MAX_KEY_SIZE {
        return Err(StoreError::ValueSize(format!(
            "value of {} bytes in {} namespace, expected at most {MAX_KEY_SIZE}",
            value.len(),
            namespace.name()
        )));
    }
    Ok(())
}

/// Configuration for storage backends.
#[derive(Debug, Clone, Default)]
pub enum StorageConfig {
    /// Persistent LMDB storage
    Lmdb(LmdbStorageConfig),

    /// Ephemeral in-memory storage
    #[default]
    Memory,
}

/// A factory for creating storage instances.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage instance for the given configuration.
    pub fn create(config: StorageConfig) -> Result<Arc<dyn Storage>> {
        match config {
            StorageConfig::Memory => Ok(Arc::new(MemoryStorage::new())),
            StorageConfig::Lmdb(lmdb_config) => Ok(Arc::new(LmdbStorage::open(&lmdb_config)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_properties() {
        assert_eq!(Namespace::Data.name(), "data");
        assert_eq!(Namespace::Index.name(), "index");
        assert!(Namespace::Index.allows_duplicates());
        assert!(!Namespace::Data.allows_duplicates());
    }

    #[test]
    fn test_check_entry() {
        assert!(check_entry(Namespace::Index, b"tag=x", &[0; 24]).is_ok());
        assert!(check_entry(Namespace::Data, b"id", &[0; 4096]).is_ok());

        assert!(matches!(
            check_entry(Namespace::Index, b"", &[0; 24]),
            Err(StoreError::ValueSize(_))
        ));
        assert!(matches!(
            check_entry(Namespace::Index, &[b'a'; MAX_KEY_SIZE + 1], &[0; 24]),
            Err(StoreError::ValueSize(_))
        ));
        assert!(matches!(
            check_entry(Namespace::Index, b"tag=x", &[0; MAX_KEY_SIZE + 1]),
            Err(StoreError::ValueSize(_))
        ));
    }

    #[test]
    fn test_storage_config_default() {
        assert!(matches!(StorageConfig::default(), StorageConfig::Memory));
    }

    #[test]
    fn test_storage_factory_memory() {
        let storage = StorageFactory::create(StorageConfig::Memory).unwrap();
        let txn = storage.begin_read().unwrap();
        assert_eq!(txn.count(Namespace::Data).unwrap(), 0);
    }

    #[test]
    fn test_storage_factory_lmdb() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = StorageConfig::Lmdb(LmdbStorageConfig::new(temp_dir.path()));
        let storage = StorageFactory::create(config).unwrap();

        storage
            .write(&|txn| txn.put(Namespace::Data, b"key", b"value"))
            .unwrap();

        let txn = storage.begin_read().unwrap();
        assert_eq!(
            txn.get(Namespace::Data, b"key").unwrap(),
            Some(b"value".to_vec())
        );
    }
}
