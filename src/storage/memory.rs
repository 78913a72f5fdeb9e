//! In-memory storage implementation for testing and scratch stores.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, StoreError};
use crate::storage::{
    Cursor, Entry, Namespace, ReadTransaction, Storage, WriteTransaction, check_entry,
};

/// Both namespaces of an in-memory store.
#[derive(Debug, Clone, Default)]
struct Tables {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Duplicate-sorted `(key, value)` pairs.
    index: BTreeSet<(Vec<u8>, Vec<u8>)>,
}

/// An in-memory storage implementation.
///
/// A read transaction pins the tables as they were when it began, so readers
/// see a stable snapshot and never block the writer. A write transaction
/// stages its changes and applies them on commit, copying the tables only
/// when a reader still holds the previous version.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: RwLock<Arc<Tables>>,
    /// Serializes write transactions.
    writer: Mutex<()>,
}

impl MemoryStorage {
    /// Create an empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn begin_read(&self) -> Result<Box<dyn ReadTransaction + '_>> {
        let tables = Arc::clone(&*self.tables.read());
        Ok(Box::new(MemoryReadTransaction { tables }))
    }

    fn write(&self, txn: &dyn Fn(&mut dyn WriteTransaction) -> Result<()>) -> Result<()> {
        let _writer = self.writer.lock();

        let changes = {
            let tables = self.tables.read();
            let mut staged = MemoryWriteTransaction {
                tables: &tables,
                changes: Changes::default(),
            };
            txn(&mut staged)?;
            staged.changes
        };

        Arc::make_mut(&mut *self.tables.write()).apply(changes);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A snapshot of the tables.
struct MemoryReadTransaction {
    tables: Arc<Tables>,
}

impl ReadTransaction for MemoryReadTransaction {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.tables.get(namespace, key))
    }

    fn scan(&self, namespace: Namespace, start: &[u8]) -> Result<Cursor<'_>> {
        let cursor: Cursor<'_> = match namespace {
            Namespace::Data => Box::new(
                self.tables
                    .data
                    .range(start.to_vec()..)
                    .map(|(key, value)| Ok::<Entry, StoreError>((key.clone(), value.clone()))),
            ),
            Namespace::Index => Box::new(
                self.tables
                    .index
                    .range((start.to_vec(), Vec::new())..)
                    .map(|entry| Ok::<Entry, StoreError>(entry.clone())),
            ),
        };
        Ok(cursor)
    }

    fn count(&self, namespace: Namespace) -> Result<usize> {
        Ok(match namespace {
            Namespace::Data => self.tables.data.len(),
            Namespace::Index => self.tables.index.len(),
        })
    }
}

impl Tables {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Option<Vec<u8>> {
        match namespace {
            Namespace::Data => self.data.get(key).cloned(),
            Namespace::Index => self.index_values(key).next().cloned(),
        }
    }

    /// Values stored under an index key, in order.
    fn index_values<'a>(&'a self, key: &'a [u8]) -> impl Iterator<Item = &'a Vec<u8>> + 'a {
        self.index
            .range((key.to_vec(), Vec::new())..)
            .take_while(move |(k, _)| k.as_slice() == key)
            .map(|(_, value)| value)
    }

    fn apply(&mut self, changes: Changes) {
        for (key, value) in changes.data {
            match value {
                Some(value) => {
                    self.data.insert(key, value);
                }
                None => {
                    self.data.remove(&key);
                }
            }
        }
        for entry in &changes.index_removed {
            self.index.remove(entry);
        }
        self.index.extend(changes.index_added);
    }
}

/// Changes staged by a write transaction.
#[derive(Debug, Default)]
struct Changes {
    /// `None` marks a removed key.
    data: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    /// Pairs absent from the tables that the transaction adds.
    index_added: BTreeSet<(Vec<u8>, Vec<u8>)>,
    /// Pairs present in the tables that the transaction removes.
    index_removed: BTreeSet<(Vec<u8>, Vec<u8>)>,
}

/// The committed tables overlaid with staged changes.
struct MemoryWriteTransaction<'a> {
    tables: &'a Tables,
    changes: Changes,
}

impl MemoryWriteTransaction<'_> {
    fn index_contains(&self, entry: &(Vec<u8>, Vec<u8>)) -> bool {
        self.changes.index_added.contains(entry)
            || (self.tables.index.contains(entry) && !self.changes.index_removed.contains(entry))
    }

    /// Values visible under an index key, in order.
    fn index_values(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let committed = self
            .tables
            .index_values(key)
            .filter(|value| {
                !self
                    .changes
                    .index_removed
                    .contains(&(key.to_vec(), (*value).clone()))
            })
            .cloned();
        let added = self
            .changes
            .index_added
            .range((key.to_vec(), Vec::new())..)
            .take_while(|(k, _)| k.as_slice() == key)
            .map(|(_, value)| value.clone());

        let values: BTreeSet<Vec<u8>> = committed.chain(added).collect();
        values.into_iter().collect()
    }
}

impl WriteTransaction for MemoryWriteTransaction<'_> {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(match namespace {
            Namespace::Data => match self.changes.data.get(key) {
                Some(staged) => staged.clone(),
                None => self.tables.data.get(key).cloned(),
            },
            Namespace::Index => self.index_values(key).into_iter().next(),
        })
    }

    fn put(&mut self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        check_entry(namespace, key, value)?;
        match namespace {
            Namespace::Data => {
                self.changes
                    .data
                    .insert(key.to_vec(), Some(value.to_vec()));
            }
            Namespace::Index => {
                let entry = (key.to_vec(), value.to_vec());
                if !self.changes.index_removed.remove(&entry) && !self.tables.index.contains(&entry)
                {
                    self.changes.index_added.insert(entry);
                }
            }
        }
        Ok(())
    }

    fn delete(
        &mut self,
        namespace: Namespace,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> Result<bool> {
        match (namespace, value) {
            (Namespace::Data, _) => {
                let existed = self.get(namespace, key)?.is_some();
                self.changes.data.insert(key.to_vec(), None);
                Ok(existed)
            }
            (Namespace::Index, Some(value)) => {
                let entry = (key.to_vec(), value.to_vec());
                if !self.index_contains(&entry) {
                    return Ok(false);
                }
                if !self.changes.index_added.remove(&entry) {
                    self.changes.index_removed.insert(entry);
                }
                Ok(true)
            }
            (Namespace::Index, None) => {
                let values = self.index_values(key);
                for value in &values {
                    self.delete(namespace, key, Some(value.as_slice()))?;
                }
                Ok(!values.is_empty())
            }
        }
    }
}
