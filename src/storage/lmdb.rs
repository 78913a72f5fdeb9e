//! LMDB-backed persistent storage.
//!
//! The environment holds one named database per namespace. The index
//! database is opened with `DUP_SORT`, so every posting of a term lives under
//! the term itself, sorted by value. Read transactions are LMDB snapshots:
//! they keep seeing the state as of their start while writers commit.
//!
//! An environment may only be opened once per process, so handles on the same
//! directory share it through a registry. Handles in other processes open the
//! same files and coordinate through LMDB's lock file.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};

use heed::types::Bytes;
use heed::{Database, DatabaseFlags, Env, EnvOpenOptions, RoTxn, RwTxn};
use log::{debug, info};
use parking_lot::Mutex;

use crate::error::{Result, StoreError};
use crate::storage::{
    Cursor, Entry, Namespace, ReadTransaction, Storage, WriteTransaction, check_entry,
};

/// File LMDB keeps its pages in.
const DATA_FILE: &str = "data.mdb";

type RawDatabase = Database<Bytes, Bytes>;

/// Environments opened by this process, by canonical directory.
static ENVIRONMENTS: LazyLock<Mutex<HashMap<PathBuf, Weak<Environment>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Configuration for LMDB storage.
#[derive(Debug, Clone)]
pub struct LmdbStorageConfig {
    /// Directory holding the environment.
    pub path: PathBuf,

    /// Largest size the map may grow to, in bytes.
    pub map_size: usize,

    /// Maximum number of concurrent read transactions.
    pub max_readers: u32,

    /// Open an existing environment without write access.
    pub read_only: bool,
}

impl LmdbStorageConfig {
    /// Create a configuration for an environment in `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        LmdbStorageConfig {
            path: path.as_ref().to_path_buf(),
            map_size: 1024 * 1024 * 1024,
            max_readers: 126,
            read_only: false,
        }
    }

    /// Set the maximum map size.
    pub fn with_map_size(mut self, bytes: usize) -> Self {
        self.map_size = bytes;
        self
    }

    /// Open without write access.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

/// An open environment and its two databases.
struct Environment {
    env: Env,
    data: RawDatabase,
    index: RawDatabase,
}

impl Environment {
    fn open(path: &Path, config: &LmdbStorageConfig) -> Result<Self> {
        let mut options = EnvOpenOptions::new();
        options
            .map_size(config.map_size)
            .max_readers(config.max_readers)
            .max_dbs(2);
        // SAFETY: the registry keeps a single environment per directory in
        // this process, and the files are only touched through LMDB.
        let env = unsafe { options.open(path)? };

        let (data, index) = if config.read_only {
            let rtxn = env.read_txn()?;
            let data = Self::open_database(&env, &rtxn, Namespace::Data, path)?;
            let index = Self::open_database(&env, &rtxn, Namespace::Index, path)?;
            rtxn.commit()?;
            (data, index)
        } else {
            let mut wtxn = env.write_txn()?;
            let data = env
                .database_options()
                .types::<Bytes, Bytes>()
                .name(Namespace::Data.name())
                .create(&mut wtxn)?;
            let index = env
                .database_options()
                .types::<Bytes, Bytes>()
                .name(Namespace::Index.name())
                .flags(DatabaseFlags::DUP_SORT)
                .create(&mut wtxn)?;
            wtxn.commit()?;
            (data, index)
        };

        Ok(Environment { env, data, index })
    }

    fn open_database(
        env: &Env,
        rtxn: &RoTxn<'_>,
        namespace: Namespace,
        path: &Path,
    ) -> Result<RawDatabase> {
        env.database_options()
            .types::<Bytes, Bytes>()
            .name(namespace.name())
            .open(rtxn)?
            .ok_or_else(|| {
                StoreError::invalid_location(format!(
                    "{} has no {} database",
                    path.display(),
                    namespace.name()
                ))
            })
    }

    fn database(&self, namespace: Namespace) -> RawDatabase {
        match namespace {
            Namespace::Data => self.data,
            Namespace::Index => self.index,
        }
    }
}

/// Persistent storage on top of LMDB.
pub struct LmdbStorage {
    path: PathBuf,
    environment: Arc<Environment>,
    read_only: bool,
}

impl LmdbStorage {
    /// Open the environment described by `config`.
    ///
    /// A writable open creates the directory and databases when missing. A
    /// read-only open requires an existing environment.
    pub fn open(config: &LmdbStorageConfig) -> Result<Self> {
        if config.read_only {
            if !config.path.join(DATA_FILE).is_file() {
                return Err(StoreError::invalid_location(format!(
                    "no database at {}",
                    config.path.display()
                )));
            }
        } else {
            fs::create_dir_all(&config.path)?;
        }
        let path = config.path.canonicalize()?;

        let environment = {
            let mut environments = ENVIRONMENTS.lock();
            environments.retain(|_, environment| environment.strong_count() > 0);
            match environments.get(&path).and_then(Weak::upgrade) {
                Some(environment) => {
                    debug!("Reusing LMDB environment at {}", path.display());
                    environment
                }
                None => {
                    let environment = Arc::new(Environment::open(&path, config)?);
                    environments.insert(path.clone(), Arc::downgrade(&environment));
                    environment
                }
            }
        };

        info!(
            "Opened LMDB storage at {}{}",
            path.display(),
            if config.read_only { " (read-only)" } else { "" }
        );

        Ok(LmdbStorage {
            path,
            environment,
            read_only: config.read_only,
        })
    }

    /// Whether this handle rejects writes.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

impl fmt::Debug for LmdbStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbStorage")
            .field("path", &self.path)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl Storage for LmdbStorage {
    fn begin_read(&self) -> Result<Box<dyn ReadTransaction + '_>> {
        Ok(Box::new(LmdbReadTransaction {
            txn: self.environment.env.read_txn()?,
            environment: &self.environment,
        }))
    }

    fn write(&self, txn: &dyn Fn(&mut dyn WriteTransaction) -> Result<()>) -> Result<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }

        let mut wtxn = self.environment.env.write_txn()?;
        let outcome = txn(&mut LmdbWriteTransaction {
            txn: &mut wtxn,
            environment: &self.environment,
        });

        match outcome {
            Ok(()) => Ok(wtxn.commit()?),
            Err(e) => {
                // Dropping the transaction aborts it
                drop(wtxn);
                debug!("Write transaction aborted: {e}");
                Err(e)
            }
        }
    }

    fn flush(&self) -> Result<()> {
        if !self.read_only {
            self.environment.env.force_sync()?;
        }
        Ok(())
    }
}

fn to_entry((key, value): (&[u8], &[u8])) -> Entry {
    (key.to_vec(), value.to_vec())
}

fn scan<'t>(database: RawDatabase, txn: &'t RoTxn<'_>, start: &[u8]) -> Result<Cursor<'t>> {
    let range = (Bound::Included(start), Bound::Unbounded);
    let iter = database.range(txn, &range)?;
    Ok(Box::new(
        iter.map(|entry| entry.map(to_entry).map_err(StoreError::from)),
    ))
}

/// A snapshot of the environment.
struct LmdbReadTransaction<'e> {
    txn: RoTxn<'e>,
    environment: &'e Environment,
}

impl ReadTransaction for LmdbReadTransaction<'_> {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let database = self.environment.database(namespace);
        Ok(database.get(&self.txn, key)?.map(<[u8]>::to_vec))
    }

    fn scan(&self, namespace: Namespace, start: &[u8]) -> Result<Cursor<'_>> {
        scan(self.environment.database(namespace), &self.txn, start)
    }

    fn count(&self, namespace: Namespace) -> Result<usize> {
        let database = self.environment.database(namespace);
        Ok(database.len(&self.txn)? as usize)
    }
}

struct LmdbWriteTransaction<'a, 'e> {
    txn: &'a mut RwTxn<'e>,
    environment: &'a Environment,
}

impl WriteTransaction for LmdbWriteTransaction<'_, '_> {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let database = self.environment.database(namespace);
        Ok(database.get(&*self.txn, key)?.map(<[u8]>::to_vec))
    }

    fn put(&mut self, namespace: Namespace, key: &[u8], value: &[u8]) -> Result<()> {
        check_entry(namespace, key, value)?;
        self.environment
            .database(namespace)
            .put(self.txn, key, value)?;
        Ok(())
    }

    fn delete(
        &mut self,
        namespace: Namespace,
        key: &[u8],
        value: Option<&[u8]>,
    ) -> Result<bool> {
        let database = self.environment.database(namespace);
        let deleted = match (namespace, value) {
            (Namespace::Index, Some(value)) => database.delete_one_duplicate(self.txn, key, value)?,
            _ => database.delete(self.txn, key)?,
        };
        Ok(deleted)
    }
}
