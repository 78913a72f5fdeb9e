//! The document store.
//!
//! Every document is written to the data namespace together with the postings
//! its schema derives from it, in one write transaction, so a reader never
//! sees a document without its postings or the reverse.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use rengu_store::config::StoreConfig;
//! use rengu_store::document::Document;
//! use rengu_store::schema::FieldSchema;
//! use rengu_store::store::DocumentStore;
//!
//! # fn main() -> rengu_store::error::Result<()> {
//! let store = DocumentStore::open(StoreConfig::memory(), Arc::new(FieldSchema::new()))?;
//!
//! let mut doc = Document::new().with_field("tag", "x");
//! let id = store.save(&mut doc)?;
//!
//! let hits = store.query(&["tag=x"], None, true)?;
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].id, id);
//! assert_eq!(hits[0].document.as_ref(), Some(&doc));
//! # Ok(())
//! # }
//! ```

use std::cell::Cell;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::config::{Location, StoreConfig};
use crate::document::{Document, Posting};
use crate::error::{Result, StoreError};
use crate::key_codec::{belongs_to, pack, pack_short, truncate_term, unpack};
use crate::query::{Operator, QueryParser, ResultSet};
use crate::schema::Schema;
use crate::storage::{Namespace, ReadTransaction, Storage, StorageFactory, WriteTransaction};

/// One document matched by a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    /// The document identifier.
    pub id: Uuid,

    /// The stored document, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

/// An embedded document store with an inverted term index.
#[derive(Debug)]
pub struct DocumentStore {
    storage: Arc<dyn Storage>,
    schema: Arc<dyn Schema>,
    read_only: bool,
    /// Single writer.
    writer: Mutex<()>,
}

impl DocumentStore {
    /// Open a store.
    pub fn open(config: StoreConfig, schema: Arc<dyn Schema>) -> Result<Self> {
        let storage = StorageFactory::create(config.storage)?;
        info!(
            "Opened document store on {storage:?}{}",
            if config.read_only { " (read-only)" } else { "" }
        );
        Ok(Self::with_storage(storage, schema, config.read_only))
    }

    /// Open the store at a location such as `lmdb:/var/lib/rengu`.
    pub fn open_location(location: &str, schema: Arc<dyn Schema>) -> Result<Self> {
        let location: Location = location.parse()?;
        Self::open(location.to_config()?, schema)
    }

    /// Create a store on an existing storage backend.
    pub fn with_storage(storage: Arc<dyn Storage>, schema: Arc<dyn Schema>, read_only: bool) -> Self {
        DocumentStore {
            storage,
            schema,
            read_only,
            writer: Mutex::new(()),
        }
    }

    /// The schema used to validate and index documents.
    pub fn schema(&self) -> &Arc<dyn Schema> {
        &self.schema
    }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Begin a read transaction.
    pub fn reader(&self) -> Result<StoreReader<'_>> {
        Ok(StoreReader {
            txn: self.storage.begin_read()?,
        })
    }

    /// Get a document. A missing document is `Ok(None)`.
    pub fn get(&self, id: &Uuid) -> Result<Option<Document>> {
        self.reader()?.get(id)
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<usize> {
        self.reader()?.len()
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Save a document and its postings.
    ///
    /// A document without an identifier is given a fresh one, written into
    /// its `ID` field once the save succeeds. Saving over an existing document replaces its postings.
    pub fn save(&self, document: &mut Document) -> Result<Uuid> {
        self.check_writable()?;

        if !self.schema.validate(document) {
            return Err(StoreError::invalid_document(
                "document rejected by schema validation",
            ));
        }
        // The caller's document only gets a generated id once the write commits
        let (id, generated) = match document.id()? {
            Some(id) => (id, false),
            None => (Uuid::new_v4(), true),
        };
        let mut stored = document.clone();
        if generated {
            stored.set_id(id);
        }

        let bytes = stored.to_bytes()?;
        let postings = self.schema.index(&stored);

        let _writer = self.writer.lock();
        self.storage.write(&|txn| {
            if let Some(previous) = txn.get(Namespace::Data, id.as_bytes())? {
                let previous = Document::from_bytes(&previous)?;
                remove_postings(txn, &id, &self.schema.index(&previous))?;
            }

            txn.put(Namespace::Data, id.as_bytes(), &bytes)?;
            for posting in &postings {
                let term = truncate_term(&posting.term);
                txn.put(Namespace::Index, term.as_bytes(), &pack(&id, posting.ordinal))
                    .map_err(|e| match e {
                        StoreError::ValueSize(reason) => StoreError::IndexWriteFailed {
                            term: term.to_string(),
                            id,
                            reason,
                        },
                        other => other,
                    })?;
            }
            Ok(())
        })?;

        if generated {
            document.set_id(id);
        }
        debug!("Saved {id} with {} postings", postings.len());
        Ok(id)
    }

    /// Delete a document and its postings.
    ///
    /// Returns whether the document existed. The postings removed are the
    /// ones the schema derives from the stored document.
    pub fn delete(&self, id: &Uuid) -> Result<bool> {
        self.check_writable()?;

        let existed = Cell::new(false);
        let _writer = self.writer.lock();
        self.storage.write(&|txn| {
            existed.set(false);
            let Some(stored) = txn.get(Namespace::Data, id.as_bytes())? else {
                return Ok(());
            };
            let stored = Document::from_bytes(&stored)?;

            remove_postings(txn, id, &self.schema.index(&stored))?;
            txn.delete(Namespace::Data, id.as_bytes(), None)?;
            existed.set(true);
            Ok(())
        })?;

        if existed.get() {
            debug!("Deleted {id}");
        }
        Ok(existed.get())
    }

    /// Run a query and collect the matching ids, with documents if
    /// `with_data` is set.
    ///
    /// `default_operator` combines adjacent terms without an operator token;
    /// `None` makes such queries fail.
    pub fn query<S: AsRef<str>>(
        &self,
        tokens: &[S],
        default_operator: Option<Operator>,
        with_data: bool,
    ) -> Result<Vec<QueryHit>> {
        let reader = self.reader()?;
        let result = reader.query(tokens, default_operator)?;
        reader.hits(result, with_data)
    }

    /// Every posting stored for a document.
    pub fn postings(&self, id: &Uuid) -> Result<Vec<Posting>> {
        self.reader()?.postings(id)
    }

    /// Persist pending writes.
    pub fn flush(&self) -> Result<()> {
        self.storage.flush()
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

/// Remove the postings of `id` for the given terms, in both value forms.
fn remove_postings(txn: &mut dyn WriteTransaction, id: &Uuid, postings: &[Posting]) -> Result<()> {
    for posting in postings {
        let term = truncate_term(&posting.term).as_bytes();
        txn.delete(Namespace::Index, term, Some(&pack(id, posting.ordinal)[..]))?;
        txn.delete(Namespace::Index, term, Some(&pack_short(id)[..]))?;
    }
    Ok(())
}

/// A read transaction on a [`DocumentStore`].
///
/// Result sets returned by [`StoreReader::query`] borrow the reader and are
/// closed with it.
pub struct StoreReader<'s> {
    txn: Box<dyn ReadTransaction + 's>,
}

impl StoreReader<'_> {
    /// Get a document. A missing document is `Ok(None)`.
    pub fn get(&self, id: &Uuid) -> Result<Option<Document>> {
        self.txn
            .get(Namespace::Data, id.as_bytes())?
            .map(|bytes| Document::from_bytes(&bytes))
            .transpose()
    }

    /// Number of stored documents.
    pub fn len(&self) -> Result<usize> {
        self.txn.count(Namespace::Data)
    }

    /// Whether no documents are stored.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Evaluate query tokens into a lazy result set.
    pub fn query<S: AsRef<str>>(
        &self,
        tokens: &[S],
        default_operator: Option<Operator>,
    ) -> Result<ResultSet<'_>> {
        QueryParser::new()
            .with_default_operator(default_operator)
            .parse(&*self.txn, tokens)
    }

    /// Drain a result set into hits.
    ///
    /// With `with_data`, ids whose document is no longer stored are dropped.
    pub fn hits(&self, mut result: ResultSet<'_>, with_data: bool) -> Result<Vec<QueryHit>> {
        let mut hits = Vec::new();
        for id in result.iter() {
            let id = id?;
            if !with_data {
                hits.push(QueryHit { id, document: None });
                continue;
            }
            match self.get(&id)? {
                Some(document) => hits.push(QueryHit {
                    id,
                    document: Some(document),
                }),
                None => debug!("Posting for {id} has no stored document"),
            }
        }
        Ok(hits)
    }

    /// Every posting stored for a document, found by scanning the whole index.
    pub fn postings(&self, id: &Uuid) -> Result<Vec<Posting>> {
        let mut postings = Vec::new();
        for entry in self.txn.scan(Namespace::Index, b"")? {
            let (term, value) = match entry {
                Ok(entry) => entry,
                Err(StoreError::CorruptIndexEntry(reason)) => {
                    warn!("Skipping index entry: {reason}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if !belongs_to(&value, id) {
                continue;
            }
            match unpack(&value) {
                Ok((_, ordinal)) => {
                    postings.push(Posting::new(String::from_utf8_lossy(&term), ordinal))
                }
                Err(e) => warn!("Skipping posting for {id}: {e}"),
            }
        }
        Ok(postings)
    }
}
