//! Documents and postings.
//!
//! A [`Document`] is a JSON object identified by a UUID stored in its `ID`
//! field. The store keeps a serialized copy; callers own the value they pass
//! in. A [`Posting`] is one `(term, ordinal)` index entry derived from a
//! document by a [`Schema`](crate::schema::Schema).
//!
//! # Examples
//!
//! ```
//! use rengu_store::document::Document;
//! use uuid::Uuid;
//!
//! let id = Uuid::new_v4();
//! let doc = Document::new()
//!     .with_field("title", "Kokinshu")
//!     .with_id(id);
//!
//! assert_eq!(doc.id().unwrap(), Some(id));
//! assert_eq!(doc.get("title").and_then(|v| v.as_str()), Some("Kokinshu"));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Name of the identifier field.
pub const ID_FIELD: &str = "ID";

/// A structured record identified by the UUID in its `ID` field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Document { fields: Map::new() }
    }

    /// Build a document from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Ok(Document { fields }),
            other => Err(StoreError::invalid_document(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Add a field, replacing any previous value.
    pub fn with_field<S: Into<String>, V: Into<Value>>(mut self, name: S, value: V) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.set_id(id);
        self
    }

    /// Set the identifier in place.
    pub fn set_id(&mut self, id: Uuid) {
        self.fields
            .insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    }

    /// The document identifier.
    ///
    /// Returns `Ok(None)` when the `ID` field is absent or null, and an
    /// [`StoreError::InvalidDocument`] when it is not a UUID string.
    pub fn id(&self) -> Result<Option<Uuid>> {
        match self.fields.get(ID_FIELD) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Uuid::parse_str(s).map(Some).map_err(|e| {
                StoreError::invalid_document(format!("{ID_FIELD} {s:?} is not a UUID: {e}"))
            }),
            Some(other) => Err(StoreError::invalid_document(format!(
                "{ID_FIELD} must be a string, got {other}"
            ))),
        }
    }

    /// Get a field value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// All fields of the document.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Convert into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Serialize for the data namespace.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }

    /// Deserialize a record read from the data namespace.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Document {
            fields: serde_json::from_slice(bytes)?,
        })
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Document { fields }
    }
}

/// One index entry derived from a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Posting {
    /// The indexed term, e.g. `tag=x`.
    pub term: String,
    /// Position of the value within a repeated field, 0 otherwise.
    pub ordinal: i64,
}

impl Posting {
    /// Create a posting.
    pub fn new<S: Into<String>>(term: S, ordinal: i64) -> Self {
        Posting {
            term: term.into(),
            ordinal,
        }
    }
}
