//! Schema collaborator: document validation and posting derivation.
//!
//! The store never interprets documents itself. It asks a [`Schema`] whether a
//! document may be stored and which postings it produces, both when saving and
//! when deleting, so the index always mirrors what the schema derives from the
//! stored image.

use std::fmt::Debug;

use serde_json::Value;

use crate::document::{Document, ID_FIELD, Posting};

/// Validation and indexing rules for documents.
pub trait Schema: Send + Sync + Debug {
    /// Whether the document may be stored.
    fn validate(&self, document: &Document) -> bool;

    /// The postings derived from the document.
    fn index(&self, document: &Document) -> Vec<Posting>;
}

/// A schema that indexes every field as `path=value`.
///
/// - scalar fields produce one posting with ordinal 0
/// - arrays produce one posting per element, the element position being the ordinal
/// - nested objects are flattened with dotted paths (`author.name=Ki`)
/// - nulls are not indexed
///
/// Every document with an identifier also gets an `ID=<uuid>` posting, which is
/// what the match-all query term `ID=*` scans.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    /// Fields that must be present and non-null.
    required: Vec<String>,
    /// Top-level fields that are stored but not indexed.
    ignored: Vec<String>,
}

impl FieldSchema {
    /// Create a schema with no required fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a top-level field.
    pub fn require<S: Into<String>>(mut self, field: S) -> Self {
        self.required.push(field.into());
        self
    }

    /// Keep a top-level field out of the index.
    pub fn ignore<S: Into<String>>(mut self, field: S) -> Self {
        self.ignored.push(field.into());
        self
    }

    fn collect(path: &str, value: &Value, ordinal: i64, postings: &mut Vec<Posting>) {
        match value {
            Value::Null => {}
            Value::Bool(b) => postings.push(Posting::new(format!("{path}={b}"), ordinal)),
            Value::Number(n) => postings.push(Posting::new(format!("{path}={n}"), ordinal)),
            Value::String(s) => postings.push(Posting::new(format!("{path}={s}"), ordinal)),
            Value::Array(items) => {
                for (position, item) in items.iter().enumerate() {
                    Self::collect(path, item, position as i64, postings);
                }
            }
            Value::Object(fields) => {
                for (name, item) in fields {
                    Self::collect(&format!("{path}.{name}"), item, ordinal, postings);
                }
            }
        }
    }
}

impl Schema for FieldSchema {
    fn validate(&self, document: &Document) -> bool {
        if document.id().is_err() {
            return false;
        }
        self.required
            .iter()
            .all(|field| !matches!(document.get(field), None | Some(Value::Null)))
    }

    fn index(&self, document: &Document) -> Vec<Posting> {
        let mut postings = Vec::new();

        if let Ok(Some(id)) = document.id() {
            postings.push(Posting::new(format!("{ID_FIELD}={id}"), 0));
        }

        for (name, value) in document.fields() {
            if name == ID_FIELD || self.ignored.iter().any(|ignored| ignored == name) {
                continue;
            }
            Self::collect(name, value, 0, &mut postings);
        }

        postings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn terms(postings: &[Posting]) -> Vec<(&str, i64)> {
        let mut terms: Vec<_> = postings
            .iter()
            .map(|p| (p.term.as_str(), p.ordinal))
            .collect();
        terms.sort();
        terms
    }

    #[test]
    fn test_index_scalars() {
        let id = Uuid::new_v4();
        let doc = Document::from_value(json!({
            "tag": "x",
            "year": 905,
            "imperial": true,
            "note": null,
        }))
        .unwrap()
        .with_id(id);

        let postings = FieldSchema::new().index(&doc);
        let id_term = format!("ID={id}");
        assert_eq!(
            terms(&postings),
            vec![
                (id_term.as_str(), 0),
                ("imperial=true", 0),
                ("tag=x", 0),
                ("year=905", 0),
            ]
        );
    }

    #[test]
    fn test_index_arrays_and_objects() {
        let doc = Document::from_value(json!({
            "tags": ["spring", "love"],
            "author": {"name": "Ki no Tsurayuki"},
        }))
        .unwrap();

        let postings = FieldSchema::new().index(&doc);
        assert_eq!(
            terms(&postings),
            vec![
                ("author.name=Ki no Tsurayuki", 0),
                ("tags=love", 1),
                ("tags=spring", 0),
            ]
        );
    }

    #[test]
    fn test_ignored_fields() {
        let doc = Document::new()
            .with_field("tag", "x")
            .with_field("body", "a very long text");

        let postings = FieldSchema::new().ignore("body").index(&doc);
        assert_eq!(terms(&postings), vec![("tag=x", 0)]);
    }

    #[test]
    fn test_validate() {
        let schema = FieldSchema::new().require("title");

        assert!(schema.validate(&Document::new().with_field("title", "Manyoshu")));
        assert!(!schema.validate(&Document::new()));
        assert!(!schema.validate(&Document::new().with_field("title", Value::Null)));

        let bad_id = Document::from_value(json!({"ID": "nope", "title": "t"})).unwrap();
        assert!(!schema.validate(&bad_id));
    }
}
