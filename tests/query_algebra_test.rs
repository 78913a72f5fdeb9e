//! Integration tests for query evaluation over committed data.

use std::cell::RefCell;
use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use rengu_store::prelude::*;
use rengu_store::storage::{Cursor, Namespace, ReadTransaction};

/// Documents tagged with every subset of {a, b, c}, plus user names.
fn populated_store(config: StoreConfig) -> Result<DocumentStore> {
    let store = DocumentStore::open(config, Arc::new(FieldSchema::new()))?;
    for mask in 0u8..8 {
        let tags: Vec<&str> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, tag)| *tag)
            .collect();
        store.save(&mut Document::new().with_field("tags", tags).with_field("mask", mask))?;
    }
    for user in ["alice", "bob", "carol"] {
        store.save(&mut Document::new().with_field("user", user))?;
    }
    store.save(&mut Document::new().with_field("users", "many"))?;
    Ok(store)
}

fn query(store: &DocumentStore, tokens: &[&str]) -> Result<Vec<Uuid>> {
    let mut ids: Vec<Uuid> = store
        .query(tokens, Some(Operator::And), false)?
        .into_iter()
        .map(|hit| hit.id)
        .collect();
    ids.sort();
    Ok(ids)
}

fn masks(store: &DocumentStore, tokens: &[&str]) -> Result<Vec<u64>> {
    let mut masks: Vec<u64> = store
        .query(tokens, Some(Operator::And), true)?
        .into_iter()
        .filter_map(|hit| hit.document?.get("mask")?.as_u64())
        .collect();
    masks.sort();
    Ok(masks)
}

#[test]
fn test_boolean_algebra_laws() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;

    assert_eq!(
        query(&store, &["tags=a", "&", "tags=b"])?,
        query(&store, &["tags=b", "&", "tags=a"])?
    );
    assert_eq!(
        query(&store, &["tags=a", "|", "tags=a"])?,
        query(&store, &["tags=a"])?
    );
    assert!(query(&store, &["tags=a", "-", "tags=a"])?.is_empty());
    assert!(query(&store, &["tags=a", "^", "tags=a"])?.is_empty());
    assert_eq!(
        query(&store, &["(", "tags=a", "&", "tags=b", ")", "|", "(", "tags=a", "-", "tags=b", ")"])?,
        query(&store, &["tags=a"])?
    );
    Ok(())
}

#[test]
fn test_operators_over_tags() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;

    assert_eq!(masks(&store, &["tags=a"])?, vec![1, 3, 5, 7]);
    assert_eq!(masks(&store, &["tags=a", "&", "tags=b"])?, vec![3, 7]);
    assert_eq!(masks(&store, &["tags=a", "|", "tags=b"])?, vec![1, 2, 3, 5, 6, 7]);
    assert_eq!(masks(&store, &["tags=a", "^", "tags=b"])?, vec![1, 2, 5, 6]);
    assert_eq!(masks(&store, &["tags=a", "-", "tags=b"])?, vec![1, 5]);
    assert_eq!(masks(&store, &["mask=*", "-", "tags=*"])?, vec![0]);
    Ok(())
}

#[test]
fn test_default_operator_is_sticky() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;

    // a & b & c
    assert_eq!(masks(&store, &["tags=a", "tags=b", "tags=c"])?, vec![7]);
    // a | b | c: the explicit operator carries over to c
    assert_eq!(
        masks(&store, &["tags=a", "|", "tags=b", "tags=c"])?,
        vec![1, 2, 3, 4, 5, 6, 7]
    );
    // ((a | b) - c) - c
    assert_eq!(
        masks(&store, &["tags=a", "|", "tags=b", "-", "tags=c", "tags=c"])?,
        vec![1, 2, 3]
    );
    Ok(())
}

#[test]
fn test_malformed_queries() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;

    assert!(matches!(
        query(&store, &["(", "tags=a"]),
        Err(StoreError::UnbalancedParenthesis(_))
    ));
    assert!(matches!(
        query(&store, &[")"]),
        Err(StoreError::UnbalancedParenthesis(_))
    ));
    assert!(matches!(
        store.query(&["tags=a", "tags=b"], None, false),
        Err(StoreError::NoOperatorSpecified(_))
    ));
    assert!(query(&store, &[])?.is_empty());
    Ok(())
}

#[test]
fn test_match_all_on_lmdb() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = populated_store(StoreConfig::lmdb(temp_dir.path().join("db")))?;

    assert_eq!(query(&store, &["*"])?.len(), 12);
    assert_eq!(query(&store, &["user=*"])?.len(), 3);
    assert_eq!(masks(&store, &["tags=[ab]", "-", "tags=c"])?, vec![1, 2, 3]);
    Ok(())
}

#[test]
fn test_reversed_glob_range_matches_nothing() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;

    assert!(query(&store, &["tags=[c-a]"])?.is_empty());
    assert_eq!(masks(&store, &["tags=[c-ab]"])?, vec![2, 3, 6, 7]);
    assert_eq!(masks(&store, &["tags=[!c-a]"])?, vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(
        query(&store, &["tags=[c-a]", "|", "user=bob"])?,
        query(&store, &["user=bob"])?
    );
    Ok(())
}

/// A read transaction that records every index key its cursors visit.
struct RecordingTransaction<'s> {
    inner: Box<dyn ReadTransaction + 's>,
    visited: RefCell<Vec<Vec<u8>>>,
}

impl ReadTransaction for RecordingTransaction<'_> {
    fn get(&self, namespace: Namespace, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(namespace, key)
    }

    fn scan(&self, namespace: Namespace, start: &[u8]) -> Result<Cursor<'_>> {
        let cursor = self.inner.scan(namespace, start)?;
        Ok(Box::new(cursor.inspect(move |entry| {
            if let Ok((key, _)) = entry {
                self.visited.borrow_mut().push(key.clone());
            }
        })))
    }

    fn count(&self, namespace: Namespace) -> Result<usize> {
        self.inner.count(namespace)
    }
}

#[test]
fn test_glob_scan_stops_after_prefix() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::lmdb(temp_dir.path().join("db"));
    let storage = rengu_store::storage::StorageFactory::create(config.storage)?;
    let store = DocumentStore::with_storage(storage.clone(), Arc::new(FieldSchema::new()), false);
    for user in ["alice", "bob", "carol"] {
        store.save(&mut Document::new().with_field("user", user))?;
    }
    store.save(&mut Document::new().with_field("users", "many"))?;
    store.save(&mut Document::new().with_field("zeta", "last"))?;

    let txn = RecordingTransaction {
        inner: storage.begin_read()?,
        visited: RefCell::new(Vec::new()),
    };
    let result = QueryParser::new().parse(&txn, &["user=*"])?;
    assert_eq!(result.into_ids()?.len(), 3);

    let visited = txn.visited.borrow();
    let outside: Vec<_> = visited.iter().filter(|key| !key.starts_with(b"user=")).collect();
    assert_eq!(visited.len(), 4);
    assert_eq!(outside, vec![&b"users=many".to_vec()]);
    Ok(())
}

#[test]
fn test_partial_iteration_yields_each_match_once() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;
    let reader = store.reader()?;
    let mut result = reader.query(&["tags=*"], None)?;

    let first: Vec<Uuid> = result.iter().take(2).collect::<Result<_>>()?;
    assert_eq!(first.len(), 2);

    let all: Vec<Uuid> = result.iter().collect::<Result<_>>()?;
    assert_eq!(all.len(), 7);
    assert_eq!(&all[..2], &first[..]);

    let mut unique = all.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 7);
    Ok(())
}

#[test]
fn test_result_set_lives_in_reader() -> Result<()> {
    let store = populated_store(StoreConfig::memory())?;
    let reader = store.reader()?;

    let mut result = reader.query(&["tags=a"], None)?;
    assert!(!result.is_materialized());
    assert_eq!(result.len()?, 4);
    assert!(result.is_materialized());
    assert_eq!(result.to_string(), "tags=a[n=4]");

    let combined = reader
        .query(&["tags=a"], None)?
        .intersection(reader.query(&["tags=b"], None)?)?;
    assert_eq!(combined.term(), "( tags=a & tags=b )");
    assert_eq!(reader.hits(combined, true)?.len(), 2);
    Ok(())
}
