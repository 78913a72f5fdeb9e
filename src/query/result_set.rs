//! Lazy, deduplicating sets of document ids.
//!
//! A [`ResultSet`] built from a term holds a cursor on the term index and
//! discovers ids only as it is iterated. A set built from a set operation is
//! materialized up front. Either way an id is produced at most once.

use std::fmt;

use ahash::AHashSet;
use log::warn;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::key_codec::{truncate_term, unpack};
use crate::query::Operator;
use crate::query::glob::{Glob, is_glob};
use crate::storage::{Cursor, Namespace, ReadTransaction};

/// Decides what to do with an index key during a scan.
enum Matcher {
    /// Every key must equal the term.
    Literal(Vec<u8>),
    /// Keys must start with the glob's literal prefix and match the pattern.
    Glob(Glob),
}

enum Step {
    Take,
    Skip,
    Stop,
}

impl Matcher {
    fn step(&self, key: &[u8]) -> Step {
        match self {
            Matcher::Literal(term) if key == term.as_slice() => Step::Take,
            Matcher::Literal(_) => Step::Stop,
            Matcher::Glob(glob) if !key.starts_with(glob.prefix().as_bytes()) => Step::Stop,
            Matcher::Glob(glob) if glob.matches(key) => Step::Take,
            Matcher::Glob(_) => Step::Skip,
        }
    }
}

enum Source<'t> {
    /// Still scanning the index.
    Scan { cursor: Cursor<'t>, matcher: Matcher },
    /// Every match has been discovered.
    Materialized,
}

/// The ids of the documents matching a term or a combination of terms.
///
/// A result set borrows the read transaction it scans, so it cannot outlive
/// it. Ids come out in discovery order: index order for a term, left operand
/// first for a combination.
pub struct ResultSet<'t> {
    term: String,
    seen: AHashSet<Uuid>,
    order: Vec<Uuid>,
    source: Source<'t>,
}

impl<'t> ResultSet<'t> {
    /// Open a set scanning the postings of a literal or glob term.
    ///
    /// Literal terms are truncated the way stored terms are.
    pub fn scan(txn: &'t dyn ReadTransaction, term: &str) -> Result<Self> {
        let (matcher, start) = if is_glob(term) {
            let glob = Glob::new(term)?;
            let start = glob.prefix().as_bytes().to_vec();
            (Matcher::Glob(glob), start)
        } else {
            let literal = truncate_term(term).as_bytes().to_vec();
            (Matcher::Literal(literal.clone()), literal)
        };

        let cursor = txn.scan(Namespace::Index, &start)?;
        Ok(ResultSet {
            term: term.to_string(),
            seen: AHashSet::new(),
            order: Vec::new(),
            source: Source::Scan { cursor, matcher },
        })
    }

    /// Create a materialized set from known ids. Duplicates are dropped.
    pub fn from_ids<S, I>(term: S, ids: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Uuid>,
    {
        let mut seen = AHashSet::new();
        let order = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        ResultSet {
            term: term.into(),
            seen,
            order,
            source: Source::Materialized,
        }
    }

    /// The term, or a description of the combination, this set stands for.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Whether every match has been discovered.
    pub fn is_materialized(&self) -> bool {
        matches!(self.source, Source::Materialized)
    }

    /// The ids discovered so far.
    pub fn discovered(&self) -> &[Uuid] {
        &self.order
    }

    /// Iterate over the ids.
    ///
    /// Ids already discovered are replayed first, then the scan continues
    /// where it stopped. Dropping the iterator early keeps the cursor for the
    /// next iteration.
    pub fn iter(&mut self) -> Ids<'_, 't> {
        Ids {
            set: self,
            position: 0,
            failed: false,
        }
    }

    /// Whether the set contains `id`, scanning only as far as needed.
    pub fn contains(&mut self, id: &Uuid) -> Result<bool> {
        if self.seen.contains(id) {
            return Ok(true);
        }
        while let Some(found) = self.advance()? {
            if found == *id {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Number of ids in the set. Scans to the end.
    pub fn len(&mut self) -> Result<usize> {
        self.materialize()?;
        Ok(self.order.len())
    }

    /// Whether the set has no ids. Scans until the first match.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.order.is_empty() && self.advance()?.is_none())
    }

    /// Discover every remaining match and close the cursor.
    pub fn materialize(&mut self) -> Result<()> {
        while self.advance()?.is_some() {}
        Ok(())
    }

    /// Materialize and return the ids in discovery order.
    pub fn into_ids(mut self) -> Result<Vec<Uuid>> {
        self.materialize()?;
        Ok(self.order)
    }

    /// Ids in both sets.
    pub fn intersection(self, other: ResultSet<'t>) -> Result<ResultSet<'t>> {
        self.apply(Operator::And, other)
    }

    /// Ids in either set.
    pub fn union(self, other: ResultSet<'t>) -> Result<ResultSet<'t>> {
        self.apply(Operator::Or, other)
    }

    /// Ids in this set but not the other.
    pub fn difference(self, other: ResultSet<'t>) -> Result<ResultSet<'t>> {
        self.apply(Operator::Subtract, other)
    }

    /// Ids in exactly one of the sets.
    pub fn symmetric_difference(self, other: ResultSet<'t>) -> Result<ResultSet<'t>> {
        self.apply(Operator::Xor, other)
    }

    /// Combine two sets. Both are materialized first.
    pub fn apply(mut self, op: Operator, mut other: ResultSet<'t>) -> Result<ResultSet<'t>> {
        self.materialize()?;
        other.materialize()?;

        let term = format!("( {} {} {} )", self.term, op.symbol(), other.term);
        let left = self.order.iter().copied();
        let right = other.order.iter().copied();

        let ids: Vec<Uuid> = match op {
            Operator::And => left.filter(|id| other.seen.contains(id)).collect(),
            Operator::Or => left.chain(right).collect(),
            Operator::Subtract => left.filter(|id| !other.seen.contains(id)).collect(),
            Operator::Xor => left
                .filter(|id| !other.seen.contains(id))
                .chain(right.filter(|id| !self.seen.contains(id)))
                .collect(),
        };

        Ok(ResultSet::from_ids(term, ids))
    }

    /// Find the next id not seen before.
    fn advance(&mut self) -> Result<Option<Uuid>> {
        loop {
            let Source::Scan { cursor, matcher } = &mut self.source else {
                return Ok(None);
            };

            let (key, value) = match cursor.next() {
                Some(Ok(entry)) => entry,
                Some(Err(StoreError::CorruptIndexEntry(reason))) => {
                    warn!("Skipping index entry while scanning {:?}: {reason}", self.term);
                    continue;
                }
                Some(Err(e)) => return Err(e),
                None => {
                    self.source = Source::Materialized;
                    return Ok(None);
                }
            };

            match matcher.step(&key) {
                Step::Take => {}
                Step::Skip => continue,
                Step::Stop => {
                    self.source = Source::Materialized;
                    return Ok(None);
                }
            }

            let id = match unpack(&value) {
                Ok((id, _)) => id,
                Err(e) => {
                    warn!(
                        "Skipping posting under {:?}: {e}",
                        String::from_utf8_lossy(&key)
                    );
                    continue;
                }
            };

            if self.seen.insert(id) {
                self.order.push(id);
                return Ok(Some(id));
            }
        }
    }
}

impl fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("term", &self.term)
            .field("discovered", &self.order.len())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}

impl fmt::Display for ResultSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_materialized() {
            write!(f, "{}[n={}]", self.term, self.order.len())
        } else {
            f.write_str(&self.term)
        }
    }
}

/// Iterator over the ids of a [`ResultSet`].
///
/// Stops after the first error.
pub struct Ids<'s, 't> {
    set: &'s mut ResultSet<'t>,
    position: usize,
    failed: bool,
}

impl Iterator for Ids<'_, '_> {
    type Item = Result<Uuid>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Some(id) = self.set.order.get(self.position) {
            self.position += 1;
            return Some(Ok(*id));
        }
        match self.set.advance() {
            Ok(Some(id)) => {
                self.position += 1;
                Some(Ok(id))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_codec::{pack, pack_short};
    use crate::storage::{MemoryStorage, Storage};

    fn ids(n: u128) -> Vec<Uuid> {
        (1..=n).map(Uuid::from_u128).collect()
    }

    fn storage_with(postings: &[(&str, Vec<u8>)]) -> MemoryStorage {
        let storage = MemoryStorage::new();
        storage
            .write(&|txn| {
                for (term, value) in postings {
                    txn.put(Namespace::Index, term.as_bytes(), value)?;
                }
                Ok(())
            })
            .unwrap();
        storage
    }

    fn collect(set: &mut ResultSet<'_>) -> Vec<Uuid> {
        set.iter().collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_literal_term() {
        let id = ids(3);
        let storage = storage_with(&[
            ("tag=w", pack(&id[0], 0).to_vec()),
            ("tag=x", pack(&id[1], 0).to_vec()),
            ("tag=x", pack(&id[2], 0).to_vec()),
            ("tag=xy", pack(&id[0], 0).to_vec()),
        ]);
        let txn = storage.begin_read().unwrap();

        let mut set = ResultSet::scan(&*txn, "tag=x").unwrap();
        assert!(!set.is_materialized());
        assert_eq!(collect(&mut set), vec![id[1], id[2]]);
        assert!(set.is_materialized());
        assert_eq!(set.to_string(), "tag=x[n=2]");
    }

    #[test]
    fn test_missing_term_is_empty() {
        let storage = storage_with(&[("tag=x", pack(&Uuid::from_u128(1), 0).to_vec())]);
        let txn = storage.begin_read().unwrap();

        assert!(ResultSet::scan(&*txn, "tag=y").unwrap().is_empty().unwrap());
        assert!(ResultSet::scan(&*txn, "zzz").unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_deduplicates_postings() {
        let id = ids(2);
        let storage = storage_with(&[
            ("tags=x", pack(&id[0], 0).to_vec()),
            ("tags=x", pack(&id[0], 1).to_vec()),
            ("tags=x", pack(&id[0], 2).to_vec()),
            ("tags=x", pack_short(&id[0]).to_vec()),
            ("tags=x", pack(&id[1], 0).to_vec()),
        ]);
        let txn = storage.begin_read().unwrap();

        let mut set = ResultSet::scan(&*txn, "tags=x").unwrap();
        assert_eq!(set.len().unwrap(), 2);
    }

    #[test]
    fn test_glob_term() {
        let id = ids(4);
        let storage = storage_with(&[
            ("user", pack(&id[3], 0).to_vec()),
            ("user:alice", pack(&id[0], 0).to_vec()),
            ("user:bob", pack(&id[1], 0).to_vec()),
            ("user:carol", pack(&id[2], 0).to_vec()),
            ("users", pack(&id[3], 0).to_vec()),
        ]);
        let txn = storage.begin_read().unwrap();

        let mut set = ResultSet::scan(&*txn, "user:*").unwrap();
        assert_eq!(collect(&mut set), vec![id[0], id[1], id[2]]);

        let mut set = ResultSet::scan(&*txn, "user:?o*").unwrap();
        assert_eq!(collect(&mut set), vec![id[1]]);
    }

    #[test]
    fn test_skips_corrupt_values() {
        let id = ids(2);
        let storage = storage_with(&[
            ("tag=x", vec![1, 2, 3]),
            ("tag=x", pack(&id[0], 0).to_vec()),
            ("tag=x", vec![0; 20]),
            ("tag=x", pack(&id[1], 0).to_vec()),
        ]);
        let txn = storage.begin_read().unwrap();

        let mut set = ResultSet::scan(&*txn, "tag=x").unwrap();
        let mut found = collect(&mut set);
        found.sort();
        assert_eq!(found, id);
    }

    #[test]
    fn test_partial_iteration_resumes() {
        let id = ids(3);
        let storage = storage_with(&[
            ("tag=x", pack(&id[0], 0).to_vec()),
            ("tag=x", pack(&id[1], 0).to_vec()),
            ("tag=x", pack(&id[2], 0).to_vec()),
        ]);
        let txn = storage.begin_read().unwrap();

        let mut set = ResultSet::scan(&*txn, "tag=x").unwrap();
        let first: Vec<_> = set.iter().take(1).collect::<Result<_>>().unwrap();
        assert_eq!(first, vec![id[0]]);
        assert_eq!(set.discovered(), &id[..1]);

        assert_eq!(collect(&mut set), id);
        assert_eq!(collect(&mut set), id);
    }

    #[test]
    fn test_contains_stops_early() {
        let id = ids(3);
        let storage = storage_with(&[
            ("tag=x", pack(&id[0], 0).to_vec()),
            ("tag=x", pack(&id[1], 0).to_vec()),
            ("tag=x", pack(&id[2], 0).to_vec()),
        ]);
        let txn = storage.begin_read().unwrap();

        let mut set = ResultSet::scan(&*txn, "tag=x").unwrap();
        assert!(set.contains(&id[1]).unwrap());
        assert_eq!(set.discovered().len(), 2);
        assert!(!set.is_materialized());

        assert!(!set.contains(&Uuid::from_u128(99)).unwrap());
        assert!(set.is_materialized());
    }

    #[test]
    fn test_set_operations() {
        let id = ids(4);
        let a = || ResultSet::from_ids("a", [id[0], id[1], id[2]]);
        let b = || ResultSet::from_ids("b", [id[2], id[3]]);

        let and = a().intersection(b()).unwrap();
        assert_eq!(and.term(), "( a & b )");
        assert_eq!(and.discovered(), &[id[2]]);

        let or = a().union(b()).unwrap();
        assert_eq!(or.discovered(), &id[..]);

        let difference = a().difference(b()).unwrap();
        assert_eq!(difference.discovered(), &[id[0], id[1]]);

        let xor = a().symmetric_difference(b()).unwrap();
        assert_eq!(xor.discovered(), &[id[0], id[1], id[3]]);
        assert!(xor.is_materialized());
    }

    #[test]
    fn test_from_ids_deduplicates() {
        let id = Uuid::from_u128(7);
        let mut set = ResultSet::from_ids("dup", [id, id, id]);
        assert_eq!(set.len().unwrap(), 1);
        assert_eq!(set.to_string(), "dup[n=1]");
    }
}
