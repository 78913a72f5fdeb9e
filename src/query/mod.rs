//! Boolean query engine.
//!
//! A query is a flat list of tokens: terms (literal or shell-style globs),
//! the match-all token `*`, the operators `&`, `|`, `^` and `-`, and
//! parentheses. [`QueryParser`] turns the tokens into a [`ResultSet`] of
//! document ids, scanning the term index lazily and combining sets in memory.
//!
//! # Examples
//!
//! ```
//! use rengu_store::query::{Operator, QueryParser};
//! use rengu_store::storage::{StorageConfig, StorageFactory};
//!
//! # fn main() -> rengu_store::error::Result<()> {
//! let storage = StorageFactory::create(StorageConfig::Memory)?;
//! let txn = storage.begin_read()?;
//!
//! let parser = QueryParser::new().with_default_operator(Some(Operator::Or));
//! let mut result = parser.parse(&*txn, &["tag=x", "tag=y"])?;
//! assert_eq!(result.len()?, 0);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

pub mod glob;
pub mod parser;
pub mod result_set;

pub use glob::Glob;
pub use parser::{QueryParser, Token};
pub use result_set::{Ids, ResultSet};

/// The term scanned for the match-all token `*`.
///
/// Every stored document carries an `ID=<uuid>` posting.
pub const MATCH_ALL_TERM: &str = "ID=*";

/// A binary set operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `&`: ids in both sets
    And,
    /// `|`: ids in either set
    Or,
    /// `^`: ids in exactly one set
    Xor,
    /// `-`: ids in the left set but not the right
    Subtract,
}

impl Operator {
    /// All operators.
    pub const ALL: [Operator; 4] = [
        Operator::And,
        Operator::Or,
        Operator::Xor,
        Operator::Subtract,
    ];

    /// The operator written as a query token, if `symbol` is one.
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        match symbol {
            "&" => Some(Operator::And),
            "|" => Some(Operator::Or),
            "^" => Some(Operator::Xor),
            "-" => Some(Operator::Subtract),
            _ => None,
        }
    }

    /// The query token for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::And => "&",
            Operator::Or => "|",
            Operator::Xor => "^",
            Operator::Subtract => "-",
        }
    }

    /// Lower-case name of the operator.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Xor => "xor",
            Operator::Subtract => "subtract",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Operator {
    type Err = StoreError;

    /// Accepts a symbol (`&`) or a name (`and`, `difference`, ...).
    fn from_str(s: &str) -> Result<Self> {
        if let Some(op) = Operator::from_symbol(s) {
            return Ok(op);
        }
        match s.to_ascii_lowercase().as_str() {
            "and" | "intersection" => Ok(Operator::And),
            "or" | "union" => Ok(Operator::Or),
            "xor" | "symmetric_difference" => Ok(Operator::Xor),
            "subtract" | "difference" | "not" => Ok(Operator::Subtract),
            _ => Err(StoreError::query(format!("unknown operator {s:?}"))),
        }
    }
}
