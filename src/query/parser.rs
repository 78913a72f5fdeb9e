//! Recursive descent over query tokens.

use std::iter;

use log::debug;

use crate::error::{Result, StoreError};
use crate::query::result_set::ResultSet;
use crate::query::{MATCH_ALL_TERM, Operator};
use crate::storage::ReadTransaction;

/// A classified query token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// `&`, `|`, `^` or `-`
    Operator(Operator),
    /// `(`
    Open,
    /// `)`
    Close,
    /// `*`
    MatchAll,
    /// A literal or glob term
    Term(&'a str),
    /// End of input
    End,
}

impl<'a> Token<'a> {
    /// Classify a raw token. Only exact single symbols are operators.
    pub fn classify(token: &'a str) -> Token<'a> {
        if let Some(op) = Operator::from_symbol(token) {
            return Token::Operator(op);
        }
        match token {
            "(" => Token::Open,
            ")" => Token::Close,
            "*" => Token::MatchAll,
            term => Token::Term(term),
        }
    }
}

/// Parses query tokens into a [`ResultSet`].
///
/// Operands inside one pair of parentheses are combined left to right. An
/// explicit operator token applies to every following operand of the same
/// group until another operator token replaces it; the default operator is
/// used only until the first explicit one appears. So `a b c` with default
/// `&` is `a & b & c`, and `a | b c` is `a | b | c`.
#[derive(Debug, Clone)]
pub struct QueryParser {
    /// Operator for adjacent operands without an operator token.
    default_operator: Option<Operator>,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParser {
    /// Create a parser whose default operator is AND.
    pub fn new() -> Self {
        QueryParser {
            default_operator: Some(Operator::And),
        }
    }

    /// Set the default operator. With `None`, adjacent operands fail with
    /// [`StoreError::NoOperatorSpecified`].
    pub fn with_default_operator(mut self, operator: Option<Operator>) -> Self {
        self.default_operator = operator;
        self
    }

    /// The default operator.
    pub fn default_operator(&self) -> Option<Operator> {
        self.default_operator
    }

    /// Evaluate `tokens` against a read transaction.
    ///
    /// An empty query yields an empty set.
    pub fn parse<'t, S: AsRef<str>>(
        &self,
        txn: &'t dyn ReadTransaction,
        tokens: &[S],
    ) -> Result<ResultSet<'t>> {
        let mut stream = tokens
            .iter()
            .map(|token| Token::classify(token.as_ref()))
            .chain(iter::once(Token::End));

        let result = self.group(txn, &mut stream, 0)?;
        let result = result.unwrap_or_else(|| ResultSet::from_ids("", iter::empty()));
        debug!("Parsed {} tokens into {}", tokens.len(), result.term());
        Ok(result)
    }

    /// Parse one parenthesized group, or the whole query at depth 0.
    fn group<'t, 'a, I>(
        &self,
        txn: &'t dyn ReadTransaction,
        tokens: &mut I,
        depth: usize,
    ) -> Result<Option<ResultSet<'t>>>
    where
        I: Iterator<Item = Token<'a>>,
    {
        let mut result: Option<ResultSet<'t>> = None;
        let mut explicit: Option<Operator> = None;

        loop {
            let operand = match tokens.next().unwrap_or(Token::End) {
                Token::Operator(op) => {
                    explicit = Some(op);
                    continue;
                }
                Token::Open => self
                    .group(txn, tokens, depth + 1)?
                    .unwrap_or_else(|| ResultSet::from_ids("( )", iter::empty())),
                Token::Close if depth == 0 => {
                    return Err(StoreError::unbalanced("')' without a matching '('"));
                }
                Token::Close => return Ok(result),
                Token::End if depth > 0 => {
                    return Err(StoreError::unbalanced(format!(
                        "{depth} '(' left open at end of query"
                    )));
                }
                Token::End => return Ok(result),
                Token::MatchAll => ResultSet::scan(txn, MATCH_ALL_TERM)?,
                Token::Term(term) => ResultSet::scan(txn, term)?,
            };

            result = Some(match result {
                None => operand,
                Some(running) => {
                    let op = explicit.or(self.default_operator).ok_or_else(|| {
                        StoreError::NoOperatorSpecified(format!(
                            "between {} and {}",
                            running.term(),
                            operand.term()
                        ))
                    })?;
                    running.apply(op, operand)?
                }
            });
        }
    }
}
