//! Command line argument parsing for the rengu CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::query::Operator;

/// rengu - an embedded document store with boolean term queries
#[derive(Parser, Debug, Clone)]
#[command(name = "rengu")]
#[command(about = "An embedded document store with boolean term queries")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct RenguArgs {
    /// Store location (lmdb:<dir>, lmdb-ro:<dir>, memory:, http(s)://...)
    #[arg(short, long, env = "RENGU_STORE", value_name = "LOCATION")]
    pub store: String,

    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl RenguArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Query the store
    Query(QueryArgs),

    /// Print a document
    Get(GetArgs),

    /// Save documents from a file of concatenated JSON objects
    Save(SaveArgs),

    /// Delete documents
    Delete(DeleteArgs),

    /// Print the postings stored for a document
    Postings(PostingsArgs),

    /// Count stored documents
    Count,
}

/// Arguments for querying
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Query tokens: terms, globs, `*`, operators (& | ^ -) and parentheses
    #[arg(value_name = "TOKENS", required = true, allow_hyphen_values = true)]
    pub tokens: Vec<String>,

    /// Operator between adjacent terms
    #[arg(short, long, default_value = "and")]
    pub operator: DefaultOperator,

    /// Print ids instead of documents
    #[arg(long)]
    pub ids_only: bool,
}

/// Arguments for getting a document
#[derive(Parser, Debug, Clone)]
pub struct GetArgs {
    /// Document id
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Arguments for saving documents
#[derive(Parser, Debug, Clone)]
pub struct SaveArgs {
    /// File of concatenated JSON documents, `-` for stdin
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Arguments for deleting documents
#[derive(Parser, Debug, Clone)]
pub struct DeleteArgs {
    /// Document ids
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

/// Arguments for listing postings
#[derive(Parser, Debug, Clone)]
pub struct PostingsArgs {
    /// Document id
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Operator applied between adjacent terms
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultOperator {
    /// Intersection
    And,
    /// Union
    Or,
    /// Symmetric difference
    Xor,
    /// Difference
    Subtract,
    /// Require an explicit operator
    None,
}

impl DefaultOperator {
    /// The query operator, if any.
    pub fn operator(&self) -> Option<Operator> {
        match self {
            DefaultOperator::And => Some(Operator::And),
            DefaultOperator::Or => Some(Operator::Or),
            DefaultOperator::Xor => Some(Operator::Xor),
            DefaultOperator::Subtract => Some(Operator::Subtract),
            DefaultOperator::None => None,
        }
    }
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query() {
        let args = RenguArgs::try_parse_from([
            "rengu", "--store", "memory:", "query", "tag=x", "-", "(", "tag=y", ")",
        ])
        .unwrap();

        assert_eq!(args.store, "memory:");
        match args.command {
            Command::Query(query) => {
                assert_eq!(query.tokens, vec!["tag=x", "-", "(", "tag=y", ")"]);
                assert_eq!(query.operator.operator(), Some(Operator::And));
                assert!(!query.ids_only);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_operator_option() {
        let args = RenguArgs::try_parse_from([
            "rengu", "-s", "memory:", "query", "--operator", "none", "--ids-only", "a",
        ])
        .unwrap();

        match args.command {
            Command::Query(query) => {
                assert_eq!(query.operator.operator(), None);
                assert!(query.ids_only);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_verbosity() {
        let args = RenguArgs::try_parse_from(["rengu", "-s", "memory:", "count"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = RenguArgs::try_parse_from(["rengu", "-s", "memory:", "-vvv", "count"]).unwrap();
        assert_eq!(args.verbosity(), 3);

        let args = RenguArgs::try_parse_from(["rengu", "-s", "memory:", "-q", "-v", "count"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format() {
        let args = RenguArgs::try_parse_from([
            "rengu", "-s", "memory:", "-f", "json", "--pretty", "get", "x",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.pretty);
    }
}
