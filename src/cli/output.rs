//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cli::args::{OutputFormat, RenguArgs};
use crate::document::{Document, Posting};
use crate::error::Result;
use crate::store::QueryHit;

/// Result structure for saving documents.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveResult {
    pub saved: usize,
    pub ids: Vec<Uuid>,
}

/// Result structure for deleting documents.
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResult {
    pub deleted: Vec<Uuid>,
    pub missing: Vec<Uuid>,
}

/// Result structure for counting documents.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResult {
    pub documents: usize,
}

/// The postings stored for one document.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostingsResult {
    pub id: Uuid,
    pub postings: Vec<Posting>,
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &RenguArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output query hits. Human output prints one document, or one id, per hit.
pub fn output_hits(hits: &[QueryHit], args: &RenguArgs) -> Result<()> {
    if args.output_format == OutputFormat::Json {
        return output_json(&hits, args);
    }

    for hit in hits {
        match &hit.document {
            Some(document) => output_document(document, args)?,
            None => println!("{}", hit.id),
        }
    }
    if args.verbosity() > 1 {
        println!();
        println!("{} documents matched", hits.len());
    }
    Ok(())
}

/// Output a single document, or nothing found.
pub fn output_document_or_missing(id: &Uuid, document: Option<&Document>, args: &RenguArgs) -> Result<()> {
    match (document, args.output_format) {
        (Some(document), _) => output_document(document, args),
        (None, OutputFormat::Json) => output_json(&document, args),
        (None, OutputFormat::Human) => {
            if args.verbosity() > 0 {
                eprintln!("Document {id} not found");
            }
            Ok(())
        }
    }
}

/// Output the postings of a document, one `term<TAB>ordinal` line each.
pub fn output_postings(result: &PostingsResult, args: &RenguArgs) -> Result<()> {
    if args.output_format == OutputFormat::Json {
        return output_json(result, args);
    }

    if args.verbosity() > 1 {
        println!("Postings for {}:", result.id);
    }
    for posting in &result.postings {
        println!("{}\t{}", posting.term, posting.ordinal);
    }
    Ok(())
}

fn output_document(document: &Document, args: &RenguArgs) -> Result<()> {
    let json = if args.pretty || args.output_format == OutputFormat::Human {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    println!("{json}");
    Ok(())
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &RenguArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
    }

    let value = serde_json::to_value(result)?;
    match value {
        serde_json::Value::Object(obj) => {
            for (key, val) in &obj {
                println!("{key}: {}", format_value(val));
            }
        }
        other => println!("{}", format_value(&other)),
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &RenguArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

/// Format a JSON value for human output.
fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            format!("[{}]", items.join(", "))
        }
        serde_json::Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(&json!("test")), "test");
        assert_eq!(format_value(&json!(42)), "42");
        assert_eq!(format_value(&json!(false)), "false");
        assert_eq!(format_value(&serde_json::Value::Null), "null");
        assert_eq!(format_value(&json!(["a", 1])), "[a, 1]");
        assert_eq!(format_value(&json!({"k": "v"})), r#"{"k":"v"}"#);
    }

    #[test]
    fn test_hit_serialization() {
        let id = Uuid::nil();
        let hit = QueryHit { id, document: None };
        assert_eq!(
            serde_json::to_value(&hit).unwrap(),
            json!({"id": "00000000-0000-0000-0000-000000000000"})
        );

        let hit = QueryHit {
            id,
            document: Some(Document::new().with_field("tag", "x")),
        };
        assert_eq!(
            serde_json::to_value(&hit).unwrap()["document"],
            json!({"tag": "x"})
        );
    }
}
