//! Command implementations for the rengu CLI.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::sync::Arc;

use log::info;
use uuid::Uuid;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::Location;
use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::schema::FieldSchema;
use crate::store::DocumentStore;

/// Execute a CLI command.
pub fn execute_command(args: RenguArgs) -> Result<()> {
    let location: Location = args.store.parse()?;

    if let (Location::Remote(uri), Command::Query(query_args)) = (&location, &args.command) {
        return query_remote(uri, query_args, &args);
    }

    let store = open_store(&location)?;
    execute_on_store(&store, &args)
}

/// Execute a CLI command against an open store.
pub fn execute_on_store(store: &DocumentStore, args: &RenguArgs) -> Result<()> {
    match &args.command {
        Command::Query(query_args) => query_store(store, query_args, args),
        Command::Get(get_args) => get_document(store, get_args, args),
        Command::Save(save_args) => save_documents(store, save_args, args),
        Command::Delete(delete_args) => delete_documents(store, delete_args, args),
        Command::Postings(postings_args) => show_postings(store, postings_args, args),
        Command::Count => count_documents(store, args),
    }
}

/// Open a local store with the default field schema.
fn open_store(location: &Location) -> Result<DocumentStore> {
    DocumentStore::open(location.to_config()?, Arc::new(FieldSchema::new()))
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|e| StoreError::other(format!("invalid document id {id:?}: {e}")))
}

/// Query a local store.
fn query_store(store: &DocumentStore, args: &QueryArgs, cli_args: &RenguArgs) -> Result<()> {
    if cli_args.verbosity() > 2 {
        println!("Query: {}", args.tokens.join(" "));
        println!("Default operator: {:?}", args.operator);
    }

    let hits = store.query(&args.tokens, args.operator.operator(), !args.ids_only)?;
    output_hits(&hits, cli_args)
}

/// Query a remote store.
#[cfg(feature = "remote")]
fn query_remote(uri: &str, args: &QueryArgs, cli_args: &RenguArgs) -> Result<()> {
    use crate::remote::RemoteStore;

    if args.operator != DefaultOperator::And {
        info!("The remote endpoint applies its own default operator");
    }

    let remote = RemoteStore::new(uri)?;
    let hits = remote_hits(remote.query(&args.tokens)?, args.ids_only)?;
    output_hits(&hits, cli_args)
}

/// Turn documents streamed from a remote store into hits.
///
/// Documents without an `ID` cannot be reported as hits and are skipped.
#[cfg(any(feature = "remote", test))]
fn remote_hits<I>(documents: I, ids_only: bool) -> Result<Vec<crate::store::QueryHit>>
where
    I: IntoIterator<Item = Result<Document>>,
{
    let mut hits = Vec::new();
    for document in documents {
        let document = document?;
        let Some(id) = document.id()? else {
            log::warn!("Skipping remote document without an ID");
            continue;
        };
        hits.push(crate::store::QueryHit {
            id,
            document: (!ids_only).then_some(document),
        });
    }
    Ok(hits)
}

/// Query a remote store.
#[cfg(not(feature = "remote"))]
fn query_remote(uri: &str, _args: &QueryArgs, _cli_args: &RenguArgs) -> Result<()> {
    Err(StoreError::invalid_location(format!(
        "{uri}: querying remote stores requires the `remote` feature"
    )))
}

/// Print a document.
fn get_document(store: &DocumentStore, args: &GetArgs, cli_args: &RenguArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let document = store.get(&id)?;
    output_document_or_missing(&id, document.as_ref(), cli_args)
}

/// Save every document in a file of concatenated JSON objects.
fn save_documents(store: &DocumentStore, args: &SaveArgs, cli_args: &RenguArgs) -> Result<()> {
    let reader: Box<dyn Read> = if args.file.as_os_str() == "-" {
        Box::new(io::stdin().lock())
    } else {
        if cli_args.verbosity() > 1 {
            println!("Reading documents from: {}", args.file.display());
        }
        Box::new(BufReader::new(File::open(&args.file)?))
    };

    let mut ids = Vec::new();
    for document in serde_json::Deserializer::from_reader(reader).into_iter::<Document>() {
        let mut document = document?;
        let id = store.save(&mut document)?;
        info!("Saved {id}");
        ids.push(id);
    }
    store.flush()?;

    output_result(
        "Documents saved successfully",
        &SaveResult {
            saved: ids.len(),
            ids,
        },
        cli_args,
    )
}

/// Delete documents by id.
fn delete_documents(store: &DocumentStore, args: &DeleteArgs, cli_args: &RenguArgs) -> Result<()> {
    let ids = args
        .ids
        .iter()
        .map(|id| parse_id(id))
        .collect::<Result<Vec<_>>>()?;

    let mut result = DeleteResult {
        deleted: Vec::new(),
        missing: Vec::new(),
    };
    for id in ids {
        if store.delete(&id)? {
            result.deleted.push(id);
        } else {
            result.missing.push(id);
        }
    }
    store.flush()?;

    output_result("Delete completed", &result, cli_args)
}

/// Print the raw postings of a document.
fn show_postings(store: &DocumentStore, args: &PostingsArgs, cli_args: &RenguArgs) -> Result<()> {
    let id = parse_id(&args.id)?;
    let mut postings = store.postings(&id)?;
    postings.sort_by(|a, b| a.term.cmp(&b.term).then(a.ordinal.cmp(&b.ordinal)));

    output_postings(&PostingsResult { id, postings }, cli_args)
}

/// Count stored documents.
fn count_documents(store: &DocumentStore, cli_args: &RenguArgs) -> Result<()> {
    output_result(
        "Document count",
        &CountResult {
            documents: store.len()?,
        },
        cli_args,
    )
}
