//! Querying a store served over HTTP.
//!
//! The endpoint takes one `q` parameter per query token and answers with a
//! stream of concatenated JSON documents, which is decoded as it arrives.
//! Query evaluation happens entirely on the server.

use log::debug;
use reqwest::blocking::{Client, Request, Response};
use reqwest::header::ACCEPT;
use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};

use crate::document::Document;
use crate::error::Result;

/// A read-only client for a remote store.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    uri: String,
    client: Client,
}

impl RemoteStore {
    /// Create a client for the endpoint at `uri`.
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        Ok(RemoteStore {
            uri: uri.into(),
            client: Client::builder().build()?,
        })
    }

    /// The endpoint URI.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Run a query and stream back the matching documents.
    pub fn query<S: AsRef<str>>(&self, tokens: &[S]) -> Result<RemoteDocuments> {
        let request = self.request(tokens)?;
        debug!("GET {}", request.url());

        let response = self.client.execute(request)?.error_for_status()?;
        Ok(RemoteDocuments {
            stream: Deserializer::from_reader(response).into_iter(),
        })
    }

    fn request<S: AsRef<str>>(&self, tokens: &[S]) -> Result<Request> {
        let params: Vec<(&str, &str)> = tokens.iter().map(|token| ("q", token.as_ref())).collect();
        Ok(self
            .client
            .get(&self.uri)
            .query(&params)
            .header(ACCEPT, "application/json")
            .build()?)
    }
}

/// Documents decoded from a remote query response.
pub struct RemoteDocuments {
    stream: StreamDeserializer<'static, IoRead<Response>, Document>,
}

impl Iterator for RemoteDocuments {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next().map(|document| Ok(document?))
    }
}
