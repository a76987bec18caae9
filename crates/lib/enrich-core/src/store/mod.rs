//! Document store interface and backends.
//!
//! The pipeline only needs a point read and a partial field update, so the
//! store trait stays that small. `SurrealDocumentStore` backs local runs and
//! tests; `FirestoreDocumentStore` talks to Firestore over REST.

pub mod firestore;
pub mod surreal;

use std::{error::Error, fmt};

use async_trait::async_trait;
use enrich_store::models::{Document, DocumentPath};
use serde_json::{Map, Value};

use crate::auth::AuthError;

pub use firestore::{FirestoreConfig, FirestoreDocumentStore};
pub use surreal::SurrealDocumentStore;

#[derive(Debug)]
pub enum StoreError {
    Surreal(Box<surrealdb::Error>),
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Auth(AuthError),
    Decode(String),
    NotFound(String),
    InvalidUrl(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surreal(err) => write!(f, "SurrealDB error: {err}"),
            Self::Http(err) => write!(f, "document store request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "document store returned status {status}: {body}")
            }
            Self::Auth(err) => write!(f, "document store authentication failed: {err}"),
            Self::Decode(message) => write!(f, "could not decode document: {message}"),
            Self::NotFound(path) => write!(f, "document not found: {path}"),
            Self::InvalidUrl(url) => write!(f, "invalid document store url: {url}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Surreal(err) => Some(err.as_ref()),
            Self::Http(err) => Some(err),
            Self::Auth(err) => Some(err),
            _ => None,
        }
    }
}

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        Self::Surreal(Box::new(err))
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err)
    }
}

impl From<AuthError> for StoreError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Path-addressed document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document snapshot, or `None` if nothing exists at `path`.
    ///
    /// # Errors
    /// Returns `StoreError` if the backend cannot be reached or the
    /// document cannot be decoded.
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>>;

    /// Merges `fields` into an existing document, leaving other fields as
    /// they are.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the document does not exist, or
    /// another `StoreError` if the write fails.
    async fn merge_fields(&self, path: &DocumentPath, fields: Map<String, Value>)
    -> StoreResult<()>;
}
