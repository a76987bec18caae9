use std::error::Error;
use std::fmt;

use enrich_store::models::{DocumentPath, PathError};
use enrich_store::schema::DOCUMENTS_SEPARATOR;
use serde_json::Value;

/// Reasons an inbound event cannot be turned into a document path.
#[derive(Debug)]
pub enum EventError {
    InvalidJson(serde_json::Error),
    MissingReference,
    InvalidPath(PathError),
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(err) => write!(f, "event body is not valid JSON: {err}"),
            Self::MissingReference => write!(f, "event has no value.name document reference"),
            Self::InvalidPath(err) => write!(f, "event references an invalid document: {err}"),
        }
    }
}

impl Error for EventError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidJson(err) => Some(err),
            Self::InvalidPath(err) => Some(err),
            Self::MissingReference => None,
        }
    }
}

/// Extracts the changed document's path from a raw event body.
///
/// The body must carry `value.name`, a full resource name such as
/// `projects/p/databases/(default)/documents/products/abc`.
///
/// # Errors
/// Returns `EventError` if the body is not JSON, lacks the reference, or the
/// reference does not name a document.
pub fn document_path_from_event(body: &[u8]) -> Result<DocumentPath, EventError> {
    let event: Value = serde_json::from_slice(body).map_err(EventError::InvalidJson)?;
    let name = event
        .get("value")
        .and_then(|value| value.get("name"))
        .and_then(Value::as_str)
        .ok_or(EventError::MissingReference)?;
    document_path_from_name(name)
}

/// Takes everything after the last `/documents/` in a resource name. A name
/// without the separator is used as-is.
///
/// # Errors
/// Returns `EventError::InvalidPath` if the remainder is not a document path.
pub fn document_path_from_name(name: &str) -> Result<DocumentPath, EventError> {
    let path = name
        .rsplit_once(DOCUMENTS_SEPARATOR)
        .map_or(name, |(_, path)| path);
    DocumentPath::parse(path).map_err(EventError::InvalidPath)
}
