use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{FIELD_AI_LABELS, FIELD_IMAGE_URL, FIELD_POST_DESCRIPTION, FIELD_PRODUCT_NAME};

/// Slash-separated path of a document, e.g. `products/abc`.
///
/// Paths alternate collection and document id segments, so a valid path
/// always has an even, non-zero number of non-empty segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentPath(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Empty,
    EmptySegment(String),
    NotADocument(String),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "document path is empty"),
            Self::EmptySegment(path) => write!(f, "document path has an empty segment: {path}"),
            Self::NotADocument(path) => {
                write!(f, "path does not address a document (odd segment count): {path}")
            }
        }
    }
}

impl Error for PathError {}

impl DocumentPath {
    /// Parses and validates a document path.
    ///
    /// # Errors
    /// Returns `PathError` if the path is empty, has empty segments, or names
    /// a collection rather than a document.
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let mut count = 0usize;
        for segment in raw.split('/') {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(raw.to_string()));
            }
            count += 1;
        }
        if count % 2 != 0 {
            return Err(PathError::NotADocument(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path of the parent collection, e.g. `products` for `products/abc`.
    #[must_use]
    pub fn collection(&self) -> &str {
        self.0.rsplit_once('/').map_or("", |(collection, _)| collection)
    }

    /// Last segment of the path.
    #[must_use]
    pub fn document_id(&self) -> &str {
        self.0.rsplit_once('/').map_or(self.0.as_str(), |(_, id)| id)
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocumentPath> for String {
    fn from(path: DocumentPath) -> Self {
        path.0
    }
}

/// Snapshot of a document's fields as read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: DocumentPath,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    #[must_use]
    pub const fn new(path: DocumentPath, fields: Map<String, Value>) -> Self {
        Self { path, fields }
    }

    /// Returns a field only when it holds a non-empty string.
    #[must_use]
    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        self.string_field(FIELD_IMAGE_URL)
    }

    /// Product name as prompt text. Numbers and booleans are rendered;
    /// null, arrays and maps count as absent.
    #[must_use]
    pub fn product_name(&self) -> Option<Cow<'_, str>> {
        match self.fields.get(FIELD_PRODUCT_NAME)? {
            Value::String(name) => Some(Cow::Borrowed(name)),
            Value::Number(number) => Some(Cow::Owned(number.to_string())),
            Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Generated caption and labels written back to a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    #[serde(rename = "postDescription")]
    pub post_description: String,
    #[serde(rename = "aiLabels")]
    pub ai_labels: Vec<String>,
}

impl Enrichment {
    #[must_use]
    pub const fn new(post_description: String, ai_labels: Vec<String>) -> Self {
        Self {
            post_description,
            ai_labels,
        }
    }

    /// Converts the enrichment into the partial field map sent to the store.
    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert(
            FIELD_POST_DESCRIPTION.to_string(),
            Value::String(self.post_description),
        );
        fields.insert(
            FIELD_AI_LABELS.to_string(),
            Value::Array(self.ai_labels.into_iter().map(Value::String).collect()),
        );
        fields
    }
}
