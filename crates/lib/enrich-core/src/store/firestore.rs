use async_trait::async_trait;
use enrich_store::models::{Document, DocumentPath};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::auth::GcpAuth;

use super::{DocumentStore, StoreError, StoreResult};

pub const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
pub const DEFAULT_FIRESTORE_DATABASE: &str = "(default)";

/// Location of a Firestore database.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub base_url: String,
    pub project_id: String,
    pub database: String,
}

impl FirestoreConfig {
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_FIRESTORE_BASE_URL.to_string(),
            project_id: project_id.into(),
            database: DEFAULT_FIRESTORE_DATABASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.base_url.trim_end_matches('/'),
            self.project_id,
            self.database
        )
    }
}

/// Firestore document store over the v1 REST API.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: reqwest::Client,
    auth: GcpAuth,
    documents_root: String,
}

#[derive(Deserialize)]
struct FirestoreDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Serialize)]
struct DocumentWrite {
    fields: Map<String, Value>,
}

impl FirestoreDocumentStore {
    #[must_use]
    pub fn new(client: reqwest::Client, auth: GcpAuth, config: &FirestoreConfig) -> Self {
        Self {
            client,
            auth,
            documents_root: config.documents_root(),
        }
    }

    /// Appends each path segment percent-encoded, so ids containing `?`,
    /// `#` or `%` still address the right document.
    fn document_url(&self, path: &DocumentPath) -> StoreResult<Url> {
        let mut url = Url::parse(&self.documents_root)
            .map_err(|err| StoreError::InvalidUrl(format!("{}: {err}", self.documents_root)))?;
        url.path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(self.documents_root.clone()))?
            .extend(path.segments());
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let request = self.auth.authorize(self.client.get(self.document_url(path)?)).await?;
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(document = %path, "firestore document absent");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }
        let document: FirestoreDocument = response.json().await?;
        let fields = decode_fields(document.fields)?;
        Ok(Some(Document::new(path.clone(), fields)))
    }

    async fn merge_fields(
        &self,
        path: &DocumentPath,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|name| ("updateMask.fieldPaths", quote_field_path(name)))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let body = DocumentWrite {
            fields: encode_fields(fields),
        };
        let request = self
            .client
            .patch(self.document_url(path)?)
            .query(&query)
            .json(&body);
        let response = self.auth.authorize(request).await?.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            return Err(status_error(response).await);
        }
        Ok(())
    }
}

async fn status_error(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::Status { status, body }
}

/// Field paths that are not plain identifiers must be backtick-quoted.
fn quote_field_path(name: &str) -> String {
    let mut chars = name.chars();
    let simple = chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

fn decode_fields(fields: Map<String, Value>) -> StoreResult<Map<String, Value>> {
    fields
        .into_iter()
        .map(|(name, value)| decode_value(value).map(|value| (name, value)))
        .collect()
}

/// Converts a Firestore typed value (`{"stringValue": "x"}`) into plain JSON.
fn decode_value(value: Value) -> StoreResult<Value> {
    let typed = match value {
        Value::Object(typed) => typed,
        other => {
            return Err(StoreError::Decode(format!(
                "expected a typed value, found {other}"
            )));
        }
    };
    let Some((kind, inner)) = typed.into_iter().next() else {
        return Err(StoreError::Decode("empty typed value".to_string()));
    };
    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "stringValue" | "timestampValue" | "referenceValue"
        | "bytesValue" | "geoPointValue" => Ok(inner),
        "integerValue" => decode_integer(&inner),
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(values)) => values.clone(),
                _ => Vec::new(),
            };
            values
                .into_iter()
                .map(decode_value)
                .collect::<StoreResult<Vec<_>>>()
                .map(Value::Array)
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(Value::Object(fields)) => fields.clone(),
                _ => Map::new(),
            };
            decode_fields(fields).map(Value::Object)
        }
        other => Err(StoreError::Decode(format!("unsupported value type {other}"))),
    }
}

fn decode_integer(inner: &Value) -> StoreResult<Value> {
    match inner {
        Value::String(raw) => raw
            .parse::<i64>()
            .map(|number| Value::Number(number.into()))
            .map_err(|err| StoreError::Decode(format!("invalid integerValue {raw}: {err}"))),
        Value::Number(_) => Ok(inner.clone()),
        other => Err(StoreError::Decode(format!("invalid integerValue {other}"))),
    }
}

fn encode_fields(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(name, value)| (name, encode_value(value)))
        .collect()
}

fn encode_value(value: Value) -> Value {
    let (kind, inner) = match value {
        Value::Null => ("nullValue", Value::Null),
        Value::Bool(flag) => ("booleanValue", Value::Bool(flag)),
        Value::Number(number) => encode_number(&number),
        Value::String(text) => ("stringValue", Value::String(text)),
        Value::Array(values) => {
            let values = values.into_iter().map(encode_value).collect();
            let mut array = Map::new();
            array.insert("values".to_string(), Value::Array(values));
            ("arrayValue", Value::Object(array))
        }
        Value::Object(fields) => {
            let mut map = Map::new();
            map.insert("fields".to_string(), Value::Object(encode_fields(fields)));
            ("mapValue", Value::Object(map))
        }
    };
    let mut typed = Map::new();
    typed.insert(kind.to_string(), inner);
    Value::Object(typed)
}

fn encode_number(number: &Number) -> (&'static str, Value) {
    if let Some(integer) = number.as_i64() {
        ("integerValue", Value::String(integer.to_string()))
    } else {
        ("doubleValue", Value::Number(number.clone()))
    }
}
