use std::sync::Arc;

use async_trait::async_trait;
use enrich_store::models::{Document, DocumentPath};
use serde::de::IgnoredAny;
use serde_json::{Map, Value};
use surrealdb::{Connection, Surreal};

use super::{DocumentStore, StoreError, StoreResult};

/// `SurrealDB`-backed document store.
///
/// A document path maps onto a record: the full collection path names the
/// table and the last segment is the record id, so `shops/s1/products/abc`
/// lives in table `shops/s1/products` under id `abc`. Distinct paths never
/// share a record.
pub struct SurrealDocumentStore<C: Connection> {
    db: Arc<Surreal<C>>,
}

impl<C: Connection> Clone for SurrealDocumentStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealDocumentStore<C> {
    #[must_use]
    pub fn new(db: Surreal<C>) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Creates or replaces a document with exactly `fields`.
    ///
    /// # Errors
    /// Returns `StoreError` if the database write fails.
    pub async fn put(&self, path: &DocumentPath, fields: Map<String, Value>) -> StoreResult<()> {
        let (table, id) = record_key(path);
        let query = "UPSERT type::thing($table, $id) CONTENT $data RETURN NONE;";
        self.db
            .query(query)
            .bind(("table", table))
            .bind(("id", id))
            .bind(("data", Value::Object(fields)))
            .await?
            .check()?;
        Ok(())
    }

    async fn select(&self, path: &DocumentPath) -> StoreResult<Option<Map<String, Value>>> {
        let (table, id) = record_key(path);
        let query = "SELECT * OMIT id FROM ONLY type::thing($table, $id);";
        let mut response = self
            .db
            .query(query)
            .bind(("table", table))
            .bind(("id", id))
            .await?;
        let record: Option<Value> = response.take(0)?;
        match record {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(fields)) => Ok(Some(fields)),
            Some(other) => Err(StoreError::Decode(format!(
                "expected an object record at {path}, found {other}"
            ))),
        }
    }
}

#[async_trait]
impl<C: Connection> DocumentStore for SurrealDocumentStore<C> {
    async fn get(&self, path: &DocumentPath) -> StoreResult<Option<Document>> {
        let fields = self.select(path).await?;
        Ok(fields.map(|fields| Document::new(path.clone(), fields)))
    }

    async fn merge_fields(
        &self,
        path: &DocumentPath,
        fields: Map<String, Value>,
    ) -> StoreResult<()> {
        let (table, id) = record_key(path);
        let query = "UPDATE type::thing($table, $id) MERGE $data RETURN AFTER;";
        let mut response = self
            .db
            .query(query)
            .bind(("table", table))
            .bind(("id", id))
            .bind(("data", Value::Object(fields)))
            .await?;
        let updated: Vec<IgnoredAny> = response.take(0)?;
        if updated.is_empty() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(())
    }
}

fn record_key(path: &DocumentPath) -> (String, String) {
    (path.collection().to_string(), path.document_id().to_string())
}
