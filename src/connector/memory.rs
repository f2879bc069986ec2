//! In-memory data source
//!
//! Holds collections as vectors of documents. Useful for tests and for
//! introspecting data that has already been loaded by other means.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use serde_json::Value;

use super::{ConnectorError, DataSource, DocumentStream};
use crate::introspection::canonical_key;

/// In-memory data source
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    collections: BTreeMap<String, Vec<Value>>,
}

impl MemoryDataSource {
    /// Create an empty data source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a collection
    pub fn with_collection(mut self, name: impl Into<String>, documents: Vec<Value>) -> Self {
        self.insert_collection(name, documents);
        self
    }

    /// Add (or replace) a collection in place
    pub fn insert_collection(&mut self, name: impl Into<String>, documents: Vec<Value>) {
        self.collections.insert(name.into(), documents);
    }

    fn documents(&self, collection: &str) -> Result<&[Value], ConnectorError> {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .ok_or_else(|| ConnectorError::CollectionNotFound(collection.to_string()))
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn collection_names(&self) -> Result<Vec<String>, ConnectorError> {
        Ok(self.collections.keys().cloned().collect())
    }

    async fn find<'a>(
        &'a self,
        collection: &'a str,
        limit: usize,
    ) -> Result<DocumentStream<'a>, ConnectorError> {
        let documents = self.documents(collection)?;
        let documents = documents.iter().take(limit).cloned();
        Ok(stream::iter(documents.map(Ok::<Value, ConnectorError>)).boxed())
    }

    async fn find_existing_ids(
        &self,
        collection: &str,
        primary_key: &str,
        ids: &[Value],
    ) -> Result<Vec<Value>, ConnectorError> {
        let wanted: HashSet<String> = ids.iter().map(canonical_key).collect();

        Ok(self
            .documents(collection)?
            .iter()
            .filter_map(|document| document.get(primary_key))
            .filter(|id| wanted.contains(&canonical_key(id)))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_find_respects_limit() {
        let source = MemoryDataSource::new()
            .with_collection("items", (0..5).map(|i| json!({ "_id": i })).collect());

        let documents: Vec<Value> = block_on(async {
            source
                .find("items", 3)
                .await
                .unwrap()
                .try_collect::<Vec<Value>>()
                .await
                .unwrap()
        });
        assert_eq!(documents.len(), 3);
    }

    #[test]
    fn test_unknown_collection() {
        let source = MemoryDataSource::new();
        let result = block_on(source.find_existing_ids("missing", "_id", &[]));
        assert!(matches!(result, Err(ConnectorError::CollectionNotFound(_))));
    }

    #[test]
    fn test_find_existing_ids_normalizes() {
        let source = MemoryDataSource::new().with_collection(
            "users",
            vec![
                json!({ "_id": { "$oid": "507f1f77bcf86cd799439011" } }),
                json!({ "_id": { "$oid": "507f1f77bcf86cd799439012" } }),
                json!({ "name": "no id" }),
            ],
        );

        let found = block_on(source.find_existing_ids(
            "users",
            "_id",
            &[
                json!({ "$oid": "507F1F77BCF86CD799439011" }),
                json!({ "$oid": "507f1f77bcf86cd799439099" }),
            ],
        ))
        .unwrap();

        assert_eq!(found, vec![json!({ "$oid": "507f1f77bcf86cd799439011" })]);
    }
}
