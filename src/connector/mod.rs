//! Data source abstraction
//!
//! Defines the DataSource trait the introspector reads documents through, and
//! the implementations shipped with the crate:
//! - MemoryDataSource: collections held in memory
//! - JsonLinesDataSource: one `.jsonl` file per collection (native only)

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;

/// Stream of documents produced by a capped collection read
pub type DocumentStream<'a> = BoxStream<'a, Result<Value, ConnectorError>>;

/// Error type for data source operations
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Trait for document stores the introspector can sample
///
/// Implementations must be safe for concurrent read-only use: collections are
/// scanned and verified concurrently from a single task.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// List the names of all collections
    async fn collection_names(&self) -> Result<Vec<String>, ConnectorError>;

    /// Stream at most `limit` documents from a collection, in no particular order
    async fn find<'a>(
        &'a self,
        collection: &'a str,
        limit: usize,
    ) -> Result<DocumentStream<'a>, ConnectorError>;

    /// Return the subset of `ids` that exist as `primary_key` values in a collection
    async fn find_existing_ids(
        &self,
        collection: &str,
        primary_key: &str,
        ids: &[Value],
    ) -> Result<Vec<Value>, ConnectorError>;
}

pub mod memory;

#[cfg(feature = "native-fs")]
pub mod jsonl;

pub use memory::MemoryDataSource;

#[cfg(feature = "native-fs")]
pub use jsonl::JsonLinesDataSource;
