//! JSON Lines data source
//!
//! Reads a directory in which every `<collection>.jsonl` file holds one
//! collection, one document per line. Used to introspect exported dumps
//! without a live database.
//!
//! ## Security
//!
//! Collection names are validated before they are turned into paths: a name
//! must be a single plain path component, so separators and ".." are
//! rejected. Files whose stem would be refused are left out of the listing.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use super::{ConnectorError, DataSource, DocumentStream};
use crate::introspection::canonical_key;

const EXTENSION: &str = "jsonl";

/// JSON Lines directory data source
pub struct JsonLinesDataSource {
    base_path: PathBuf,
}

impl JsonLinesDataSource {
    /// Create a data source over a directory
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use docstore_introspect::connector::JsonLinesDataSource;
    ///
    /// let source = JsonLinesDataSource::new("/exports/shop");
    /// ```
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Resolve the file backing a collection
    ///
    /// The name must be a single plain path component; `..`, `.` and
    /// separators are rejected, dots inside a name are not.
    fn collection_path(&self, collection: &str) -> Result<PathBuf, ConnectorError> {
        let mut components = Path::new(collection).components();
        let plain = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );

        if !plain || collection.contains(['/', '\\']) {
            return Err(ConnectorError::InvalidCollection(collection.to_string()));
        }

        Ok(self.base_path.join(format!("{collection}.{EXTENSION}")))
    }

    async fn open(&self, collection: &str) -> Result<File, ConnectorError> {
        let path = self.collection_path(collection)?;

        File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConnectorError::CollectionNotFound(collection.to_string())
            } else {
                ConnectorError::Io(format!("Failed to open {}: {}", path.display(), e))
            }
        })
    }
}

#[async_trait]
impl DataSource for JsonLinesDataSource {
    async fn collection_names(&self) -> Result<Vec<String>, ConnectorError> {
        let mut read_dir = fs::read_dir(&self.base_path).await.map_err(|e| {
            ConnectorError::Connection(format!(
                "Failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let mut names = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ConnectorError::Io(format!("Failed to read directory entry: {}", e)))?
        {
            let path = entry.path();
            if let Ok(file_type) = entry.file_type().await
                && file_type.is_file()
                && path.extension().is_some_and(|ext| ext == EXTENSION)
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && self.collection_path(stem).is_ok()
            {
                names.push(stem.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn find<'a>(
        &'a self,
        collection: &'a str,
        limit: usize,
    ) -> Result<DocumentStream<'a>, ConnectorError> {
        let lines = BufReader::new(self.open(collection).await?).lines();

        let documents = stream::unfold((lines, 0usize), move |(mut lines, mut line_no)| async move {
            loop {
                line_no += 1;
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                        Ok(document) => return Some((Ok(document), (lines, line_no))),
                        Err(e) => {
                            warn!(
                                collection,
                                line = line_no,
                                error = %e,
                                "Skipping unparsable document"
                            );
                        }
                    },
                    Ok(None) => return None,
                    Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                        let error = ConnectorError::Decode(format!(
                            "{collection} line {line_no} is not valid UTF-8: {e}"
                        ));
                        return Some((Err(error), (lines, line_no)));
                    }
                    Err(e) => {
                        let error = ConnectorError::Io(format!(
                            "Failed to read {collection} at line {line_no}: {e}"
                        ));
                        return Some((Err(error), (lines, line_no)));
                    }
                }
            }
        });

        Ok(documents.take(limit).boxed())
    }

    async fn find_existing_ids(
        &self,
        collection: &str,
        primary_key: &str,
        ids: &[Value],
    ) -> Result<Vec<Value>, ConnectorError> {
        let wanted: HashSet<String> = ids.iter().map(canonical_key).collect();
        let mut documents = self.find(collection, usize::MAX).await?;
        let mut found = Vec::new();

        while let Some(document) = documents.try_next().await? {
            if let Some(id) = document.get(primary_key)
                && wanted.contains(&canonical_key(id))
            {
                found.push(id.clone());
            }
        }

        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_rejects_path_traversal() {
        let source = JsonLinesDataSource::new("/tmp");
        for name in ["../etc/passwd", "a/b", "a\\b", "", "..", "."] {
            assert!(matches!(
                source.collection_path(name),
                Err(ConnectorError::InvalidCollection(_))
            ));
        }
    }

    #[test]
    fn test_dotted_names_are_valid() {
        let source = JsonLinesDataSource::new("/tmp");
        for name in ["logs..2024", "v1.2", "..hidden"] {
            assert_eq!(
                source.collection_path(name).unwrap(),
                Path::new("/tmp").join(format!("{name}.jsonl"))
            );
        }
    }

    #[test]
    fn test_listed_collections_are_readable() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("users.jsonl"), "{\"a\": 1}\n").unwrap();
            std::fs::write(temp.path().join("logs..2024.jsonl"), "{\"b\": 2}\n").unwrap();
            std::fs::write(temp.path().join("..jsonl"), "{}\n").unwrap();

            let source = JsonLinesDataSource::new(temp.path());
            let names = source.collection_names().await.unwrap();
            assert_eq!(names, vec!["logs..2024", "users"]);

            for name in &names {
                let documents: Vec<Value> = source
                    .find(name, 10)
                    .await
                    .unwrap()
                    .try_collect()
                    .await
                    .unwrap();
                assert_eq!(documents.len(), 1);
            }
        });
    }

    #[test]
    fn test_lists_jsonl_files_only() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("users.jsonl"), "{}\n").unwrap();
            std::fs::write(temp.path().join("orders.jsonl"), "{}\n").unwrap();
            std::fs::write(temp.path().join("notes.txt"), "x").unwrap();

            let source = JsonLinesDataSource::new(temp.path());
            let names = source.collection_names().await.unwrap();
            assert_eq!(names, vec!["orders", "users"]);
        });
    }

    #[test]
    fn test_skips_blank_and_invalid_lines() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            std::fs::write(
                temp.path().join("items.jsonl"),
                "{\"a\": 1}\n\nnot json\n{\"a\": 2}\n{\"a\": 3}\n",
            )
            .unwrap();

            let source = JsonLinesDataSource::new(temp.path());
            let documents: Vec<Value> = source
                .find("items", 2)
                .await
                .unwrap()
                .try_collect()
                .await
                .unwrap();

            assert_eq!(documents, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
        });
    }

    #[test]
    fn test_invalid_utf8_is_a_decode_error() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            std::fs::write(temp.path().join("raw.jsonl"), b"{\"a\": 1}\n\xff\xfe\n").unwrap();

            let source = JsonLinesDataSource::new(temp.path());
            let mut documents = source.find("raw", 10).await.unwrap();
            assert!(documents.try_next().await.unwrap().is_some());
            assert!(matches!(
                documents.try_next().await,
                Err(ConnectorError::Decode(_))
            ));
        });
    }

    #[test]
    fn test_missing_collection() {
        let rt = runtime();
        rt.block_on(async {
            let temp = TempDir::new().unwrap();
            let source = JsonLinesDataSource::new(temp.path());
            let result = source.find("ghost", 10).await;
            assert!(matches!(result, Err(ConnectorError::CollectionNotFound(_))));
        });
    }
}
