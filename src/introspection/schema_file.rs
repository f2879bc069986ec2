//! Schema file persistence
//!
//! Resolved definitions are written once and may be supplied back on later
//! runs instead of rescanning the store. The file format follows the
//! extension: `.yaml`/`.yml` is YAML, anything else is pretty-printed JSON.

use std::path::{Path, PathBuf};

use super::error::IntrospectionError;
use super::types::ModelStudyDef;

#[cfg(feature = "native-fs")]
use super::introspector::Introspector;
#[cfg(feature = "native-fs")]
use crate::connector::DataSource;
#[cfg(feature = "native-fs")]
use tracing::{info, warn};

/// Serialization format of a schema file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                SchemaFormat::Yaml
            }
            _ => SchemaFormat::Json,
        }
    }
}

/// Where schema definitions come from
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Definitions supplied by the caller
    Precomputed(Vec<ModelStudyDef>),
    /// A schema file, created by introspection when absent
    File(PathBuf),
}

/// Serialize definitions in the given format
pub fn serialize_schema(
    definitions: &[ModelStudyDef],
    format: SchemaFormat,
) -> Result<String, IntrospectionError> {
    Ok(match format {
        SchemaFormat::Json => serde_json::to_string_pretty(definitions)?,
        SchemaFormat::Yaml => serde_yaml::to_string(definitions)?,
    })
}

/// Parse definitions in the given format
pub fn parse_schema(
    content: &str,
    format: SchemaFormat,
) -> Result<Vec<ModelStudyDef>, IntrospectionError> {
    Ok(match format {
        SchemaFormat::Json => serde_json::from_str(content)?,
        SchemaFormat::Yaml => serde_yaml::from_str(content)?,
    })
}

/// Write definitions to a schema file, creating parent directories
#[cfg(feature = "native-fs")]
pub async fn save_schema(
    path: impl AsRef<Path>,
    definitions: &[ModelStudyDef],
) -> Result<(), IntrospectionError> {
    let path = path.as_ref();
    let content = serialize_schema(definitions, SchemaFormat::from_path(path))?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| schema_file_error(path, e))?;
    }

    tokio::fs::write(path, content)
        .await
        .map_err(|e| schema_file_error(path, e))
}

/// Read definitions from a schema file
#[cfg(feature = "native-fs")]
pub async fn load_schema(path: impl AsRef<Path>) -> Result<Vec<ModelStudyDef>, IntrospectionError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| schema_file_error(path, e))?;

    parse_schema(&content, SchemaFormat::from_path(path)).map_err(|e| schema_file_error(path, e))
}

/// Resolve definitions from a schema source
///
/// Precomputed definitions and readable schema files are returned as-is and
/// never re-validated against the store, unless `force_rescan` is set. A
/// missing or unreadable schema file is regenerated by introspection.
#[cfg(feature = "native-fs")]
pub async fn resolve_schema(
    source: SchemaSource,
    data_source: &dyn DataSource,
    introspector: &Introspector,
    force_rescan: bool,
) -> Result<Vec<ModelStudyDef>, IntrospectionError> {
    match source {
        SchemaSource::Precomputed(definitions) if !force_rescan => Ok(definitions),
        SchemaSource::Precomputed(_) => introspector.introspect(data_source).await,
        SchemaSource::File(path) => {
            if !force_rescan {
                match load_schema(&path).await {
                    Ok(definitions) => {
                        info!(path = %path.display(), "Using existing schema file");
                        return Ok(definitions);
                    }
                    Err(e) => {
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "Schema file unavailable, introspecting"
                        );
                    }
                }
            }

            let definitions = introspector.introspect(data_source).await?;
            save_schema(&path, &definitions).await?;
            info!(
                path = %path.display(),
                collections = definitions.len(),
                "Schema file written"
            );
            Ok(definitions)
        }
    }
}

#[cfg(feature = "native-fs")]
fn schema_file_error(path: &Path, reason: impl std::fmt::Display) -> IntrospectionError {
    IntrospectionError::SchemaFile {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}
