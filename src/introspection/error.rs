//! Error types for collection introspection

use thiserror::Error;

use crate::connector::ConnectorError;

/// Errors that can occur during introspection
#[derive(Error, Debug)]
pub enum IntrospectionError {
    /// The collection list could not be read from the data source
    #[error("Failed to list collections: {0}")]
    Listing(#[source] ConnectorError),

    /// A collection scan was interrupted; no partial schema is produced
    #[error("Failed to scan collection '{collection}': {source}")]
    Scan {
        collection: String,
        #[source]
        source: ConnectorError,
    },

    /// A schema file could not be read or written
    #[error("Schema file error: {path} - {reason}")]
    SchemaFile { path: String, reason: String },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl IntrospectionError {
    /// Get a user-friendly error message for CLI output
    pub fn user_message(&self) -> String {
        match self {
            IntrospectionError::Scan { collection, source } => format!(
                "Scanning '{collection}' failed: {source}\n\n\
                Hint: Check the connection to the data source and retry; no schema was written."
            ),
            IntrospectionError::SchemaFile { path, reason } => format!(
                "Cannot use schema file {path}: {reason}\n\n\
                Hint: Delete the file or force a rescan to regenerate it."
            ),
            IntrospectionError::Config(msg) => {
                format!("Invalid configuration: {msg}\n\nHint: Check your introspection settings.")
            }
            _ => self.to_string(),
        }
    }
}
