//! Configuration for collection introspection

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::IntrospectionError;

/// Configuration for collection introspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntrospectionConfig {
    /// Maximum number of documents sampled per collection
    pub max_documents: usize,

    /// Maximum number of raw values kept per node for reference verification
    pub max_reference_samples: usize,

    /// Objects with more distinct keys than this resolve to `Mixed`
    pub max_object_keys: usize,

    /// Name of the field holding each document's unique identifier
    pub primary_key: String,

    /// Longest string (in characters) still considered a possible reference
    pub max_reference_string_length: usize,

    /// Largest binary payload (in bytes) still considered a possible reference
    pub max_reference_binary_length: usize,

    /// Maximum nesting depth walked before values are recorded as `Mixed`
    pub max_depth: usize,

    /// Treat a field missing from some documents the same as an explicit null
    pub missing_as_null: bool,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            max_documents: 100,
            max_reference_samples: 10,
            max_object_keys: 30,
            primary_key: "_id".to_string(),
            max_reference_string_length: 36,
            max_reference_binary_length: 16,
            max_depth: 64,
            missing_as_null: true,
        }
    }
}

impl IntrospectionConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> IntrospectionConfigBuilder {
        IntrospectionConfigBuilder::default()
    }

    /// Parse a configuration from TOML; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, IntrospectionError> {
        let mut config: Self =
            toml::from_str(content).map_err(|e| IntrospectionError::Config(e.to_string()))?;
        config.max_depth = config.max_depth.max(1);
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IntrospectionError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            IntrospectionError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

/// Builder for IntrospectionConfig
#[derive(Debug, Default)]
pub struct IntrospectionConfigBuilder {
    config: IntrospectionConfig,
}

impl IntrospectionConfigBuilder {
    /// Set the number of documents sampled per collection
    pub fn max_documents(mut self, max: usize) -> Self {
        self.config.max_documents = max;
        self
    }

    /// Set the reservoir size used for reference verification
    pub fn max_reference_samples(mut self, max: usize) -> Self {
        self.config.max_reference_samples = max;
        self
    }

    /// Set the key count above which objects collapse to `Mixed`
    pub fn max_object_keys(mut self, max: usize) -> Self {
        self.config.max_object_keys = max;
        self
    }

    /// Set the primary key field name
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.config.primary_key = field.into();
        self
    }

    /// Set the longest string considered a possible reference
    pub fn max_reference_string_length(mut self, max: usize) -> Self {
        self.config.max_reference_string_length = max;
        self
    }

    /// Set the largest binary payload considered a possible reference
    pub fn max_reference_binary_length(mut self, max: usize) -> Self {
        self.config.max_reference_binary_length = max;
        self
    }

    /// Set the maximum nesting depth (at least 1)
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth.max(1);
        self
    }

    /// Set whether missing fields count as nullable
    pub fn missing_as_null(mut self, missing_as_null: bool) -> Self {
        self.config.missing_as_null = missing_as_null;
        self
    }

    /// Build the configuration
    pub fn build(self) -> IntrospectionConfig {
        self.config
    }
}
