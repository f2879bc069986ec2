//! Document Store Introspection - schema inference for schema-less collections
//!
//! Provides:
//! - Structural schema inference from sampled documents (types, nesting, nullability)
//! - Reference detection between collections, verified against live data
//! - Data source abstraction with in-memory and JSON Lines implementations
//! - Schema file persistence (JSON/YAML) and JSON Schema export

pub mod connector;
pub mod introspection;

// Re-export commonly used types
#[cfg(feature = "native-fs")]
pub use connector::JsonLinesDataSource;
pub use connector::{ConnectorError, DataSource, MemoryDataSource};

pub use introspection::{
    IntrospectionConfig, IntrospectionError, IntrospectionReport, Introspector, ModelStudyDef,
    NodeStudyDef, Primitive, SchemaSource,
};
