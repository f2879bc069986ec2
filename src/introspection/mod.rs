//! Schema introspection for document collections
//!
//! This module infers a structural schema from a sample of documents, with
//! no prior model definition.
//!
//! ## Features
//!
//! - **Type inference** - Per-field type tags merged across sampled documents
//! - **Nesting** - Recursive object and array element definitions
//! - **Nullability** - Explicit nulls and, by default, missing fields
//! - **Mixed fallback** - Polymorphic, unsupported, empty or overly wide shapes
//! - **References** - Fields whose values resolve to another collection's primary key
//!
//! ## Example
//!
//! ```rust,ignore
//! use docstore_introspect::connector::MemoryDataSource;
//! use docstore_introspect::introspection::Introspector;
//! use serde_json::json;
//!
//! let source = MemoryDataSource::new()
//!     .with_collection("customers", vec![json!({ "_id": "c1" })])
//!     .with_collection("orders", vec![json!({ "_id": "o1", "customerId": "c1" })]);
//!
//! let schema = Introspector::new().introspect(&source).await?;
//! println!("{}", serde_json::to_string_pretty(&schema)?);
//! ```

mod candidates;
mod classifier;
mod config;
mod error;
mod introspector;
mod schema_file;
mod structure;
mod types;
mod verification;

pub use candidates::{CandidatesByModel, find_candidates, primary_key_type};
pub use classifier::{canonical_key, classify};
pub use config::{IntrospectionConfig, IntrospectionConfigBuilder};
pub use error::IntrospectionError;
pub use introspector::{IntrospectionReport, Introspector};
#[cfg(feature = "native-fs")]
pub use schema_file::{load_schema, resolve_schema, save_schema};
pub use schema_file::{SchemaFormat, SchemaSource, parse_schema, serialize_schema};
pub use structure::{analyze_collection, analyze_collections, walk};
pub use types::{
    ModelStudy, ModelStudyDef, NodeId, NodeRef, NodeStudy, NodeStudyDef, Primitive, Reservoir,
    StudyTree,
};
pub use verification::{References, verify_candidates};
