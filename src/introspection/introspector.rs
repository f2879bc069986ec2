//! Introspection orchestration
//!
//! Drives sampling, candidate finding and verification, then resolves each
//! collection's statistics into an immutable [`ModelStudyDef`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::candidates::find_candidates;
use super::config::IntrospectionConfig;
use super::error::IntrospectionError;
use super::structure::analyze_collections;
use super::types::{ModelStudy, ModelStudyDef, NodeId, NodeRef, NodeStudyDef, Primitive};
use super::verification::{References, verify_candidates};
use crate::connector::DataSource;

/// Summary of an introspection run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionReport {
    /// Documents walked, by collection
    pub documents_sampled: BTreeMap<String, usize>,
    /// Candidate (node, target) pairs proposed before verification
    pub reference_candidates: usize,
    /// Verified references present in the resolved definitions
    pub references_verified: usize,
}

/// Collection introspector
///
/// Infers one schema definition per collection of a [`DataSource`].
#[derive(Debug, Clone, Default)]
pub struct Introspector {
    config: IntrospectionConfig,
}

impl Introspector {
    /// Create an introspector with default configuration
    pub fn new() -> Self {
        Self::with_config(IntrospectionConfig::default())
    }

    /// Create an introspector with custom configuration
    pub fn with_config(config: IntrospectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IntrospectionConfig {
        &self.config
    }

    /// Infer the schema of every collection, sorted by collection name
    pub async fn introspect(
        &self,
        source: &dyn DataSource,
    ) -> Result<Vec<ModelStudyDef>, IntrospectionError> {
        let (definitions, _) = self.introspect_with_report(source).await?;
        Ok(definitions)
    }

    /// Infer every collection's schema and report what was sampled
    pub async fn introspect_with_report(
        &self,
        source: &dyn DataSource,
    ) -> Result<(Vec<ModelStudyDef>, IntrospectionReport), IntrospectionError> {
        let mut names = source
            .collection_names()
            .await
            .map_err(IntrospectionError::Listing)?;
        names.sort();
        names.dedup();

        info!(
            collections = names.len(),
            max_documents = self.config.max_documents,
            "Starting introspection"
        );

        let studies = analyze_collections(source, &names, &self.config).await?;
        let candidates = find_candidates(&studies, &self.config.primary_key);
        let references =
            verify_candidates(source, &studies, &candidates, &self.config.primary_key).await;

        let definitions = self.resolve(&studies, &references);
        let report = IntrospectionReport {
            documents_sampled: studies
                .iter()
                .map(|s| (s.name.clone(), s.documents))
                .collect(),
            reference_candidates: candidates.values().map(Vec::len).sum(),
            references_verified: definitions
                .iter()
                .map(|d| count_references(&d.analysis))
                .sum(),
        };

        if report.references_verified < references.len() {
            debug!(
                verified = references.len(),
                emitted = report.references_verified,
                "References below a Mixed node were dropped"
            );
        }

        info!(
            collections = studies.len(),
            candidates = report.reference_candidates,
            references = report.references_verified,
            "Introspection complete"
        );

        Ok((definitions, report))
    }

    /// Resolve sampled statistics into definitions, sorted by collection name
    pub fn resolve(&self, studies: &[ModelStudy], references: &References) -> Vec<ModelStudyDef> {
        let mut definitions: Vec<ModelStudyDef> = studies
            .iter()
            .enumerate()
            .map(|(model, study)| ModelStudyDef {
                name: study.name.clone(),
                analysis: self.resolve_node(study, model, study.tree.root(), false, references),
            })
            .collect();

        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    fn resolve_node(
        &self,
        study: &ModelStudy,
        model: usize,
        id: NodeId,
        missing: bool,
        references: &References,
    ) -> NodeStudyDef {
        let node = study.tree.node(id);
        let nullable =
            node.count(Primitive::Null) > 0 || (self.config.missing_as_null && missing);

        let node_type = match node.single_type() {
            Some(Primitive::Object) => match &node.object {
                Some(children) if children.is_empty() => Primitive::Mixed,
                Some(children) if children.len() > self.config.max_object_keys => {
                    debug!(
                        collection = %study.name,
                        keys = children.len(),
                        "Too many object keys, resolving as Mixed"
                    );
                    Primitive::Mixed
                }
                Some(_) => Primitive::Object,
                None => Primitive::Mixed,
            },
            Some(Primitive::Array) if node.array_element.is_none() => Primitive::Mixed,
            Some(node_type) => node_type,
            None => Primitive::Mixed,
        };

        let mut definition = NodeStudyDef::mixed(nullable);
        definition.node_type = node_type;
        definition.reference_to = references.get(&NodeRef { model, node: id }).cloned();

        match node_type {
            Primitive::Array => {
                definition.array_element = node.array_element.map(|element| {
                    Box::new(self.resolve_node(study, model, element, false, references))
                });
            }
            Primitive::Object => {
                let observed = node.count(Primitive::Object);
                definition.object = node.object.as_ref().map(|children| {
                    children
                        .iter()
                        .map(|(key, child)| {
                            let absent = study.tree.node(*child).seen < observed;
                            let resolved =
                                self.resolve_node(study, model, *child, absent, references);
                            (key.clone(), resolved)
                        })
                        .collect()
                });
            }
            _ => {}
        }

        definition
    }
}

/// Number of `referenceTo` annotations in a resolved definition tree
fn count_references(definition: &NodeStudyDef) -> usize {
    let own = usize::from(definition.reference_to.is_some());
    let element = definition.array_element.as_deref().map_or(0, count_references);
    let fields: usize = definition
        .object
        .iter()
        .flat_map(|children| children.values())
        .map(count_references)
        .sum();

    own + element + fields
}
