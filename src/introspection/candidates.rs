//! Reference candidate detection
//!
//! Walks every collection's tree and proposes the nodes whose single observed
//! type matches the primary-key type of some collection. Proposals are only
//! structural; [`super::verification`] confirms them against the store.

use std::collections::BTreeMap;

use tracing::debug;

use super::types::{ModelStudy, NodeId, NodeRef, Primitive};

/// Candidate reference nodes, keyed by the collection they may point at
pub type CandidatesByModel = BTreeMap<String, Vec<NodeRef>>;

/// Resolved type of a collection's primary key
///
/// `None` when the key is missing, only ever null, or polymorphic; such a
/// collection cannot be a reference target.
pub fn primary_key_type(study: &ModelStudy, primary_key: &str) -> Option<Primitive> {
    study
        .tree
        .root_field(primary_key)
        .and_then(|id| study.tree.node(id).single_type())
}

/// Index collection names by their primary-key type
pub fn models_by_pk_type(
    studies: &[ModelStudy],
    primary_key: &str,
) -> BTreeMap<Primitive, Vec<String>> {
    let mut index: BTreeMap<Primitive, Vec<String>> = BTreeMap::new();

    for study in studies {
        if let Some(pk_type) = primary_key_type(study, primary_key) {
            index.entry(pk_type).or_default().push(study.name.clone());
        }
    }

    index
}

/// Build the list of potential reference nodes per target collection
pub fn find_candidates(studies: &[ModelStudy], primary_key: &str) -> CandidatesByModel {
    let models_by_pk_type = models_by_pk_type(studies, primary_key);
    let mut candidates = CandidatesByModel::new();

    // The first level is walked here so each collection's own key is skipped
    for (model, study) in studies.iter().enumerate() {
        let root = study.tree.node(study.tree.root());
        for (key, child) in root.object.iter().flatten() {
            if key != primary_key {
                find_candidates_rec(study, model, *child, &models_by_pk_type, &mut candidates);
            }
        }
    }

    for (target, nodes) in &candidates {
        debug!(model = %target, candidates = nodes.len(), "Reference candidates found");
    }

    candidates
}

fn find_candidates_rec(
    study: &ModelStudy,
    model: usize,
    id: NodeId,
    models_by_pk_type: &BTreeMap<Primitive, Vec<String>>,
    candidates: &mut CandidatesByModel,
) {
    let node = study.tree.node(id);

    for child in node.object.iter().flat_map(|children| children.values()) {
        find_candidates_rec(study, model, *child, models_by_pk_type, candidates);
    }
    if let Some(element) = node.array_element {
        find_candidates_rec(study, model, element, models_by_pk_type, candidates);
    }

    if !node.is_reference_candidate {
        return;
    }

    // Null-only nodes have no single type and are skipped
    if let Some(node_type) = node.single_type() {
        for target in models_by_pk_type.get(&node_type).into_iter().flatten() {
            candidates
                .entry(target.clone())
                .or_default()
                .push(NodeRef { model, node: id });
        }
    }
}
