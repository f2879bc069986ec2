//! Reference candidate verification
//!
//! For each target collection, queries the store once for the union of all
//! candidate samples and keeps only the candidates whose every sample exists.

use std::collections::{BTreeMap, HashSet};

use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use super::candidates::CandidatesByModel;
use super::classifier::canonical_key;
use super::types::{ModelStudy, NodeRef};
use crate::connector::DataSource;

/// Verified references: node → referenced collection
pub type References = BTreeMap<NodeRef, String>;

/// Filter out every candidate whose samples cannot all be found
///
/// Targets are verified concurrently. A store failure while verifying one
/// target rejects that target's candidates without failing the run.
pub async fn verify_candidates(
    source: &dyn DataSource,
    studies: &[ModelStudy],
    candidates: &CandidatesByModel,
    primary_key: &str,
) -> References {
    let verified = join_all(candidates.iter().map(|(target, nodes)| async move {
        let confirmed = verify_for_model(source, studies, target, nodes, primary_key).await;
        (target, confirmed)
    }))
    .await;

    // Targets iterate in name order, so a node verified against several
    // collections keeps the alphabetically first one
    let mut references = References::new();
    for (target, nodes) in verified {
        for node in nodes {
            if let Some(existing) = references.get(&node) {
                debug!(
                    kept = %existing,
                    also = %target,
                    "Reference verified against several collections"
                );
                continue;
            }
            references.insert(node, target.clone());
        }
    }

    references
}

/// Verify the candidates of a single target collection
async fn verify_for_model(
    source: &dyn DataSource,
    studies: &[ModelStudy],
    target: &str,
    nodes: &[NodeRef],
    primary_key: &str,
) -> Vec<NodeRef> {
    let mut seen = HashSet::new();
    let samples: Vec<Value> = nodes
        .iter()
        .flat_map(|r| samples_of(studies, *r))
        .filter(|sample| seen.insert(canonical_key(sample)))
        .cloned()
        .collect();

    if samples.is_empty() {
        return Vec::new();
    }

    let found: HashSet<String> = match source
        .find_existing_ids(target, primary_key, &samples)
        .await
    {
        Ok(ids) => ids.iter().map(canonical_key).collect(),
        Err(e) => {
            warn!(
                model = %target,
                error = %e,
                "Reference verification failed, rejecting candidates"
            );
            return Vec::new();
        }
    };

    let confirmed: Vec<NodeRef> = nodes
        .iter()
        .copied()
        .filter(|r| {
            let mut samples = samples_of(studies, *r).peekable();
            samples.peek().is_some()
                && samples.all(|sample| found.contains(&canonical_key(sample)))
        })
        .collect();

    debug!(
        model = %target,
        candidates = nodes.len(),
        samples = samples.len(),
        confirmed = confirmed.len(),
        "References verified"
    );

    confirmed
}

fn samples_of(studies: &[ModelStudy], node: NodeRef) -> impl Iterator<Item = &Value> {
    studies[node.model]
        .tree
        .node(node.node)
        .reference_samples
        .values()
        .iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::MemoryDataSource;
    use crate::introspection::candidates::find_candidates;
    use crate::introspection::config::IntrospectionConfig;
    use crate::introspection::structure::walk;
    use crate::introspection::types::StudyTree;
    use serde_json::json;

    fn study(name: &str, documents: &[Value]) -> ModelStudy {
        let config = IntrospectionConfig::default();
        let mut tree = StudyTree::new();
        let root = tree.root();
        for document in documents {
            walk(&mut tree, root, document, &config);
        }
        ModelStudy {
            name: name.to_string(),
            tree,
            documents: documents.len(),
        }
    }

    fn run(source: &MemoryDataSource, studies: &[ModelStudy]) -> References {
        let candidates = find_candidates(studies, "_id");
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(verify_candidates(source, studies, &candidates, "_id"))
    }

    #[test]
    fn test_confirms_resolving_candidates() {
        let customers = vec![json!({ "_id": "c1" }), json!({ "_id": "c2" })];
        let orders = vec![
            json!({ "_id": "o1", "customer": "c1" }),
            json!({ "_id": "o2", "customer": "c2" }),
        ];
        let source = MemoryDataSource::new()
            .with_collection("customers", customers.clone())
            .with_collection("orders", orders.clone());
        let studies = vec![study("customers", &customers), study("orders", &orders)];

        let references = run(&source, &studies);

        let customer_node = studies[1].tree.root_field("customer").unwrap();
        assert_eq!(
            references.get(&NodeRef { model: 1, node: customer_node }),
            Some(&"customers".to_string())
        );
        // customer is also proposed for orders but does not resolve there
        assert_eq!(references.len(), 1);
    }

    #[test]
    fn test_one_dangling_sample_rejects_candidate() {
        let customers = vec![json!({ "_id": "c1" })];
        let orders = vec![
            json!({ "_id": "o1", "customer": "c1" }),
            json!({ "_id": "o2", "customer": "ghost" }),
        ];
        let source = MemoryDataSource::new()
            .with_collection("customers", customers.clone())
            .with_collection("orders", orders.clone());
        let studies = vec![study("customers", &customers), study("orders", &orders)];

        let references = run(&source, &studies);
        assert!(references.is_empty());
    }

    #[test]
    fn test_ambiguous_targets_keep_first_name() {
        let alpha = vec![json!({ "_id": "x" })];
        let beta = vec![json!({ "_id": "x" })];
        let links = vec![json!({ "_id": 1, "to": "x" })];
        let source = MemoryDataSource::new()
            .with_collection("alpha", alpha.clone())
            .with_collection("beta", beta.clone())
            .with_collection("links", links.clone());
        let studies = vec![
            study("alpha", &alpha),
            study("beta", &beta),
            study("links", &links),
        ];

        let references = run(&source, &studies);
        let to = studies[2].tree.root_field("to").unwrap();
        assert_eq!(
            references.get(&NodeRef { model: 2, node: to }),
            Some(&"alpha".to_string())
        );
    }

    #[test]
    fn test_object_id_representations_match() {
        let users = vec![json!({ "_id": { "$oid": "507f1f77bcf86cd799439011" } })];
        let posts = vec![json!({
            "_id": { "$oid": "507f1f77bcf86cd799439099" },
            "author": { "$oid": "507F1F77BCF86CD799439011" },
        })];
        let source = MemoryDataSource::new()
            .with_collection("users", users.clone())
            .with_collection("posts", posts.clone());
        let studies = vec![study("posts", &posts), study("users", &users)];

        let references = run(&source, &studies);
        let author = studies[0].tree.root_field("author").unwrap();
        assert_eq!(
            references.get(&NodeRef { model: 0, node: author }),
            Some(&"users".to_string())
        );
    }
}
