//! Document tree walking
//!
//! Merges sampled documents into a per-collection [`StudyTree`], counting the
//! type tags observed at every structural position and keeping a reservoir
//! of raw values for positions that may hold references.

use futures::TryStreamExt;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, trace};

use super::classifier::{binary_len, classify};
use super::config::IntrospectionConfig;
use super::error::IntrospectionError;
use super::types::{ModelStudy, NodeId, NodeStudy, Primitive, StudyTree};
use crate::connector::{ConnectorError, DataSource};

/// Merge one observed value into the tree at `node`
pub fn walk(tree: &mut StudyTree, node: NodeId, value: &Value, config: &IntrospectionConfig) {
    walk_at(tree, node, value, config, 0);
}

fn walk_at(
    tree: &mut StudyTree,
    node: NodeId,
    value: &Value,
    config: &IntrospectionConfig,
    depth: usize,
) {
    let mut tag = classify(value);

    match value {
        Value::Array(_) | Value::Object(_) if depth >= config.max_depth => {
            if matches!(tag, Primitive::Array | Primitive::Object) {
                trace!(depth, "Maximum depth reached, recording value as Mixed");
                tag = Primitive::Mixed;
            }
        }
        Value::Array(items) => {
            let element = tree.array_element(node);
            for item in items {
                walk_at(tree, element, item, config, depth + 1);
            }
        }
        Value::Object(fields) if tag == Primitive::Object => {
            tree.ensure_object(node);
            for (key, field) in fields {
                let child = tree.object_child(node, key);
                walk_at(tree, child, field, config, depth + 1);
            }
        }
        _ => {}
    }

    annotate(tree.node_mut(node), tag, value, config);
}

fn annotate(node: &mut NodeStudy, tag: Primitive, value: &Value, config: &IntrospectionConfig) {
    node.seen += 1;
    *node.types.entry(tag).or_insert(0) += 1;

    if !node.is_reference_candidate {
        return;
    }

    let single_type = node.non_null_types().count() <= 1;
    if single_type && is_reference_eligible(tag, value, config) {
        if !value.is_null() {
            node.reference_samples
                .offer(value, config.max_reference_samples);
        }
    } else {
        node.drop_candidacy();
    }
}

/// Whether a value of the given tag could be a reference to a primary key
pub fn is_reference_eligible(tag: Primitive, value: &Value, config: &IntrospectionConfig) -> bool {
    match tag {
        Primitive::Null | Primitive::ObjectId => true,
        Primitive::Binary => {
            binary_len(value).is_some_and(|len| len <= config.max_reference_binary_length)
        }
        Primitive::String => value
            .as_str()
            .is_some_and(|s| s.chars().count() <= config.max_reference_string_length),
        _ => false,
    }
}

/// Sample a collection into a study tree
///
/// Reads at most `config.max_documents` documents. Any connector error aborts
/// the scan; no partial study is returned.
pub async fn analyze_collection(
    source: &dyn DataSource,
    name: &str,
    config: &IntrospectionConfig,
) -> Result<ModelStudy, IntrospectionError> {
    let scan_error = |err: ConnectorError| IntrospectionError::Scan {
        collection: name.to_string(),
        source: err,
    };

    let mut tree = StudyTree::new();
    let root = tree.root();
    let mut documents = 0;

    let mut cursor = source
        .find(name, config.max_documents)
        .await
        .map_err(scan_error)?;

    while documents < config.max_documents {
        let Some(document) = cursor.try_next().await.map_err(scan_error)? else {
            break;
        };
        walk(&mut tree, root, &document, config);
        documents += 1;
    }

    debug!(
        collection = name,
        documents,
        nodes = tree.len(),
        "Collection sampled"
    );

    Ok(ModelStudy {
        name: name.to_string(),
        tree,
        documents,
    })
}

/// Sample several collections concurrently, failing on the first error
pub async fn analyze_collections(
    source: &dyn DataSource,
    names: &[String],
    config: &IntrospectionConfig,
) -> Result<Vec<ModelStudy>, IntrospectionError> {
    try_join_all(
        names
            .iter()
            .map(|name| analyze_collection(source, name, config)),
    )
    .await
}
