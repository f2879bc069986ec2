//! Introspection data model
//!
//! `NodeStudy` arenas are the mutable accumulators built while sampling;
//! `NodeStudyDef` trees are the immutable, serializable result.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::classifier::canonical_key;

/// Type tag observed for a sample value
///
/// `Null` only appears in observation counts, never as a resolved type.
/// `Mixed` is recorded for values that cannot be classified and is the
/// fallback resolved type for ambiguous structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Primitive {
    #[serde(rename = "null")]
    Null,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "object")]
    Object,
    Binary,
    Date,
    ObjectId,
    Mixed,
}

impl Primitive {
    /// Get the serialized name of this tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Null => "null",
            Primitive::Boolean => "boolean",
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::Array => "array",
            Primitive::Object => "object",
            Primitive::Binary => "Binary",
            Primitive::Date => "Date",
            Primitive::ObjectId => "ObjectId",
            Primitive::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index of a node inside a [`StudyTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

/// Address of a node across all studied collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeRef {
    /// Index of the collection in the study list
    pub model: usize,
    /// Node inside that collection's tree
    pub node: NodeId,
}

/// Bounded set of raw values kept for reference verification
///
/// Values are deduplicated by their canonical key. Once full, further values
/// are ignored.
#[derive(Debug, Clone, Default)]
pub struct Reservoir {
    values: Vec<Value>,
    keys: HashSet<String>,
}

impl Reservoir {
    /// Add a value unless the reservoir already holds `cap` values or an equivalent one
    pub fn offer(&mut self, value: &Value, cap: usize) -> bool {
        if self.values.len() >= cap {
            return false;
        }
        if !self.keys.insert(canonical_key(value)) {
            return false;
        }
        self.values.push(value.clone());
        true
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.keys.clear();
    }
}

/// Statistics accumulated for one structural position
#[derive(Debug, Clone)]
pub struct NodeStudy {
    /// Observation count per type tag
    pub types: BTreeMap<Primitive, usize>,
    /// Total observations, nulls included
    pub seen: usize,
    /// Child nodes by field name, once an object was observed here
    pub object: Option<BTreeMap<String, NodeId>>,
    /// Merged shape of array items, once an array was observed here
    pub array_element: Option<NodeId>,
    /// Whether every value so far could still be a reference
    pub is_reference_candidate: bool,
    /// Raw values kept while the node remains a candidate
    pub reference_samples: Reservoir,
}

impl NodeStudy {
    fn new() -> Self {
        Self {
            types: BTreeMap::new(),
            seen: 0,
            object: None,
            array_element: None,
            is_reference_candidate: true,
            reference_samples: Reservoir::default(),
        }
    }

    /// Observed tags other than `null`
    pub fn non_null_types(&self) -> impl Iterator<Item = Primitive> + '_ {
        self.types.keys().copied().filter(|t| *t != Primitive::Null)
    }

    /// The single non-null tag observed here, if there is exactly one
    pub fn single_type(&self) -> Option<Primitive> {
        let mut types = self.non_null_types();
        match (types.next(), types.next()) {
            (Some(t), None) => Some(t),
            _ => None,
        }
    }

    /// Number of observations with the given tag
    pub fn count(&self, tag: Primitive) -> usize {
        self.types.get(&tag).copied().unwrap_or(0)
    }

    /// Disqualify this node as a reference, permanently
    pub fn drop_candidacy(&mut self) {
        self.is_reference_candidate = false;
        self.reference_samples.clear();
    }
}

/// Arena holding every node studied for one collection
///
/// Node 0 is always the root.
#[derive(Debug, Clone)]
pub struct StudyTree {
    nodes: Vec<NodeStudy>,
}

impl StudyTree {
    /// Create a tree holding only an empty root
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeStudy::new()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &NodeStudy {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeStudy {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get or lazily create the child node for `key` under an object position
    pub fn object_child(&mut self, parent: NodeId, key: &str) -> NodeId {
        if let Some(id) = self.nodes[parent.0]
            .object
            .as_ref()
            .and_then(|children| children.get(key))
        {
            return *id;
        }

        let id = self.push();
        self.nodes[parent.0]
            .object
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), id);
        id
    }

    /// Ensure a (possibly empty) object map exists at `id`
    pub fn ensure_object(&mut self, id: NodeId) {
        self.nodes[id.0].object.get_or_insert_with(BTreeMap::new);
    }

    /// Get or lazily create the array element node under `parent`
    pub fn array_element(&mut self, parent: NodeId) -> NodeId {
        if let Some(id) = self.nodes[parent.0].array_element {
            return id;
        }
        let id = self.push();
        self.nodes[parent.0].array_element = Some(id);
        id
    }

    /// Look up a direct child of the root by field name
    pub fn root_field(&self, key: &str) -> Option<NodeId> {
        self.node(self.root())
            .object
            .as_ref()
            .and_then(|children| children.get(key).copied())
    }

    fn push(&mut self) -> NodeId {
        self.nodes.push(NodeStudy::new());
        NodeId(self.nodes.len() - 1)
    }
}

impl Default for StudyTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Sampling result for one collection
#[derive(Debug, Clone)]
pub struct ModelStudy {
    /// Collection name
    pub name: String,
    /// Per-field statistics
    pub tree: StudyTree,
    /// Number of documents walked
    pub documents: usize,
}

/// Resolved definition of one structural position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStudyDef {
    /// Resolved type; never `null`
    #[serde(rename = "type")]
    pub node_type: Primitive,
    /// Whether null (or, by default, absence) was observed
    pub nullable: bool,
    /// Collection this field references, when verified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_to: Option<String>,
    /// Definition of array items, for `array` nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_element: Option<Box<NodeStudyDef>>,
    /// Field definitions, for `object` nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<BTreeMap<String, NodeStudyDef>>,
}

impl NodeStudyDef {
    /// A `Mixed` definition
    pub fn mixed(nullable: bool) -> Self {
        Self {
            node_type: Primitive::Mixed,
            nullable,
            reference_to: None,
            array_element: None,
            object: None,
        }
    }

    /// Look up a nested field by dotted path (`[]` steps into array elements)
    pub fn field(&self, path: &str) -> Option<&NodeStudyDef> {
        path.split('.').try_fold(self, |node, step| {
            if step == "[]" {
                node.array_element.as_deref()
            } else {
                node.object.as_ref()?.get(step)
            }
        })
    }

    /// Convert this definition into a JSON Schema fragment
    pub fn to_json_schema(&self) -> Value {
        let mut schema = match self.node_type {
            Primitive::Mixed | Primitive::Null => return json!({}),
            Primitive::Boolean => json!({ "type": "boolean" }),
            Primitive::Number => json!({ "type": "number" }),
            Primitive::String => json!({ "type": "string" }),
            Primitive::Date => json!({ "type": "string", "format": "date-time" }),
            Primitive::Binary => json!({ "type": "string", "contentEncoding": "base64" }),
            Primitive::ObjectId => json!({ "type": "string", "pattern": "^[0-9a-fA-F]{24}$" }),
            Primitive::Array => {
                let items = self
                    .array_element
                    .as_ref()
                    .map(|e| e.to_json_schema())
                    .unwrap_or_else(|| json!({}));
                json!({ "type": "array", "items": items })
            }
            Primitive::Object => {
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for (name, field) in self.object.iter().flatten() {
                    properties.insert(name.clone(), field.to_json_schema());
                    if !field.nullable {
                        required.push(Value::String(name.clone()));
                    }
                }
                let mut schema = json!({ "type": "object", "properties": properties });
                if !required.is_empty() {
                    schema["required"] = Value::Array(required);
                }
                schema
            }
        };

        if self.nullable
            && let Some(Value::String(t)) = schema.get("type").cloned()
        {
            schema["type"] = json!([t, "null"]);
        }
        if let Some(ref target) = self.reference_to {
            schema["x-reference-to"] = json!(target);
        }

        schema
    }
}

/// Resolved definition of one collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStudyDef {
    /// Collection name
    pub name: String,
    /// Root definition (an `object`, or `Mixed` for empty collections)
    pub analysis: NodeStudyDef,
}

impl ModelStudyDef {
    /// Convert to a standalone JSON Schema document
    pub fn to_json_schema(&self) -> Value {
        let mut schema = json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "title": self.name,
        });

        if let (Value::Object(target), Value::Object(body)) =
            (&mut schema, self.analysis.to_json_schema())
        {
            target.extend(body);
        }

        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(node_type: Primitive, nullable: bool) -> NodeStudyDef {
        NodeStudyDef {
            node_type,
            nullable,
            reference_to: None,
            array_element: None,
            object: None,
        }
    }

    #[test]
    fn test_reservoir_cap_and_dedup() {
        let mut reservoir = Reservoir::default();
        assert!(reservoir.offer(&json!("a"), 2));
        assert!(!reservoir.offer(&json!("a"), 2));
        assert!(reservoir.offer(&json!({ "$oid": "507F1F77BCF86CD799439011" }), 2));
        assert!(!reservoir.offer(&json!("c"), 2));
        assert_eq!(reservoir.len(), 2);

        reservoir.clear();
        assert!(reservoir.is_empty());
    }

    #[test]
    fn test_tree_children_created_once() {
        let mut tree = StudyTree::new();
        let root = tree.root();
        let a = tree.object_child(root, "a");
        let again = tree.object_child(root, "a");
        let items = tree.array_element(a);

        assert_eq!(a, again);
        assert_eq!(tree.array_element(a), items);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.root_field("a"), Some(a));
    }

    #[test]
    fn test_single_type_ignores_null() {
        let mut tree = StudyTree::new();
        let node = tree.node_mut(NodeId(0));
        node.types.insert(Primitive::Null, 3);
        assert_eq!(node.single_type(), None);

        node.types.insert(Primitive::String, 1);
        assert_eq!(node.single_type(), Some(Primitive::String));

        node.types.insert(Primitive::Number, 1);
        assert_eq!(node.single_type(), None);
    }

    #[test]
    fn test_def_serialization_shape() {
        let mut object = BTreeMap::new();
        let mut customer = leaf(Primitive::ObjectId, false);
        customer.reference_to = Some("customers".to_string());
        object.insert("customerId".to_string(), customer);
        object.insert("note".to_string(), leaf(Primitive::String, true));

        let def = ModelStudyDef {
            name: "orders".to_string(),
            analysis: NodeStudyDef {
                node_type: Primitive::Object,
                nullable: false,
                reference_to: None,
                array_element: None,
                object: Some(object),
            },
        };

        let value = serde_json::to_value(&def).unwrap();
        assert_eq!(value["analysis"]["type"], "object");
        assert_eq!(value["analysis"]["object"]["customerId"]["type"], "ObjectId");
        assert_eq!(
            value["analysis"]["object"]["customerId"]["referenceTo"],
            "customers"
        );
        assert!(value["analysis"]["object"]["note"].get("referenceTo").is_none());

        let back: ModelStudyDef = serde_json::from_value(value).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn test_field_path_lookup() {
        let mut inner = BTreeMap::new();
        inner.insert("sku".to_string(), leaf(Primitive::String, false));
        let item = NodeStudyDef {
            node_type: Primitive::Object,
            nullable: false,
            reference_to: None,
            array_element: None,
            object: Some(inner),
        };
        let mut outer = BTreeMap::new();
        outer.insert(
            "items".to_string(),
            NodeStudyDef {
                node_type: Primitive::Array,
                nullable: false,
                reference_to: None,
                array_element: Some(Box::new(item)),
                object: None,
            },
        );
        let root = NodeStudyDef {
            node_type: Primitive::Object,
            nullable: false,
            reference_to: None,
            array_element: None,
            object: Some(outer),
        };

        assert_eq!(
            root.field("items.[].sku").map(|d| d.node_type),
            Some(Primitive::String)
        );
        assert!(root.field("items.sku").is_none());
    }

    #[test]
    fn test_json_schema_export() {
        let mut object = BTreeMap::new();
        let mut customer = leaf(Primitive::ObjectId, false);
        customer.reference_to = Some("customers".to_string());
        object.insert("customerId".to_string(), customer);
        object.insert("placedAt".to_string(), leaf(Primitive::Date, true));
        object.insert("extra".to_string(), leaf(Primitive::Mixed, false));

        let def = ModelStudyDef {
            name: "orders".to_string(),
            analysis: NodeStudyDef {
                node_type: Primitive::Object,
                nullable: false,
                reference_to: None,
                array_element: None,
                object: Some(object),
            },
        };

        let schema = def.to_json_schema();
        assert_eq!(schema["title"], "orders");
        assert_eq!(schema["type"], "object");
        assert_eq!(
            schema["properties"]["customerId"]["x-reference-to"],
            "customers"
        );
        assert_eq!(schema["properties"]["placedAt"]["type"], json!(["string", "null"]));
        assert_eq!(schema["properties"]["extra"], json!({}));
        assert_eq!(schema["required"], json!(["customerId", "extra"]));
    }
}
