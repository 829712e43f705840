use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The only schema version this engine understands (§3.3's invariant
/// that `schema_version` be "a known value", currently 1).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// A node's identity. Plain `String` rather than a newtype-wrapped
/// integer: plan JSON names nodes with arbitrary ids and the core
/// never needs to allocate its own.
pub type NodeId = String;

/// An untyped parameter value, as decoded from plan JSON before
/// `task_registry`'s per-op schema validates and types it.
///
/// [`ParamValue::NodeRef`] is the one variant the core itself cares
/// about: it names another node whose result this node needs wired in
/// (§3.3, "Dependencies... every node-id appearing in any
/// `NodeRef`-typed parameter").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    NodeRef(NodeRefValue),
    List(Vec<ParamValue>),
}

/// Distinguishes a plain string parameter from one that names another
/// node. Plan JSON marks this explicitly (`{"node_ref": "n3"}`) rather
/// than relying on string-shape sniffing, which would make an
/// ordinary string parameter that happens to look like a node id
/// accidentally become a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRefValue {
    pub node_ref: NodeId,
}

impl ParamValue {
    /// The node id this value references, if it is a `NodeRef`
    /// (including `NodeRef`s nested inside a `List`).
    pub fn node_refs(&self) -> Vec<&NodeId> {
        match self {
            ParamValue::NodeRef(r) => vec![&r.node_ref],
            ParamValue::List(items) => items.iter().flat_map(ParamValue::node_refs).collect(),
            _ => Vec::new(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        self.as_i64().and_then(|i| usize::try_from(i).ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// A single node in a plan: an op name, its direct parents, and its
/// untyped parameter blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: NodeId,
    pub op: String,
    #[serde(default)]
    pub inputs: Vec<NodeId>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

impl Node {
    /// Every `NodeRef`-typed parameter value on this node, in
    /// `params` iteration order (stable: `params` is a `BTreeMap`).
    pub fn node_ref_params(&self) -> impl Iterator<Item = (&str, &NodeId)> {
        self.params.iter().flat_map(|(name, value)| {
            value
                .node_refs()
                .into_iter()
                .map(move |node_id| (name.as_str(), node_id))
        })
    }
}

/// A validated DAG of nodes parameterising one ranking execution
/// (§3.3). Construct via [`crate::validate_plan`] rather than
/// populating the fields directly and skipping validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub schema_version: u32,
    pub plan_name: String,
    pub nodes: Vec<Node>,
    pub outputs: Vec<NodeId>,
    /// Opaque tables referenced by task params (expression/predicate
    /// ASTs); the core never interprets these, only threads them
    /// through to the `eval(node, row, batch, ctx)` collaborator
    /// assumed by `spec.md` §1.
    #[serde(default)]
    pub expr_table: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub pred_table: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub capabilities_required: Vec<String>,
    #[serde(default)]
    pub extensions: BTreeMap<String, serde_json::Value>,
}

impl Plan {
    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ref_found_inside_list_param() {
        let mut params = BTreeMap::new();
        params.insert(
            "extra_inputs".to_string(),
            ParamValue::List(vec![
                ParamValue::NodeRef(NodeRefValue { node_ref: "n1".into() }),
                ParamValue::String("not-a-ref".into()),
            ]),
        );
        let node = Node {
            node_id: "n2".into(),
            op: "vm".into(),
            inputs: vec![],
            params,
        };
        let refs: Vec<&str> = node.node_ref_params().map(|(_, id)| id.as_str()).collect();
        assert_eq!(refs, vec!["n1"]);
    }

    #[test]
    fn param_value_deserializes_node_ref_distinctly_from_string() {
        let v: ParamValue = serde_json::from_str(r#"{"node_ref": "n7"}"#).unwrap();
        assert_eq!(v, ParamValue::NodeRef(NodeRefValue { node_ref: "n7".into() }));

        let s: ParamValue = serde_json::from_str(r#""n7""#).unwrap();
        assert_eq!(s, ParamValue::String("n7".into()));
    }
}
