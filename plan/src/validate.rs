use std::collections::{HashMap, HashSet};

use crate::node::{NodeId, Plan, CURRENT_SCHEMA_VERSION};

#[derive(Debug, snafu::Snafu)]
pub enum ValidationError {
    #[snafu(display("unknown schema_version {version}, expected {expected}"))]
    UnknownSchemaVersion { version: u32, expected: u32 },
    #[snafu(display("duplicate node id {node_id}"))]
    DuplicateNodeId { node_id: NodeId },
    #[snafu(display("node {node_id} has input {missing} which does not name an existing node"))]
    MissingInput { node_id: NodeId, missing: NodeId },
    #[snafu(display(
        "node {node_id} has a NodeRef parameter {param} pointing at {missing}, which does not name an existing node"
    ))]
    MissingNodeRefTarget {
        node_id: NodeId,
        param: String,
        missing: NodeId,
    },
    #[snafu(display("plan contains a dependency cycle involving node {node_id}"))]
    Cycle { node_id: NodeId },
    #[snafu(display("outputs[{index}] names {node_id} which does not name an existing node"))]
    UnknownOutput { index: usize, node_id: NodeId },
}

/// The combined dependency set of a node: `inputs` ∪ every
/// `NodeRef`-typed parameter's target (§3.3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependencies(pub Vec<NodeId>);

fn dependencies_of(node: &crate::node::Node) -> Dependencies {
    let mut seen = HashSet::new();
    let mut deps = Vec::new();
    for input in &node.inputs {
        if seen.insert(input.clone()) {
            deps.push(input.clone());
        }
    }
    for (_, target) in node.node_ref_params() {
        if seen.insert(target.clone()) {
            deps.push(target.clone());
        }
    }
    Dependencies(deps)
}

/// Validate a [`Plan`] per §3.3's invariants: unique node ids, every
/// input and NodeRef resolves to an existing node, the dependency
/// graph is acyclic, every output names an existing node, and
/// `schema_version` is known.
///
/// Returns the per-node dependency sets (inputs ∪ NodeRef targets) on
/// success, since callers (`dag_scheduler`) need exactly this and
/// would otherwise recompute it.
pub fn validate_plan(plan: &Plan) -> Result<HashMap<NodeId, Dependencies>, ValidationError> {
    if plan.schema_version != CURRENT_SCHEMA_VERSION {
        return Err(ValidationError::UnknownSchemaVersion {
            version: plan.schema_version,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }

    let mut by_id: HashMap<&NodeId, &crate::node::Node> = HashMap::new();
    for node in &plan.nodes {
        if by_id.insert(&node.node_id, node).is_some() {
            return Err(ValidationError::DuplicateNodeId {
                node_id: node.node_id.clone(),
            });
        }
    }

    for node in &plan.nodes {
        for input in &node.inputs {
            if !by_id.contains_key(input) {
                return Err(ValidationError::MissingInput {
                    node_id: node.node_id.clone(),
                    missing: input.clone(),
                });
            }
        }
        for (param, target) in node.node_ref_params() {
            if !by_id.contains_key(target) {
                return Err(ValidationError::MissingNodeRefTarget {
                    node_id: node.node_id.clone(),
                    param: param.to_string(),
                    missing: target.clone(),
                });
            }
        }
    }

    let mut deps: HashMap<NodeId, Dependencies> = HashMap::new();
    for node in &plan.nodes {
        deps.insert(node.node_id.clone(), dependencies_of(node));
    }

    check_acyclic(plan, &deps)?;

    for (index, output) in plan.outputs.iter().enumerate() {
        if !by_id.contains_key(output) {
            return Err(ValidationError::UnknownOutput {
                index,
                node_id: output.clone(),
            });
        }
    }

    Ok(deps)
}

/// Kahn's algorithm: also used by `dag_scheduler` to compute the
/// deterministic topological order (§4.7.1 step 4), but here we only
/// care whether it completes (a cycle means some nodes never reach
/// zero remaining in-degree).
fn check_acyclic(
    plan: &Plan,
    deps: &HashMap<NodeId, Dependencies>,
) -> Result<(), ValidationError> {
    let mut remaining: HashMap<&NodeId, usize> = plan
        .nodes
        .iter()
        .map(|n| (&n.node_id, deps[&n.node_id].0.len()))
        .collect();

    let mut successors: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for node in &plan.nodes {
        for dep in &deps[&node.node_id].0 {
            successors.entry(by_ref(plan, dep)).or_default().push(&node.node_id);
        }
    }

    let mut queue: Vec<&NodeId> = remaining
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&id, _)| id)
        .collect();
    queue.sort();

    let mut visited = 0usize;
    let mut i = 0;
    while i < queue.len() {
        let node_id = queue[i];
        i += 1;
        visited += 1;
        if let Some(succs) = successors.get(node_id) {
            for &succ in succs {
                let count = remaining.get_mut(succ).expect("successor must exist");
                *count -= 1;
                if *count == 0 {
                    queue.push(succ);
                }
            }
        }
    }

    if visited != plan.nodes.len() {
        let stuck = plan
            .nodes
            .iter()
            .find(|n| *remaining.get(&n.node_id).unwrap_or(&0) > 0)
            .expect("at least one node must still have remaining deps");
        return Err(ValidationError::Cycle {
            node_id: stuck.node_id.clone(),
        });
    }

    Ok(())
}

fn by_ref<'a>(plan: &'a Plan, node_id: &NodeId) -> &'a NodeId {
    &plan.nodes.iter().find(|n| &n.node_id == node_id).expect("validated node exists").node_id
}
