//! Deterministic topological order (§4.7.1 step 4).
//!
//! `plan::validate_plan`'s own Kahn's pass only answers "is this plan
//! acyclic" — it doesn't need to agree run-to-run on which of several
//! simultaneously-ready nodes comes first. `schema_deltas` does
//! (§4.7.5), so this is a second, independent Kahn's pass that always
//! breaks ties by picking the lexicographically smallest ready node
//! id, giving every run of the same plan the same order.

use std::collections::{BTreeSet, HashMap};

use plan::{Dependencies, NodeId, Plan};

/// Node indices assigned `0..n` in plan-array order, plus the
/// successor/remaining-dependency bookkeeping and the one
/// deterministic topological order both schedulers dispatch from.
#[derive(Debug)]
pub struct TopoInfo {
    pub index_of: HashMap<NodeId, usize>,
    pub successors: Vec<Vec<usize>>,
    pub initial_deps_remaining: Vec<usize>,
    pub order: Vec<usize>,
}

/// Build [`TopoInfo`] from a plan and its already-validated
/// dependency sets.
///
/// # Panics
/// Panics if `deps` does not describe an acyclic graph over `plan`'s
/// nodes. Callers are expected to have already run
/// [`plan::validate_plan`], whose success is exactly that guarantee.
pub fn build(plan: &Plan, deps: &HashMap<NodeId, Dependencies>) -> TopoInfo {
    let index_of: HashMap<NodeId, usize> = plan
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.node_id.clone(), i))
        .collect();

    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); plan.nodes.len()];
    let mut initial_deps_remaining: Vec<usize> = vec![0; plan.nodes.len()];

    for node in &plan.nodes {
        let idx = index_of[&node.node_id];
        let node_deps = &deps[&node.node_id].0;
        initial_deps_remaining[idx] = node_deps.len();
        for dep in node_deps {
            let dep_idx = index_of[dep];
            successors[dep_idx].push(idx);
        }
    }

    let mut remaining = initial_deps_remaining.clone();
    let mut frontier: BTreeSet<(&NodeId, usize)> = plan
        .nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| remaining[*i] == 0)
        .map(|(i, n)| (&n.node_id, i))
        .collect();

    let mut order = Vec::with_capacity(plan.nodes.len());
    while let Some(&(node_id, idx)) = frontier.iter().next() {
        frontier.remove(&(node_id, idx));
        order.push(idx);
        for &succ in &successors[idx] {
            remaining[succ] -= 1;
            if remaining[succ] == 0 {
                frontier.insert((&plan.nodes[succ].node_id, succ));
            }
        }
    }

    assert_eq!(
        order.len(),
        plan.nodes.len(),
        "topo::build called on a graph with a cycle; validate_plan should have rejected it first"
    );

    TopoInfo {
        index_of,
        successors,
        initial_deps_remaining,
        order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plan::{validate_plan, Node, CURRENT_SCHEMA_VERSION};
    use std::collections::BTreeMap;

    fn node(id: &str, inputs: &[&str]) -> Node {
        Node {
            node_id: id.into(),
            op: "take".into(),
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            params: BTreeMap::new(),
        }
    }

    fn plan(nodes: Vec<Node>, outputs: &[&str]) -> Plan {
        Plan {
            schema_version: CURRENT_SCHEMA_VERSION,
            plan_name: "p".into(),
            nodes,
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            expr_table: BTreeMap::new(),
            pred_table: BTreeMap::new(),
            capabilities_required: vec![],
            extensions: BTreeMap::new(),
        }
    }

    #[test]
    fn linear_chain_orders_by_dependency() {
        let p = plan(vec![node("c", &["b"]), node("a", &[]), node("b", &["a"])], &["c"]);
        let deps = validate_plan(&p).unwrap();
        let info = build(&p, &deps);
        let ids: Vec<&str> = info.order.iter().map(|&i| p.nodes[i].node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn ties_break_lexicographically() {
        // b and c both depend only on a and become ready simultaneously;
        // the deterministic order must always pick b before c.
        let p = plan(
            vec![node("a", &[]), node("c", &["a"]), node("b", &["a"])],
            &["b", "c"],
        );
        let deps = validate_plan(&p).unwrap();
        let info = build(&p, &deps);
        let ids: Vec<&str> = info.order.iter().map(|&i| p.nodes[i].node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn successors_and_remaining_counts_match_dependency_edges() {
        let p = plan(vec![node("a", &[]), node("b", &["a"])], &["b"]);
        let deps = validate_plan(&p).unwrap();
        let info = build(&p, &deps);
        let a = info.index_of["a"];
        let b = info.index_of["b"];
        assert_eq!(info.successors[a], vec![b]);
        assert_eq!(info.initial_deps_remaining[b], 1);
        assert_eq!(info.initial_deps_remaining[a], 0);
    }
}
