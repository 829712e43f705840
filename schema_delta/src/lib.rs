//! Component J: schema delta computation.
//!
//! For every executed node, records which column key-ids appeared or
//! disappeared between its inputs and its output. The same-batch fast
//! path matters in practice: most tasks (filters, sorts, takes)
//! return a row-set over the very batch they were given, just with a
//! different selection/order, so there is no column-set work to do at
//! all.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::collections::BTreeSet;

use column_batch::RowSet;

/// The recorded delta for a single node: the key-ids present on its
/// output, and which of those are newly introduced or dropped
/// relative to the union of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDelta {
    pub node_id: String,
    pub in_keys_union: Vec<u32>,
    pub out_keys: Vec<u32>,
    pub new_keys: Vec<u32>,
    pub removed_keys: Vec<u32>,
}

fn sorted_unique_keys(row_set: &RowSet) -> BTreeSet<u32> {
    row_set.batch().key_ids().collect()
}

/// Compute the schema delta for a node given its input row-sets (in
/// `inputs[]` order) and its single output row-set.
pub fn compute_schema_delta(node_id: impl Into<String>, inputs: &[RowSet], output: &RowSet) -> SchemaDelta {
    let node_id = node_id.into();

    if let [only_input] = inputs {
        if output.is_same_batch(only_input) {
            let keys: Vec<u32> = sorted_unique_keys(only_input).into_iter().collect();
            return SchemaDelta {
                node_id,
                in_keys_union: keys.clone(),
                out_keys: keys,
                new_keys: Vec::new(),
                removed_keys: Vec::new(),
            };
        }
    }

    let in_keys_union: BTreeSet<u32> = inputs.iter().flat_map(sorted_unique_keys).collect();
    let out_keys: BTreeSet<u32> = sorted_unique_keys(output);

    let new_keys: Vec<u32> = out_keys.difference(&in_keys_union).copied().collect();
    let removed_keys: Vec<u32> = in_keys_union.difference(&out_keys).copied().collect();

    SchemaDelta {
        node_id,
        in_keys_union: in_keys_union.into_iter().collect(),
        out_keys: out_keys.into_iter().collect(),
        new_keys,
        removed_keys,
    }
}
