//! Component I: the output contract validator.
//!
//! Every task declares an [`OutputPattern`] describing how its output
//! row-set must relate to its inputs. [`validate`] checks the
//! post-condition after a task runs and before its result is wired to
//! successors, so a misbehaving task fails at its own node rather than
//! corrupting a downstream one.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use column_batch::RowSet;

/// The shape contract a task's output must satisfy relative to its
/// inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPattern {
    /// `rowCount == params.fanout`; active rows are dense `[0..N)`.
    SourceFanoutDense,
    /// `rowCount == inputs[0].rowCount`; active rows equal
    /// `inputs[0].active` element-wise.
    UnaryPreserveView,
    /// `rowCount == inputs[0].rowCount`; active rows are a
    /// subsequence of `inputs[0].active`.
    StableFilter,
    /// `rowCount == inputs[0].rowCount`; active rows are the first
    /// `min(count, |inputs[0].active|)` of `inputs[0].active`.
    PrefixOfInput,
    /// `rowCount == inputs[0].rowCount`; active rows are a
    /// permutation of `inputs[0].active`.
    PermutationOfInput,
    /// `rowCount == inputs[0].logicalSize + inputs[1].logicalSize`;
    /// active rows are dense `[0..N)`.
    ConcatDense,
    /// Active rows are dense `[0..N)`; `N` determined at runtime.
    VariableDense,
}

/// Node-supplied parameters the validator needs for patterns whose
/// expectation depends on a param value (`fanout`, `count`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternParams {
    pub fanout: Option<usize>,
    pub count: Option<usize>,
}

#[derive(Debug, snafu::Snafu)]
#[snafu(display("node {node_id} (op {op}): output pattern {pattern:?} violated: {expectation}"))]
pub struct ContractError {
    node_id: String,
    op: String,
    pattern: OutputPattern,
    expectation: String,
}

fn violation(
    node_id: &str,
    op: &str,
    pattern: OutputPattern,
    expectation: impl Into<String>,
) -> ContractError {
    ContractError {
        node_id: node_id.to_string(),
        op: op.to_string(),
        pattern,
        expectation: expectation.into(),
    }
}

fn is_dense(rows: &[u32]) -> bool {
    rows.iter().enumerate().all(|(i, &r)| r as usize == i)
}

fn is_subsequence(needle: &[u32], haystack: &[u32]) -> bool {
    let mut h = haystack.iter();
    needle.iter().all(|n| h.any(|x| x == n))
}

fn is_permutation_of(a: &[u32], b: &[u32]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a_sorted = a.to_vec();
    let mut b_sorted = b.to_vec();
    a_sorted.sort_unstable();
    b_sorted.sort_unstable();
    a_sorted == b_sorted
}

/// Validate `output` against `pattern` given the task's `inputs`.
///
/// `node_id` and `op` are used only to build a descriptive error.
pub fn validate(
    pattern: OutputPattern,
    node_id: &str,
    op: &str,
    inputs: &[RowSet],
    output: &RowSet,
    params: PatternParams,
) -> Result<(), ContractError> {
    match pattern {
        OutputPattern::SourceFanoutDense => {
            let fanout = params.fanout.ok_or_else(|| {
                violation(node_id, op, pattern, "fanout parameter required but not provided")
            })?;
            if output.row_count() != fanout {
                return Err(violation(
                    node_id,
                    op,
                    pattern,
                    format!("rowCount {} != fanout {}", output.row_count(), fanout),
                ));
            }
            let active = output.active_rows();
            if !is_dense(&active) {
                return Err(violation(node_id, op, pattern, "active rows are not dense [0..N)"));
            }
        }

        OutputPattern::UnaryPreserveView => {
            let input = require_input(node_id, op, pattern, inputs, 0)?;
            if output.row_count() != input.row_count() {
                return Err(violation(
                    node_id,
                    op,
                    pattern,
                    format!("rowCount {} != input rowCount {}", output.row_count(), input.row_count()),
                ));
            }
            if output.active_rows() != input.active_rows() {
                return Err(violation(node_id, op, pattern, "active rows differ from input's active rows"));
            }
        }

        OutputPattern::StableFilter => {
            let input = require_input(node_id, op, pattern, inputs, 0)?;
            if output.row_count() != input.row_count() {
                return Err(violation(
                    node_id,
                    op,
                    pattern,
                    format!("rowCount {} != input rowCount {}", output.row_count(), input.row_count()),
                ));
            }
            if !is_subsequence(&output.active_rows(), &input.active_rows()) {
                return Err(violation(node_id, op, pattern, "active rows are not a subsequence of input's active rows"));
            }
        }

        OutputPattern::PrefixOfInput => {
            let input = require_input(node_id, op, pattern, inputs, 0)?;
            if output.row_count() != input.row_count() {
                return Err(violation(
                    node_id,
                    op,
                    pattern,
                    format!("rowCount {} != input rowCount {}", output.row_count(), input.row_count()),
                ));
            }
            let count = params.count.ok_or_else(|| {
                violation(node_id, op, pattern, "count parameter required but not provided")
            })?;
            let input_active = input.active_rows();
            let expected_len = count.min(input_active.len());
            let expected = &input_active[..expected_len];
            let actual = output.active_rows();
            if actual != expected {
                return Err(violation(node_id, op, pattern, "active rows are not the expected prefix of input's active rows"));
            }
        }

        OutputPattern::PermutationOfInput => {
            let input = require_input(node_id, op, pattern, inputs, 0)?;
            if output.row_count() != input.row_count() {
                return Err(violation(
                    node_id,
                    op,
                    pattern,
                    format!("rowCount {} != input rowCount {}", output.row_count(), input.row_count()),
                ));
            }
            if !is_permutation_of(&output.active_rows(), &input.active_rows()) {
                return Err(violation(node_id, op, pattern, "active rows are not a permutation of input's active rows"));
            }
        }

        OutputPattern::ConcatDense => {
            let left = require_input(node_id, op, pattern, inputs, 0)?;
            let right = require_input(node_id, op, pattern, inputs, 1)?;
            let expected = left.logical_size() + right.logical_size();
            if output.row_count() != expected {
                return Err(violation(
                    node_id,
                    op,
                    pattern,
                    format!("rowCount {} != sum of input logical sizes {}", output.row_count(), expected),
                ));
            }
            if !is_dense(&output.active_rows()) {
                return Err(violation(node_id, op, pattern, "active rows are not dense [0..N)"));
            }
        }

        OutputPattern::VariableDense => {
            if !is_dense(&output.active_rows()) {
                return Err(violation(node_id, op, pattern, "active rows are not dense [0..N)"));
            }
        }
    }

    Ok(())
}

fn require_input<'a>(
    node_id: &str,
    op: &str,
    pattern: OutputPattern,
    inputs: &'a [RowSet],
    index: usize,
) -> Result<&'a RowSet, ContractError> {
    inputs
        .get(index)
        .ok_or_else(|| violation(node_id, op, pattern, format!("pattern requires inputs[{index}] but it is missing")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use column_batch::ColumnBatch;
    use std::sync::Arc;

    fn base(n: usize) -> Arc<ColumnBatch> {
        Arc::new(ColumnBatch::new((0..n as i64).collect(), vec![true; n]).unwrap())
    }

    #[test]
    fn source_fanout_dense_accepts_matching_fanout() {
        let output = RowSet::new(base(5));
        let params = PatternParams { fanout: Some(5), count: None };
        assert!(validate(OutputPattern::SourceFanoutDense, "n1", "source", &[], &output, params).is_ok());
    }

    #[test]
    fn source_fanout_dense_rejects_mismatched_fanout() {
        let output = RowSet::new(base(5));
        let params = PatternParams { fanout: Some(3), count: None };
        assert!(validate(OutputPattern::SourceFanoutDense, "n1", "source", &[], &output, params).is_err());
    }

    #[test]
    fn unary_preserve_view_requires_identical_active_rows() {
        let b = base(4);
        let input = RowSet::with_selection(Arc::clone(&b), vec![1, 3]).unwrap();
        let good = RowSet::with_selection(Arc::clone(&b), vec![1, 3]).unwrap();
        let bad = RowSet::with_selection(Arc::clone(&b), vec![0, 2]).unwrap();

        assert!(validate(
            OutputPattern::UnaryPreserveView,
            "n",
            "vm",
            &[input.clone()],
            &good,
            PatternParams::default()
        )
        .is_ok());
        assert!(validate(
            OutputPattern::UnaryPreserveView,
            "n",
            "vm",
            &[input],
            &bad,
            PatternParams::default()
        )
        .is_err());
    }

    #[test]
    fn stable_filter_accepts_subsequence() {
        let b = base(5);
        let input = RowSet::new(Arc::clone(&b));
        let output = RowSet::with_selection(Arc::clone(&b), vec![1, 3, 4]).unwrap();
        assert!(validate(OutputPattern::StableFilter, "n", "filter", &[input], &output, PatternParams::default()).is_ok());
    }

    #[test]
    fn stable_filter_rejects_reordering() {
        let b = base(5);
        let input = RowSet::new(Arc::clone(&b));
        let output = RowSet::with_selection(Arc::clone(&b), vec![3, 1, 4]).unwrap();
        assert!(validate(OutputPattern::StableFilter, "n", "filter", &[input], &output, PatternParams::default()).is_err());
    }

    #[test]
    fn prefix_of_input_returns_input_verbatim_when_count_exceeds_size() {
        let b = base(3);
        let input = RowSet::new(Arc::clone(&b));
        let output = RowSet::new(Arc::clone(&b));
        let params = PatternParams { fanout: None, count: Some(10) };
        assert!(validate(OutputPattern::PrefixOfInput, "n", "take", &[input], &output, params).is_ok());
    }

    #[test]
    fn prefix_of_input_checks_exact_prefix() {
        let b = base(5);
        let input = RowSet::new(Arc::clone(&b));
        let good = RowSet::with_selection(Arc::clone(&b), vec![0, 1, 2]).unwrap();
        let bad = RowSet::with_selection(Arc::clone(&b), vec![0, 1, 3]).unwrap();
        let params = PatternParams { fanout: None, count: Some(3) };

        assert!(validate(OutputPattern::PrefixOfInput, "n", "take", &[input.clone()], &good, params).is_ok());
        assert!(validate(OutputPattern::PrefixOfInput, "n", "take", &[input], &bad, params).is_err());
    }

    #[test]
    fn permutation_of_input_ignores_order() {
        let b = base(4);
        let input = RowSet::new(Arc::clone(&b));
        let output = RowSet::with_order(Arc::clone(&b), vec![3, 2, 1, 0]).unwrap();
        assert!(validate(OutputPattern::PermutationOfInput, "n", "sort", &[input], &output, PatternParams::default()).is_ok());
    }

    #[test]
    fn concat_dense_sums_logical_sizes() {
        let left = RowSet::with_selection(base(4), vec![0, 1]).unwrap();
        let right = RowSet::with_selection(base(4), vec![0, 1, 2]).unwrap();
        let output = RowSet::new(base(5));
        assert!(validate(
            OutputPattern::ConcatDense,
            "n",
            "concat",
            &[left, right],
            &output,
            PatternParams::default()
        )
        .is_ok());
    }

    #[test]
    fn variable_dense_just_checks_density() {
        let output = RowSet::new(base(2));
        assert!(validate(OutputPattern::VariableDense, "n", "custom", &[], &output, PatternParams::default()).is_ok());

        let sparse = RowSet::with_selection(base(3), vec![0, 2]).unwrap();
        assert!(validate(OutputPattern::VariableDense, "n", "custom", &[], &sparse, PatternParams::default()).is_err());
    }
}
