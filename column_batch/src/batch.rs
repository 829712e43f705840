use std::collections::HashMap;
use std::sync::Arc;

/// The always-present id column: one `i64` per row plus a validity
/// flag (the id can itself be null, e.g. a placeholder row).
#[derive(Debug, PartialEq)]
pub struct IdColumn {
    pub values: Vec<i64>,
    pub valid: Vec<bool>,
}

/// A float column keyed by a numeric key-id.
#[derive(Debug, PartialEq)]
pub struct FloatColumn {
    pub values: Vec<f64>,
    pub valid: Vec<bool>,
}

/// A dictionary-encoded string column: `codes[i]` indexes into `dict`,
/// or is `-1` for a null (paired with `valid[i] == false`).
#[derive(Debug, PartialEq)]
pub struct StringColumn {
    pub dict: Vec<String>,
    pub codes: Vec<i32>,
    pub valid: Vec<bool>,
}

#[derive(Debug, snafu::Snafu)]
pub enum BatchError {
    #[snafu(display("column {column} has length {actual}, expected row count {expected}"))]
    LengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
    #[snafu(display("string column code at row {row} is {code}, which is neither -1 nor a valid index into a {dict_len}-entry dictionary"))]
    InvalidStringCode {
        row: usize,
        code: i32,
        dict_len: usize,
    },
    #[snafu(display("string column code at row {row} is -1 but valid[{row}] is true"))]
    NullCodeMarkedValid { row: usize },
}

fn check_len(column: &'static str, expected: usize, actual: usize) -> Result<(), BatchError> {
    if expected == actual {
        Ok(())
    } else {
        Err(BatchError::LengthMismatch {
            column,
            expected,
            actual,
        })
    }
}

fn validate_string_column(col: &StringColumn) -> Result<(), BatchError> {
    check_len("string.codes", col.codes.len(), col.valid.len())?;
    for (row, (&code, &valid)) in col.codes.iter().zip(col.valid.iter()).enumerate() {
        if code == -1 {
            if valid {
                return Err(BatchError::NullCodeMarkedValid { row });
            }
        } else if code < 0 || code as usize >= col.dict.len() {
            return Err(BatchError::InvalidStringCode {
                row,
                code,
                dict_len: col.dict.len(),
            });
        }
    }
    Ok(())
}

/// An immutable, reference-counted, column-oriented table.
///
/// Every structural update (`with_float_column`, `with_string_column`)
/// returns a brand-new `ColumnBatch` that shares every column it did
/// not touch with `self` via `Arc` — no column is ever copied or
/// mutated after it's built.
#[derive(Debug)]
pub struct ColumnBatch {
    row_count: usize,
    id: Arc<IdColumn>,
    floats: HashMap<u32, Arc<FloatColumn>>,
    strings: HashMap<u32, Arc<StringColumn>>,
}

impl ColumnBatch {
    /// Build the base batch from just an id column.
    pub fn new(id_values: Vec<i64>, id_valid: Vec<bool>) -> Result<Self, BatchError> {
        check_len("id.valid", id_values.len(), id_valid.len())?;
        let row_count = id_values.len();
        Ok(Self {
            row_count,
            id: Arc::new(IdColumn {
                values: id_values,
                valid: id_valid,
            }),
            floats: HashMap::new(),
            strings: HashMap::new(),
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn id(&self) -> &IdColumn {
        &self.id
    }

    pub fn float_column(&self, key_id: u32) -> Option<&FloatColumn> {
        self.floats.get(&key_id).map(|c| c.as_ref())
    }

    pub fn string_column(&self, key_id: u32) -> Option<&StringColumn> {
        self.strings.get(&key_id).map(|c| c.as_ref())
    }

    /// Key-ids of every float column present on this batch, in no
    /// particular order (callers needing a deterministic order, e.g.
    /// `schema_delta`, sort it themselves).
    pub fn float_key_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.floats.keys().copied()
    }

    pub fn string_key_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.strings.keys().copied()
    }

    /// All key-ids present on this batch (floats and strings
    /// combined), excluding the always-present `id` column.
    pub fn key_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.float_key_ids().chain(self.string_key_ids())
    }

    /// Produce a new batch with `key_id` bound to a float column,
    /// sharing every other column with `self` by reference.
    pub fn with_float_column(
        self: &Arc<Self>,
        key_id: u32,
        values: Vec<f64>,
        valid: Vec<bool>,
    ) -> Result<Arc<Self>, BatchError> {
        check_len("float.values", self.row_count, values.len())?;
        check_len("float.valid", self.row_count, valid.len())?;

        let mut floats = self.floats.clone();
        floats.insert(key_id, Arc::new(FloatColumn { values, valid }));

        Ok(Arc::new(Self {
            row_count: self.row_count,
            id: Arc::clone(&self.id),
            floats,
            strings: self.strings.clone(),
        }))
    }

    /// Produce a new batch with `key_id` bound to a dictionary-encoded
    /// string column, sharing every other column with `self` by
    /// reference.
    pub fn with_string_column(
        self: &Arc<Self>,
        key_id: u32,
        dict: Vec<String>,
        codes: Vec<i32>,
        valid: Vec<bool>,
    ) -> Result<Arc<Self>, BatchError> {
        check_len("string.codes", self.row_count, codes.len())?;
        check_len("string.valid", self.row_count, valid.len())?;
        let col = StringColumn { dict, codes, valid };
        validate_string_column(&col)?;

        let mut strings = self.strings.clone();
        strings.insert(key_id, Arc::new(col));

        Ok(Arc::new(Self {
            row_count: self.row_count,
            id: Arc::clone(&self.id),
            floats: self.floats.clone(),
            strings,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(n: usize) -> Arc<ColumnBatch> {
        Arc::new(
            ColumnBatch::new((0..n as i64).collect(), vec![true; n]).unwrap(),
        )
    }

    #[test]
    fn base_batch_has_no_extra_columns() {
        let b = base(3);
        assert_eq!(b.row_count(), 3);
        assert_eq!(b.key_ids().count(), 0);
    }

    #[test]
    fn with_float_column_shares_id_and_adds_column() {
        let b0 = base(3);
        let b1 = b0
            .with_float_column(7, vec![1.0, 2.0, 3.0], vec![true, true, false])
            .unwrap();

        assert!(Arc::ptr_eq(&b0.id, &b1.id));
        assert_eq!(b1.float_column(7).unwrap().values, vec![1.0, 2.0, 3.0]);
        assert!(b0.float_column(7).is_none(), "parent batch unaffected");
    }

    #[test]
    fn with_float_column_rejects_length_mismatch() {
        let b0 = base(3);
        let err = b0.with_float_column(1, vec![1.0, 2.0], vec![true, true]);
        assert!(matches!(err, Err(BatchError::LengthMismatch { .. })));
    }

    #[test]
    fn chained_updates_preserve_earlier_columns() {
        let b0 = base(2);
        let b1 = b0.with_float_column(1, vec![1.0, 2.0], vec![true, true]).unwrap();
        let b2 = b1
            .with_string_column(2, vec!["a".into(), "b".into()], vec![0, 1], vec![true, true])
            .unwrap();

        assert!(b2.float_column(1).is_some());
        assert!(b2.string_column(2).is_some());
        assert!(Arc::ptr_eq(
            b1.float_column(1).map(|_| &b1.id).unwrap(),
            &b2.id
        ));
    }

    #[test]
    fn string_column_rejects_out_of_range_code() {
        let b0 = base(1);
        let err = b0.with_string_column(5, vec!["only".into()], vec![4], vec![true]);
        assert!(matches!(err, Err(BatchError::InvalidStringCode { .. })));
    }

    #[test]
    fn string_column_rejects_null_code_marked_valid() {
        let b0 = base(1);
        let err = b0.with_string_column(5, vec!["only".into()], vec![-1], vec![true]);
        assert!(matches!(err, Err(BatchError::NullCodeMarkedValid { .. })));
    }

    #[test]
    fn string_column_accepts_null_code_marked_invalid() {
        let b0 = base(1);
        let b1 = b0
            .with_string_column(5, vec!["only".into()], vec![-1], vec![false])
            .unwrap();
        assert_eq!(b1.string_column(5).unwrap().codes, vec![-1]);
    }
}
