use std::collections::HashSet;
use std::sync::Arc;

use crate::batch::ColumnBatch;

#[derive(Debug, snafu::Snafu)]
pub enum RowSetError {
    #[snafu(display("row index {index} is out of bounds for a batch of {row_count} rows"))]
    IndexOutOfBounds { index: u32, row_count: usize },
    #[snafu(display("duplicate row index {index} in selection"))]
    DuplicateIndex { index: u32 },
    #[snafu(display("order is not a permutation of 0..{row_count}"))]
    NotAPermutation { row_count: usize },
}

fn validate_selection(selection: &[u32], row_count: usize) -> Result<(), RowSetError> {
    let mut seen = HashSet::with_capacity(selection.len());
    for &index in selection {
        if index as usize >= row_count {
            return Err(RowSetError::IndexOutOfBounds { index, row_count });
        }
        if !seen.insert(index) {
            return Err(RowSetError::DuplicateIndex { index });
        }
    }
    Ok(())
}

fn validate_order(order: &[u32], row_count: usize) -> Result<(), RowSetError> {
    if order.len() != row_count {
        return Err(RowSetError::NotAPermutation { row_count });
    }
    let mut seen = vec![false; row_count];
    for &index in order {
        if index as usize >= row_count {
            return Err(RowSetError::NotAPermutation { row_count });
        }
        if std::mem::replace(&mut seen[index as usize], true) {
            return Err(RowSetError::NotAPermutation { row_count });
        }
    }
    Ok(())
}

/// A view over a shared [`ColumnBatch`]: an optional inclusion
/// filter (`selection`) and/or an optional logical sort (`order`).
#[derive(Debug, Clone)]
pub struct RowSet {
    batch: Arc<ColumnBatch>,
    selection: Option<Vec<u32>>,
    order: Option<Vec<u32>>,
}

impl RowSet {
    /// A row-set over the whole batch, in natural `0..N` order.
    pub fn new(batch: Arc<ColumnBatch>) -> Self {
        Self {
            batch,
            selection: None,
            order: None,
        }
    }

    pub fn with_selection(batch: Arc<ColumnBatch>, selection: Vec<u32>) -> Result<Self, RowSetError> {
        validate_selection(&selection, batch.row_count())?;
        Ok(Self {
            batch,
            selection: Some(selection),
            order: None,
        })
    }

    pub fn with_order(batch: Arc<ColumnBatch>, order: Vec<u32>) -> Result<Self, RowSetError> {
        validate_order(&order, batch.row_count())?;
        Ok(Self {
            batch,
            selection: None,
            order: Some(order),
        })
    }

    pub fn with_selection_and_order(
        batch: Arc<ColumnBatch>,
        selection: Vec<u32>,
        order: Vec<u32>,
    ) -> Result<Self, RowSetError> {
        validate_selection(&selection, batch.row_count())?;
        validate_order(&order, batch.row_count())?;
        Ok(Self {
            batch,
            selection: Some(selection),
            order: Some(order),
        })
    }

    pub fn batch(&self) -> &Arc<ColumnBatch> {
        &self.batch
    }

    pub fn selection(&self) -> Option<&[u32]> {
        self.selection.as_deref()
    }

    pub fn order(&self) -> Option<&[u32]> {
        self.order.as_deref()
    }

    /// `N`: the row count of the underlying batch (not the logical,
    /// post-filter size).
    pub fn row_count(&self) -> usize {
        self.batch.row_count()
    }

    /// The active rows, in iteration order, per §3.2's rule: both
    /// present → traverse `order`, keep only indices in `selection`;
    /// only one present → use it directly; neither → `0..N`.
    pub fn active_rows(&self) -> Vec<u32> {
        match (&self.selection, &self.order) {
            (Some(selection), Some(order)) => {
                let allowed: HashSet<u32> = selection.iter().copied().collect();
                order.iter().copied().filter(|i| allowed.contains(i)).collect()
            }
            (Some(selection), None) => selection.clone(),
            (None, Some(order)) => order.clone(),
            (None, None) => (0..self.batch.row_count() as u32).collect(),
        }
    }

    /// The number of active rows after applying selection and order.
    pub fn logical_size(&self) -> usize {
        match (&self.selection, &self.order) {
            (Some(selection), Some(_)) => selection.len(),
            (Some(selection), None) => selection.len(),
            (None, Some(order)) => order.len(),
            (None, None) => self.batch.row_count(),
        }
    }

    /// True if `self` and `other` point at the exact same batch
    /// allocation — the fast path used by schema-delta computation.
    pub fn is_same_batch(&self, other: &RowSet) -> bool {
        Arc::ptr_eq(&self.batch, &other.batch)
    }
}
