use bf_columnar::ColumnData;
use bf_index::{
    ColumnKey, ColumnSelector, Resolved, RowSelector, normalize_position, resolve_column_key,
    resolve_columns, resolve_rows,
};
use bf_types::{DType, Scalar};

use crate::{FrameError, Table};

/// Result of `table[rows, cols]`: a bare scalar only when both selectors
/// are scalars, otherwise a new table.
#[derive(Debug, Clone)]
pub enum Selection {
    Scalar(Scalar),
    Table(Table),
}

impl Selection {
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    #[must_use]
    pub fn into_scalar(self) -> Option<Scalar> {
        match self {
            Self::Scalar(value) => Some(value),
            Self::Table(_) => None,
        }
    }

    #[must_use]
    pub fn into_table(self) -> Option<Table> {
        match self {
            Self::Table(table) => Some(table),
            Self::Scalar(_) => None,
        }
    }
}

impl Table {
    pub(crate) fn resolve_column_selector(
        &self,
        selector: &ColumnSelector,
    ) -> Result<Resolved, FrameError> {
        Ok(resolve_columns(selector, self.ncols(), |name| {
            self.directory.position(name)
        })?)
    }

    /// Composite selection over rows and columns.
    ///
    /// Rows are positional: a scalar, a list (duplicates and negatives
    /// allowed), a slice, or a boolean mask of exactly `nrows` entries.
    /// Columns accept positions, labels, lists mixing both (each column at
    /// most once), slices, and masks. In a column slice an integer stop is
    /// exclusive while a label stop is inclusive.
    ///
    /// Non-scalar results own freshly compacted blocks and list columns in
    /// the resolved order.
    pub fn select(
        &self,
        rows: impl Into<RowSelector>,
        cols: impl Into<ColumnSelector>,
    ) -> Result<Selection, FrameError> {
        let rows = rows.into();
        let resolved_rows = resolve_rows(&rows, self.rows)?;
        let resolved_cols = self.resolve_column_selector(&cols.into())?;

        if let (Resolved::Scalar(row), Resolved::Scalar(col)) = (&resolved_rows, &resolved_cols) {
            let entry = &self.directory.entries()[*col];
            let value = self.blocks.value(entry.dtype, entry.offset, *row)?;
            return Ok(Selection::Scalar(value));
        }

        let row_positions = match rows {
            RowSelector::All => None,
            _ => Some(resolved_rows.positions()),
        };
        Ok(Selection::Table(
            self.gather(row_positions, resolved_cols.positions())?,
        ))
    }

    /// Single cell by position and column key.
    pub fn get(&self, row: i64, col: impl Into<ColumnKey>) -> Result<Scalar, FrameError> {
        let row = normalize_position(row, self.rows)?;
        let col = resolve_column_key(&col.into(), self.ncols(), &|name: &str| {
            self.directory.position(name)
        })?;
        let entry = &self.directory.entries()[col];
        Ok(self.blocks.value(entry.dtype, entry.offset, row)?)
    }

    /// Column subset as a table, even for a single scalar key.
    pub fn select_columns(&self, cols: impl Into<ColumnSelector>) -> Result<Self, FrameError> {
        let resolved = self.resolve_column_selector(&cols.into())?;
        self.gather(None, resolved.positions())
    }

    /// Row subset as a table, even for a single scalar position.
    pub fn select_rows(&self, rows: impl Into<RowSelector>) -> Result<Self, FrameError> {
        let resolved = resolve_rows(&rows.into(), self.rows)?;
        let positions: Vec<usize> = (0..self.ncols()).collect();
        self.gather(Some(resolved.positions()), &positions)
    }

    /// Row mask from a single boolean column, e.g. the result of a comparison.
    pub fn to_row_mask(&self) -> Result<RowSelector, FrameError> {
        if self.ncols() != 1 {
            return Err(FrameError::MaskShape {
                expected: "exactly one column",
                found: self.shape(),
            });
        }
        match self.column_at(0)? {
            ColumnData::Bool(mask) => Ok(RowSelector::Mask(mask)),
            other => Err(FrameError::MaskDtype {
                column: self.directory.names().remove(0),
                dtype: other.dtype(),
            }),
        }
    }

    /// Column mask from a single row of boolean columns.
    pub fn to_column_mask(&self) -> Result<ColumnSelector, FrameError> {
        if self.rows != 1 {
            return Err(FrameError::MaskShape {
                expected: "exactly one row",
                found: self.shape(),
            });
        }
        if let Some(entry) = self.directory.entries().iter().find(|e| e.dtype != DType::Bool) {
            return Err(FrameError::MaskDtype {
                column: entry.name.clone(),
                dtype: entry.dtype,
            });
        }
        let mask = self
            .values()?
            .remove(0)
            .into_iter()
            .map(|v| matches!(v, Scalar::Bool(true)))
            .collect();
        Ok(ColumnSelector::Mask(mask))
    }
}
