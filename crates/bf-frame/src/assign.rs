use bf_columnar::{BlockStore, ColumnData};
use bf_index::{ColumnKey, ColumnSelector, Resolved, RowSelector, resolve_rows};
use bf_types::{Scalar, assignment_dtype};
use log::debug;

use crate::{FrameError, Table};

/// Right-hand side of [`Table::assign`].
#[derive(Debug, Clone)]
pub enum AssignValue {
    /// Broadcast to every selected cell.
    Scalar(Scalar),
    /// One-dimensional: a column when one column is selected and the length
    /// matches the selected rows, otherwise a row broadcast to every
    /// selected row.
    Values(Vec<Scalar>),
    /// Row-major grid whose shape must equal the selection.
    Nested(Vec<Vec<Scalar>>),
    Column(ColumnData),
    /// Positional source whose shape must equal the selection.
    Table(Table),
}

impl From<Scalar> for AssignValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for AssignValue {
    fn from(value: bool) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i64> for AssignValue {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i32> for AssignValue {
    fn from(value: i32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<f64> for AssignValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<&str> for AssignValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<Vec<Scalar>> for AssignValue {
    fn from(value: Vec<Scalar>) -> Self {
        Self::Values(value)
    }
}

impl From<Vec<Vec<Scalar>>> for AssignValue {
    fn from(value: Vec<Vec<Scalar>>) -> Self {
        Self::Nested(value)
    }
}

impl From<ColumnData> for AssignValue {
    fn from(value: ColumnData) -> Self {
        Self::Column(value)
    }
}

impl From<Table> for AssignValue {
    fn from(value: Table) -> Self {
        Self::Table(value)
    }
}

impl From<&Table> for AssignValue {
    fn from(value: &Table) -> Self {
        Self::Table(value.clone())
    }
}

impl AssignValue {
    fn row_count(&self) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Values(values) => Some(values.len()),
            Self::Nested(rows) => Some(rows.len()),
            Self::Column(data) => Some(data.len()),
            Self::Table(table) => Some(table.nrows()),
        }
    }
}

/// Column-major grid of `ncols` columns by `nrows` rows.
fn value_grid(value: AssignValue, nrows: usize, ncols: usize) -> Result<Vec<Vec<Scalar>>, FrameError> {
    let expected = (nrows, ncols);
    match value {
        AssignValue::Scalar(scalar) => Ok(vec![vec![scalar; nrows]; ncols]),
        AssignValue::Column(data) => value_grid(AssignValue::Values(data.to_scalars()), nrows, ncols),
        AssignValue::Values(values) => {
            if ncols == 1 && values.len() == nrows {
                Ok(vec![values])
            } else if ncols != 1 && values.len() == ncols {
                Ok(values.into_iter().map(|v| vec![v; nrows]).collect())
            } else {
                Err(FrameError::AssignShape {
                    expected,
                    found: (1, values.len()),
                })
            }
        }
        AssignValue::Nested(rows) => {
            let width = rows.first().map_or(0, Vec::len);
            if rows.len() != nrows || rows.iter().any(|r| r.len() != ncols) {
                return Err(FrameError::AssignShape {
                    expected,
                    found: (rows.len(), width),
                });
            }
            let mut grid = vec![Vec::with_capacity(nrows); ncols];
            for row in rows {
                for (column, value) in grid.iter_mut().zip(row) {
                    column.push(value);
                }
            }
            Ok(grid)
        }
        AssignValue::Table(table) => {
            if table.shape() != expected {
                return Err(FrameError::AssignShape {
                    expected,
                    found: table.shape(),
                });
            }
            Ok(table
                .column_data()?
                .iter()
                .map(ColumnData::to_scalars)
                .collect())
        }
    }
}

impl Table {
    /// Write `value` into `table[rows, cols]`.
    ///
    /// * A label not yet present (with every row selected) appends a new
    ///   column, classified as in construction.
    /// * Every row of a single existing column replaces that column; its
    ///   dtype may change, migrating it to another block.
    /// * Anything else writes cells. Values are checked per target column:
    ///   numeric columns take integers and floats, string columns take
    ///   strings, boolean columns take booleans, and all take missing
    ///   values. A float or missing value forces `Int64`/`Bool` storage to
    ///   `Float64`.
    ///
    /// On error the table is left unchanged.
    pub fn assign(
        &mut self,
        rows: impl Into<RowSelector>,
        cols: impl Into<ColumnSelector>,
        value: impl Into<AssignValue>,
    ) -> Result<(), FrameError> {
        let rows = rows.into();
        let cols = cols.into();
        let value = value.into();
        let all_rows = matches!(rows, RowSelector::All);

        if let ColumnSelector::Key(ColumnKey::Label(name)) = &cols
            && self.directory.position(name).is_none()
        {
            if !all_rows {
                return Err(FrameError::NewColumnRowSubset(name.clone()));
            }
            return self.insert_column(name.clone(), value);
        }

        let resolved_cols = self.resolve_column_selector(&cols)?;
        if all_rows && let Resolved::Scalar(position) = resolved_cols {
            let name = self.directory.entries()[position].name.clone();
            let data = column_from_value(&name, value, self.rows)?;
            return self.store_column(position, &data);
        }

        let resolved_rows = resolve_rows(&rows, self.rows)?;
        let grid = value_grid(value, resolved_rows.len(), resolved_cols.len())?;

        let mut plan = Vec::with_capacity(grid.len());
        for (&position, values) in resolved_cols.positions().iter().zip(&grid) {
            let entry = &self.directory.entries()[position];
            let target = assignment_dtype(entry.dtype, values).map_err(|source| {
                FrameError::IncompatibleAssignment {
                    column: entry.name.clone(),
                    source,
                }
            })?;
            let mut data = self.blocks.column(entry.dtype, entry.offset)?.cast(target)?;
            for (&row, value) in resolved_rows.positions().iter().zip(values) {
                data.set(row, value)?;
            }
            plan.push((position, data));
        }

        for (position, data) in &plan {
            self.store_column(*position, data)?;
        }
        Ok(())
    }

    fn insert_column(&mut self, name: String, value: AssignValue) -> Result<(), FrameError> {
        let rows = match value.row_count() {
            Some(rows) if self.directory.is_empty() => rows,
            _ => self.rows,
        };
        let data = column_from_value(&name, value, rows)?;
        let dtype = data.dtype();
        if rows == self.rows {
            let position = self.append_column(name, &data)?;
            debug!("appended {dtype} column at display position {position}");
            return Ok(());
        }

        let previous = (self.rows, std::mem::replace(&mut self.blocks, BlockStore::new(rows)));
        self.rows = rows;
        match self.append_column(name, &data) {
            Ok(position) => {
                debug!("sized empty table to {rows} rows for {dtype} column at position {position}");
                Ok(())
            }
            Err(err) => {
                (self.rows, self.blocks) = previous;
                Err(err)
            }
        }
    }
}

/// Materialize a column of `rows` values for `name` from an assigned value.
fn column_from_value(name: &str, value: AssignValue, rows: usize) -> Result<ColumnData, FrameError> {
    let data = match value {
        AssignValue::Scalar(scalar) => ColumnData::repeat(&scalar, rows)?,
        AssignValue::Values(values) => ColumnData::infer(&values)?,
        AssignValue::Column(data) => data,
        AssignValue::Nested(nested) => {
            if let Some(row) = nested.iter().find(|r| r.len() != 1) {
                return Err(FrameError::AssignShape {
                    expected: (rows, 1),
                    found: (nested.len(), row.len()),
                });
            }
            let values: Vec<Scalar> = nested.into_iter().flatten().collect();
            ColumnData::infer(&values)?
        }
        AssignValue::Table(table) => {
            if table.ncols() != 1 {
                return Err(FrameError::AssignShape {
                    expected: (rows, 1),
                    found: table.shape(),
                });
            }
            table.column_at(0)?
        }
    };
    if data.len() != rows {
        return Err(FrameError::LengthMismatch {
            column: name.to_owned(),
            expected: rows,
            found: data.len(),
        });
    }
    Ok(data)
}
