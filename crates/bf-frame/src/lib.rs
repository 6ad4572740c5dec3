#![forbid(unsafe_code)]

//! Block-backed tables.
//!
//! A [`Table`] keeps one physical block per dtype ([`BlockStore`]) and a
//! [`ColumnDirectory`] mapping each user-visible column to its block and
//! offset. Selection and arithmetic always return new, independent tables;
//! only [`Table::assign`] and [`Table::set_columns`] mutate in place.

mod assign;
mod coerce;
mod ops;
mod select;

use std::str::FromStr;

use bf_columnar::{BlockStore, ColumnData, ColumnDirectory, ColumnError, IngestParts};
use bf_index::IndexError;
use bf_types::{DType, Scalar, TypeError};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use assign::AssignValue;
pub use bf_columnar::{ArithmeticOp, ComparisonOp, LogicalOp, UnaryOp};
pub use bf_index::{ColumnKey, ColumnSelector, ColumnSlice, RowSelector, RowSlice};
pub use bf_types::DTypeCategory;
pub use ops::Operand;
pub use select::Selection;

/// Row count used by `head`/`tail` when the caller has no preference.
pub const DEFAULT_HEAD_ROWS: i64 = 5;

/// Coarse classification of a [`FrameError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Wrong value or operand type for a dtype.
    Type,
    /// Well-typed but semantically invalid input.
    Value,
    /// Row/column count mismatch. A refinement of `Value`.
    Shape,
    /// Unknown column label.
    Key,
    /// Position out of range.
    Index,
    NotImplemented,
}

impl ErrorKind {
    /// Whether this kind counts as a value error; shape errors do.
    #[must_use]
    pub fn is_value_error(self) -> bool {
        matches!(self, Self::Value | Self::Shape)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("column '{column}' has {found} rows; expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("row {row} has {found} values; expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("column order must name every column exactly once: {0}")]
    InvalidColumnOrder(String),
    #[error("expected {expected} column names; got {found}")]
    ColumnCountMismatch { expected: usize, found: usize },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("cannot broadcast shapes {left:?} and {right:?}")]
    BroadcastShape {
        left: (usize, usize),
        right: (usize, usize),
    },
    #[error("cannot assign values of shape {found:?} into a selection of shape {expected:?}")]
    AssignShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("new column '{0}' can only be created by assigning to every row")]
    NewColumnRowSubset(String),
    #[error("cannot assign into column '{column}': {source}")]
    IncompatibleAssignment {
        column: String,
        #[source]
        source: TypeError,
    },
    #[error("cannot cast column '{column}': {source}")]
    Cast {
        column: String,
        #[source]
        source: ColumnError,
    },
    #[error("'{0}' names a group of dtypes, not a cast target")]
    AbstractCastTarget(String),
    #[error("select_dtypes requires exactly one of include or exclude")]
    DtypeFilter,
    #[error("orient must be 'array' or 'list'; got '{0}'")]
    InvalidOrient(String),
    #[error("boolean mask must come from a table with {expected}; got shape {found:?}")]
    MaskShape {
        expected: &'static str,
        found: (usize, usize),
    },
    #[error("boolean mask column '{column}' has dtype {dtype}")]
    MaskDtype { column: String, dtype: DType },
    #[error("in-place operator {0}= is not implemented; use the binary operator instead")]
    InPlaceUnsupported(&'static str),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl FrameError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthMismatch { .. } | Self::RaggedRows { .. } | Self::BroadcastShape { .. } => {
                ErrorKind::Shape
            }
            Self::InvalidColumnOrder(_)
            | Self::ColumnCountMismatch { .. }
            | Self::DuplicateColumn(_)
            | Self::AssignShape { .. }
            | Self::NewColumnRowSubset(_)
            | Self::Cast { .. }
            | Self::AbstractCastTarget(_)
            | Self::DtypeFilter
            | Self::InvalidOrient(_)
            | Self::MaskShape { .. } => ErrorKind::Value,
            Self::IncompatibleAssignment { .. } | Self::MaskDtype { .. } => ErrorKind::Type,
            Self::InPlaceUnsupported(_) => ErrorKind::NotImplemented,
            Self::Column(err) => column_error_kind(err),
            Self::Index(err) => match err {
                IndexError::OutOfBounds { .. } => ErrorKind::Index,
                IndexError::UnknownLabel(_) => ErrorKind::Key,
                IndexError::MaskLength { .. } => ErrorKind::Shape,
                IndexError::DuplicateSelection(_) | IndexError::ZeroStep => ErrorKind::Value,
            },
            Self::Type(err) => type_error_kind(err),
        }
    }
}

fn type_error_kind(err: &TypeError) -> ErrorKind {
    match err {
        TypeError::UnknownCategory(_) => ErrorKind::Value,
        _ => ErrorKind::Type,
    }
}

fn column_error_kind(err: &ColumnError) -> ErrorKind {
    match err {
        ColumnError::LengthMismatch { .. }
        | ColumnError::BlockShape { .. }
        | ColumnError::PartsLengthMismatch { .. }
        | ColumnError::PartsRowMismatch { .. }
        | ColumnError::DuplicateArray(_)
        | ColumnError::MissingArray(_)
        | ColumnError::LocationOutOfRange { .. }
        | ColumnError::DuplicateLocation { .. }
        | ColumnError::InvalidStringCode { .. } => ErrorKind::Shape,
        ColumnError::UnsupportedBinary { .. } | ColumnError::UnsupportedUnary { .. } => {
            ErrorKind::Type
        }
        ColumnError::OffsetOutOfBounds { .. } | ColumnError::RowOutOfBounds { .. } => {
            ErrorKind::Index
        }
        ColumnError::DuplicateColumn(_) | ColumnError::DictionaryFull => ErrorKind::Value,
        ColumnError::Type(err) => type_error_kind(err),
    }
}

/// Physical location of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub dtype: DType,
    pub offset: usize,
    pub display_order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictOrient {
    /// Typed buffers.
    Array,
    /// Scalar lists.
    List,
}

impl FromStr for DictOrient {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "array" => Ok(Self::Array),
            "list" => Ok(Self::List),
            other => Err(FrameError::InvalidOrient(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DictColumn {
    Array(ColumnData),
    List(Vec<Scalar>),
}

/// Table of named, typed columns stored in per-dtype blocks.
///
/// Rows are purely positional. `Clone` (and [`Table::copy`]) deep-copies
/// every block, so a copy never aliases its source.
#[derive(Debug, Clone)]
pub struct Table {
    rows: usize,
    directory: ColumnDirectory,
    blocks: BlockStore,
}

fn saturating_i64_to_usize(value: i64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn saturating_i64_abs_to_usize(value: i64) -> usize {
    usize::try_from(value.unsigned_abs()).unwrap_or(usize::MAX)
}

fn normalize_head_take(n: i64, len: usize) -> usize {
    if n >= 0 {
        saturating_i64_to_usize(n).min(len)
    } else {
        len.saturating_sub(saturating_i64_abs_to_usize(n))
    }
}

fn normalize_tail_window(n: i64, len: usize) -> (usize, usize) {
    if n >= 0 {
        let take = saturating_i64_to_usize(n).min(len);
        (len - take, take)
    } else {
        let skip = saturating_i64_abs_to_usize(n).min(len);
        (skip, len - skip)
    }
}

/// Name given to the column at `position` when the input carries none.
#[must_use]
pub fn synthetic_column_name(position: usize) -> String {
    format!("a{position}")
}

impl Table {
    /// Empty table: no rows, no columns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: 0,
            directory: ColumnDirectory::new(),
            blocks: BlockStore::new(0),
        }
    }

    /// Build from typed buffers, in the given display order.
    pub fn from_columns<K: Into<String>>(
        columns: impl IntoIterator<Item = (K, ColumnData)>,
    ) -> Result<Self, FrameError> {
        let columns: Vec<(String, ColumnData)> = columns
            .into_iter()
            .map(|(name, data)| (name.into(), data))
            .collect();
        let rows = columns.first().map_or(0, |(_, data)| data.len());

        let mut table = Self {
            rows,
            directory: ColumnDirectory::new(),
            blocks: BlockStore::new(rows),
        };
        for (name, data) in columns {
            table.append_column(name, &data)?;
        }
        Ok(table)
    }

    /// Build from named value lists, classifying each list independently.
    ///
    /// `order`, when given, must name every column exactly once and sets the
    /// display order.
    pub fn from_dict<K: Into<String>>(
        data: impl IntoIterator<Item = (K, Vec<Scalar>)>,
        order: Option<&[&str]>,
    ) -> Result<Self, FrameError> {
        let mut columns = Vec::new();
        for (name, values) in data {
            columns.push((name.into(), ColumnData::infer(&values)?));
        }

        let Some(order) = order else {
            return Self::from_columns(columns);
        };
        if order.len() != columns.len() {
            return Err(FrameError::InvalidColumnOrder(format!(
                "{} names given for {} columns",
                order.len(),
                columns.len()
            )));
        }
        let mut slots: Vec<Option<(String, ColumnData)>> = columns.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(order.len());
        for &name in order {
            let slot = slots
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|(n, _)| n == name))
                .and_then(Option::take)
                .ok_or_else(|| {
                    FrameError::InvalidColumnOrder(format!("'{name}' is missing or repeated"))
                })?;
            ordered.push(slot);
        }
        Self::from_columns(ordered)
    }

    /// Build from a row-major 2-D value grid with synthetic names `a0`, `a1`, ...
    pub fn from_array(rows: Vec<Vec<Scalar>>) -> Result<Self, FrameError> {
        let ncols = rows.first().map_or(0, Vec::len);
        if let Some((row, values)) = rows.iter().enumerate().find(|(_, r)| r.len() != ncols) {
            return Err(FrameError::RaggedRows {
                row,
                expected: ncols,
                found: values.len(),
            });
        }
        if ncols == 0 {
            return Ok(Self {
                rows: rows.len(),
                directory: ColumnDirectory::new(),
                blocks: BlockStore::new(rows.len()),
            });
        }

        let mut columns = Vec::with_capacity(ncols);
        for col in 0..ncols {
            let values: Vec<Scalar> = rows.iter().map(|r| r[col].clone()).collect();
            columns.push((synthetic_column_name(col), ColumnData::infer(&values)?));
        }
        Self::from_columns(columns)
    }

    /// Reassemble the output of an ingestion reader.
    pub fn from_parts(parts: IngestParts) -> Result<Self, FrameError> {
        let rows = parts.rows;
        let (blocks, directory) = parts.assemble()?;
        directory.validate(&blocks)?;
        Ok(Self {
            rows,
            directory,
            blocks,
        })
    }

    fn append_column(&mut self, name: String, data: &ColumnData) -> Result<usize, FrameError> {
        if data.len() != self.rows {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.rows,
                found: data.len(),
            });
        }
        if self.directory.position(&name).is_some() {
            return Err(FrameError::DuplicateColumn(name));
        }
        let offset = self.blocks.push_column(data)?;
        Ok(self.directory.push(name, data.dtype(), offset)?)
    }

    /// Overwrite the column at display `position`, migrating it to another
    /// block when the dtype changes.
    fn store_column(&mut self, position: usize, data: &ColumnData) -> Result<(), FrameError> {
        let entry = self
            .directory
            .get(position)
            .cloned()
            .ok_or(IndexError::OutOfBounds {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                len: self.directory.len(),
            })?;
        if data.len() != self.rows {
            return Err(FrameError::LengthMismatch {
                column: entry.name,
                expected: self.rows,
                found: data.len(),
            });
        }

        if entry.dtype == data.dtype() {
            self.blocks.replace_column(entry.offset, data)?;
            return Ok(());
        }

        // Different blocks, so pushing first leaves the old offset valid.
        let offset = self.blocks.push_column(data)?;
        if let Err(err) = self.blocks.remove_column(entry.dtype, entry.offset) {
            self.blocks.remove_column(data.dtype(), offset)?;
            return Err(err.into());
        }
        self.directory.release(entry.dtype, entry.offset);
        self.directory.relocate(position, data.dtype(), offset);
        debug!(
            "migrated column '{}' from {} block to {} block at offset {offset}",
            entry.name,
            entry.dtype,
            data.dtype()
        );
        Ok(())
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.directory.len())
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.rows * self.directory.len()
    }

    #[must_use]
    pub fn nrows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.directory.len()
    }

    /// Column names in display order.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        self.directory.names()
    }

    /// Replace every column name at once.
    pub fn set_columns(&mut self, names: &[impl AsRef<str>]) -> Result<(), FrameError> {
        if names.len() != self.directory.len() {
            return Err(FrameError::ColumnCountMismatch {
                expected: self.directory.len(),
                found: names.len(),
            });
        }
        let names: Vec<String> = names.iter().map(|n| n.as_ref().to_owned()).collect();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(FrameError::DuplicateColumn(name.clone()));
            }
        }
        self.directory.rename(names)?;
        Ok(())
    }

    #[must_use]
    pub fn column_info(&self, name: &str) -> Option<ColumnInfo> {
        let position = self.directory.position(name)?;
        let entry = self.directory.get(position)?;
        Some(ColumnInfo {
            dtype: entry.dtype,
            offset: entry.offset,
            display_order: position,
        })
    }

    #[must_use]
    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    #[must_use]
    pub fn directory(&self) -> &ColumnDirectory {
        &self.directory
    }

    /// Dtype of every column, in display order.
    #[must_use]
    pub fn dtype_list(&self) -> Vec<DType> {
        self.directory.entries().iter().map(|e| e.dtype).collect()
    }

    fn column_at(&self, position: usize) -> Result<ColumnData, FrameError> {
        let entry = self.directory.get(position).ok_or(IndexError::OutOfBounds {
            position: i64::try_from(position).unwrap_or(i64::MAX),
            len: self.directory.len(),
        })?;
        Ok(self.blocks.column(entry.dtype, entry.offset)?)
    }

    /// Typed copy of one column.
    pub fn column(&self, name: &str) -> Result<ColumnData, FrameError> {
        let position = self
            .directory
            .position(name)
            .ok_or_else(|| IndexError::UnknownLabel(name.to_owned()))?;
        self.column_at(position)
    }

    fn column_data(&self) -> Result<Vec<ColumnData>, FrameError> {
        (0..self.directory.len()).map(|p| self.column_at(p)).collect()
    }

    /// Row-major copy of every cell.
    pub fn values(&self) -> Result<Vec<Vec<Scalar>>, FrameError> {
        let columns = self.column_data()?;
        Ok((0..self.rows)
            .map(|row| columns.iter().filter_map(|c| c.get(row)).collect())
            .collect())
    }

    pub fn to_dict(&self, orient: DictOrient) -> Result<Vec<(String, DictColumn)>, FrameError> {
        let names = self.directory.names();
        let columns = self.column_data()?;
        Ok(names
            .into_iter()
            .zip(columns)
            .map(|(name, data)| {
                let column = match orient {
                    DictOrient::Array => DictColumn::Array(data),
                    DictOrient::List => DictColumn::List(data.to_scalars()),
                };
                (name, column)
            })
            .collect())
    }

    /// First `n` rows; a negative `n` drops that many rows from the end.
    pub fn head(&self, n: i64) -> Result<Self, FrameError> {
        let take = normalize_head_take(n, self.rows);
        let rows: Vec<usize> = (0..take).collect();
        self.take_rows(&rows)
    }

    /// Last `n` rows; a negative `n` drops that many rows from the start.
    pub fn tail(&self, n: i64) -> Result<Self, FrameError> {
        let (start, take) = normalize_tail_window(n, self.rows);
        let rows: Vec<usize> = (start..start + take).collect();
        self.take_rows(&rows)
    }

    /// Deep copy with freshly compacted blocks.
    pub fn copy(&self) -> Result<Self, FrameError> {
        let positions: Vec<usize> = (0..self.directory.len()).collect();
        self.gather(None, &positions)
    }

    fn take_rows(&self, rows: &[usize]) -> Result<Self, FrameError> {
        let positions: Vec<usize> = (0..self.directory.len()).collect();
        self.gather(Some(rows), &positions)
    }

    /// New table over the given rows (all when `None`) and display positions.
    fn gather(&self, rows: Option<&[usize]>, positions: &[usize]) -> Result<Self, FrameError> {
        let mut entries = Vec::with_capacity(positions.len());
        for &position in positions {
            let entry = self.directory.get(position).ok_or(IndexError::OutOfBounds {
                position: i64::try_from(position).unwrap_or(i64::MAX),
                len: self.directory.len(),
            })?;
            entries.push(entry);
        }
        let physical: Vec<(DType, usize)> = entries.iter().map(|e| (e.dtype, e.offset)).collect();
        let (blocks, offsets) = self.blocks.gather(rows, &physical)?;

        let mut directory = ColumnDirectory::new();
        for (entry, offset) in entries.iter().zip(offsets) {
            directory.push(entry.name.clone(), entry.dtype, offset)?;
        }
        Ok(Self {
            rows: blocks.rows(),
            directory,
            blocks,
        })
    }

    /// Logical equality: same names, dtypes and cell values, with missing
    /// values equal to each other. Physical layout is ignored.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        if self.shape() != other.shape()
            || self.columns() != other.columns()
            || self.dtype_list() != other.dtype_list()
        {
            return false;
        }
        match (self.values(), other.values()) {
            (Ok(left), Ok(right)) => left.iter().zip(&right).all(|(l, r)| {
                l.iter().zip(r).all(|(a, b)| a.semantic_eq(b))
            }),
            _ => false,
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use bf_columnar::ColumnData;
    use bf_types::{DType, NullKind, Scalar};

    use super::{DictColumn, DictOrient, ErrorKind, Table};

    fn sample() -> Table {
        Table::from_dict(
            [
                ("a", vec![Scalar::Int64(1), Scalar::Int64(5), Scalar::Int64(7)]),
                ("b", vec![Scalar::from("x"), Scalar::from("y"), Scalar::Null(NullKind::Null)]),
                ("c", vec![Scalar::Float64(1.5), Scalar::Float64(f64::NAN), Scalar::Float64(0.0)]),
                ("d", vec![Scalar::Bool(true), Scalar::Bool(false), Scalar::Bool(true)]),
                ("e", vec![Scalar::Int64(9), Scalar::Int64(8), Scalar::Int64(7)]),
            ],
            None,
        )
        .expect("construct")
    }

    #[test]
    fn construction_groups_columns_by_dtype() {
        let table = sample();
        assert_eq!(table.shape(), (3, 5));
        assert_eq!(table.size(), 15);
        assert_eq!(table.blocks().ncols(DType::Int64), 2);
        let info = table.column_info("e").expect("info");
        assert_eq!((info.dtype, info.offset, info.display_order), (DType::Int64, 1, 4));
        table.directory().validate(table.blocks()).expect("consistent");
    }

    #[test]
    fn unequal_lengths_are_shape_errors() {
        let err = Table::from_columns([
            ("a", ColumnData::Int64(vec![1, 2])),
            ("b", ColumnData::Int64(vec![1])),
        ])
        .expect_err("lengths differ");
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn explicit_order_must_be_permutation() {
        let data = || {
            [
                ("a", vec![Scalar::Int64(1)]),
                ("b", vec![Scalar::Int64(2)]),
            ]
        };
        let table = Table::from_dict(data(), Some(&["b", "a"][..])).expect("ordered");
        assert_eq!(table.columns(), ["b", "a"]);
        let err = Table::from_dict(data(), Some(&["b", "b"][..])).expect_err("repeated");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = Table::from_dict(data(), Some(&["b"][..])).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn bare_arrays_get_synthetic_names() {
        let table = Table::from_array(vec![
            vec![Scalar::Int64(1), Scalar::from("p")],
            vec![Scalar::Int64(2), Scalar::from("q")],
        ])
        .expect("array");
        assert_eq!(table.columns(), ["a0", "a1"]);
        assert_eq!(table.dtype_list(), [DType::Int64, DType::Utf8]);
        let err = Table::from_array(vec![vec![Scalar::Int64(1)], vec![]]).expect_err("ragged");
        assert_eq!(err.kind(), ErrorKind::Shape);
    }

    #[test]
    fn set_columns_validates_names() {
        let mut table = sample();
        let err = table.set_columns(&["a", "b"]).expect_err("too few");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = table
            .set_columns(&["a", "b", "c", "d", "a"])
            .expect_err("duplicate");
        assert_eq!(err.kind(), ErrorKind::Value);
        table
            .set_columns(&["v", "w", "x", "y", "z"])
            .expect("rename");
        assert_eq!(table.columns(), ["v", "w", "x", "y", "z"]);
        assert_eq!(table.column("z").expect("z"), ColumnData::Int64(vec![9, 8, 7]));
    }

    #[test]
    fn head_and_tail_windows() {
        let table = sample();
        assert_eq!(table.head(2).expect("head").nrows(), 2);
        assert_eq!(table.head(-1).expect("head").nrows(), 2);
        let tail = table.tail(1).expect("tail");
        assert_eq!(tail.column("a").expect("a"), ColumnData::Int64(vec![7]));
        assert_eq!(table.tail(super::DEFAULT_HEAD_ROWS).expect("tail").nrows(), 3);
    }

    #[test]
    fn values_and_dict_views() {
        let table = sample();
        let values = table.values().expect("values");
        assert_eq!(values[1][1], Scalar::from("y"));
        assert_eq!(values[2][1], Scalar::Null(NullKind::Null));
        let dict = table.to_dict("list".parse::<DictOrient>().expect("orient")).expect("dict");
        assert_eq!(dict[0].0, "a");
        assert_eq!(
            dict[0].1,
            DictColumn::List(vec![Scalar::Int64(1), Scalar::Int64(5), Scalar::Int64(7)])
        );
        let err = "records".parse::<DictOrient>().expect_err("unknown orient");
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn copy_is_logically_equal() {
        let table = sample();
        let copy = table.copy().expect("copy");
        assert!(table.equals(&copy));
    }

    #[test]
    fn orient_parses_and_kinds_serialize() {
        assert_eq!("list".parse::<DictOrient>().expect("list"), DictOrient::List);
        let err = "records".parse::<DictOrient>().expect_err("unknown orient");
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(
            serde_json::to_string(&ErrorKind::NotImplemented).expect("serialize"),
            "\"not_implemented\""
        );
    }

    #[test]
    fn migration_moves_between_populated_blocks() {
        let mut table = sample();
        table
            .store_column(0, &ColumnData::Utf8(vec![Some("p".into()), None, Some("x".into())]))
            .expect("int to string");
        assert_eq!(table.column_info("a").map(|i| (i.dtype, i.offset)), Some((DType::Utf8, 1)));
        assert_eq!(table.column_info("e").map(|i| (i.dtype, i.offset)), Some((DType::Int64, 0)));
        assert_eq!(table.get(0, "b").expect("b"), Scalar::from("x"));
        table.directory().validate(table.blocks()).expect("consistent");

        table
            .store_column(1, &ColumnData::Int64(vec![4, 5, 6]))
            .expect("string to int");
        assert_eq!(table.column_info("b").map(|i| (i.dtype, i.offset)), Some((DType::Int64, 1)));
        assert_eq!(table.column_info("a").map(|i| (i.dtype, i.offset)), Some((DType::Utf8, 0)));
        assert_eq!(table.get(2, "a").expect("a"), Scalar::from("x"));
        assert_eq!(table.blocks().strings().dictionary().len(), 2);
        assert_eq!(table.columns(), ["a", "b", "c", "d", "e"]);
        table.directory().validate(table.blocks()).expect("consistent");
    }
}

