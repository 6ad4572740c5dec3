use bf_columnar::{
    ArithmeticOp, BlockStore, ColumnData, ColumnDirectory, ColumnError, ComparisonOp, LogicalOp,
    UnaryOp,
};
use bf_types::{DType, Scalar};
use log::trace;

use crate::{FrameError, Table};

/// Right-hand side of an element-wise operation.
#[derive(Debug, Clone)]
pub enum Operand<'a> {
    Scalar(Scalar),
    Table(&'a Table),
}

impl From<Scalar> for Operand<'_> {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<bool> for Operand<'_> {
    fn from(value: bool) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i64> for Operand<'_> {
    fn from(value: i64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<i32> for Operand<'_> {
    fn from(value: i32) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Self::Scalar(value.into())
    }
}

impl From<&str> for Operand<'_> {
    fn from(value: &str) -> Self {
        Self::Scalar(value.into())
    }
}

impl<'a> From<&'a Table> for Operand<'a> {
    fn from(value: &'a Table) -> Self {
        Self::Table(value)
    }
}

/// Broadcast a scalar against a column. A missing scalar takes the column's
/// own missing marker when it has one.
fn scalar_column(value: &Scalar, dtype: DType, len: usize) -> Result<ColumnData, ColumnError> {
    if value.is_missing() && dtype.has_missing_marker() {
        ColumnData::from_scalars(&vec![value.clone(); len], dtype)
    } else {
        ColumnData::repeat(value, len)
    }
}

/// Operand pair after broadcasting: names plus equal-length left and right
/// columns.
struct Aligned {
    rows: usize,
    names: Vec<String>,
    left: Vec<ColumnData>,
    right: Vec<ColumnData>,
}

impl Table {
    pub(crate) fn with_columns(
        rows: usize,
        columns: impl IntoIterator<Item = (String, ColumnData)>,
    ) -> Result<Self, FrameError> {
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

    /// Stretch a 1-row or 1-column operand to the other side's shape. Only
    /// one axis may differ.
    fn broadcast(&self, other: &Self) -> Result<Aligned, FrameError> {
        let mismatch = || FrameError::BroadcastShape {
            left: self.shape(),
            right: other.shape(),
        };
        if self.rows != other.rows && self.ncols() != other.ncols() {
            return Err(mismatch());
        }
        let rows = match (self.rows, other.rows) {
            (l, r) if l == r => l,
            (1, r) => r,
            (l, 1) => l,
            _ => return Err(mismatch()),
        };
        let expand = |table: &Self| -> Result<Vec<ColumnData>, FrameError> {
            let columns = table.column_data()?;
            if table.rows == rows {
                return Ok(columns);
            }
            let repeated = vec![0; rows];
            Ok(columns.iter().map(|c| c.take(&repeated)).collect())
        };
        let mut left = expand(self)?;
        let mut right = expand(other)?;

        let names = match (left.len(), right.len()) {
            (l, r) if l == r => self.columns(),
            (1, r) => {
                left = vec![left.remove(0); r];
                other.columns()
            }
            (l, 1) => {
                right = vec![right.remove(0); l];
                self.columns()
            }
            _ => return Err(mismatch()),
        };
        if self.shape() != other.shape() {
            trace!(
                "broadcast {:?} against {:?} to {rows} rows by {} columns",
                self.shape(),
                other.shape(),
                names.len()
            );
        }
        Ok(Aligned {
            rows,
            names,
            left,
            right,
        })
    }

    /// Apply `kernel` column by column. With `reversed` the operand is the
    /// left-hand side.
    fn zip_with(
        &self,
        other: Operand<'_>,
        reversed: bool,
        kernel: impl Fn(&ColumnData, &ColumnData) -> Result<ColumnData, ColumnError>,
    ) -> Result<Self, FrameError> {
        let aligned = match other {
            Operand::Scalar(value) => {
                let left = self.column_data()?;
                let right = left
                    .iter()
                    .map(|c| scalar_column(&value, c.dtype(), self.rows))
                    .collect::<Result<Vec<_>, _>>()?;
                Aligned {
                    rows: self.rows,
                    names: self.columns(),
                    left,
                    right,
                }
            }
            Operand::Table(table) => self.broadcast(table)?,
        };

        let mut out = Vec::with_capacity(aligned.names.len());
        for ((name, l), r) in aligned.names.into_iter().zip(&aligned.left).zip(&aligned.right) {
            let data = if reversed { kernel(r, l)? } else { kernel(l, r)? };
            out.push((name, data));
        }
        Self::with_columns(aligned.rows, out)
    }

    /// `self <op> other`, element-wise.
    ///
    /// Booleans act as integers except `bool + bool` (or) and `bool * bool`
    /// (and). `/` always yields floats; integer `//` and `%` floor, with 0
    /// for a zero divisor. Strings only support `+`. Datetimes and durations
    /// support the usual `±` combinations, with NaT propagating.
    pub fn arithmetic<'a>(
        &self,
        other: impl Into<Operand<'a>>,
        op: ArithmeticOp,
    ) -> Result<Self, FrameError> {
        self.zip_with(other.into(), false, |l, r| l.binary_arithmetic(r, op))
    }

    /// `other <op> self`, element-wise.
    pub fn reverse_arithmetic<'a>(
        &self,
        other: impl Into<Operand<'a>>,
        op: ArithmeticOp,
    ) -> Result<Self, FrameError> {
        self.zip_with(other.into(), true, |l, r| l.binary_arithmetic(r, op))
    }

    /// Element-wise comparison into `Bool` columns. Missing values compare
    /// false except under `!=`.
    pub fn compare<'a>(
        &self,
        other: impl Into<Operand<'a>>,
        op: ComparisonOp,
    ) -> Result<Self, FrameError> {
        self.zip_with(other.into(), false, |l, r| l.compare(r, op))
    }

    pub fn logical<'a>(
        &self,
        other: impl Into<Operand<'a>>,
        op: LogicalOp,
    ) -> Result<Self, FrameError> {
        self.zip_with(other.into(), false, |l, r| l.logical(r, op))
    }

    pub fn unary(&self, op: UnaryOp) -> Result<Self, FrameError> {
        let columns = self
            .directory
            .names()
            .into_iter()
            .zip(self.column_data()?)
            .map(|(name, data)| data.unary(op).map(|out| (name, out)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_columns(self.rows, columns)
    }

    /// Compound assignment (`+=` and friends) is not supported; the binary
    /// operators return new tables instead.
    pub fn apply_in_place<'a>(
        &mut self,
        _other: impl Into<Operand<'a>>,
        op: ArithmeticOp,
    ) -> Result<(), FrameError> {
        Err(FrameError::InPlaceUnsupported(op.symbol()))
    }

    pub fn add<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::Add)
    }

    pub fn sub<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::Sub)
    }

    pub fn mul<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::Mul)
    }

    pub fn div<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::Div)
    }

    pub fn floordiv<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::FloorDiv)
    }

    pub fn rem<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::Mod)
    }

    pub fn pow<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.arithmetic(other, ArithmeticOp::Pow)
    }

    pub fn radd(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::Add)
    }

    pub fn rsub(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::Sub)
    }

    pub fn rmul(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::Mul)
    }

    pub fn rdiv(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::Div)
    }

    pub fn rfloordiv(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::FloorDiv)
    }

    pub fn rrem(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::Mod)
    }

    pub fn rpow(&self, other: impl Into<Scalar>) -> Result<Self, FrameError> {
        self.reverse_arithmetic(Operand::Scalar(other.into()), ArithmeticOp::Pow)
    }

    pub fn lt<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.compare(other, ComparisonOp::Lt)
    }

    pub fn le<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.compare(other, ComparisonOp::Le)
    }

    pub fn gt<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.compare(other, ComparisonOp::Gt)
    }

    pub fn ge<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.compare(other, ComparisonOp::Ge)
    }

    pub fn eq<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.compare(other, ComparisonOp::Eq)
    }

    pub fn ne<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.compare(other, ComparisonOp::Ne)
    }

    pub fn and<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.logical(other, LogicalOp::And)
    }

    pub fn or<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Self, FrameError> {
        self.logical(other, LogicalOp::Or)
    }

    pub fn neg(&self) -> Result<Self, FrameError> {
        self.unary(UnaryOp::Neg)
    }

    pub fn invert(&self) -> Result<Self, FrameError> {
        self.unary(UnaryOp::Invert)
    }
}
