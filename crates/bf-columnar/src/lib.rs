#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};
use std::fmt;

use bf_types::{
    DType, NAT, NullKind, Scalar, TypeError, cast_scalar, format_datetime, format_duration,
    format_float, infer_dtype,
};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reserved dictionary code for a missing string.
pub const NULL_CODE: u32 = 0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("unsupported operand dtypes for {op}: {left} and {right}")]
    UnsupportedBinary {
        op: &'static str,
        left: DType,
        right: DType,
    },
    #[error("unsupported operand dtype for unary {op}: {dtype}")]
    UnsupportedUnary { op: &'static str, dtype: DType },
    #[error("{dtype} block has {ncols} columns; offset {offset} is out of bounds")]
    OffsetOutOfBounds {
        dtype: DType,
        offset: usize,
        ncols: usize,
    },
    #[error("row {row} is out of bounds for {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },
    #[error("block buffer holds {found} values; expected {expected}")]
    BlockShape { expected: usize, found: usize },
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("string dictionary is full")]
    DictionaryFull,
    #[error(
        "ingest column lists disagree: {names} names, {dtypes} dtypes, {locations} locations"
    )]
    PartsLengthMismatch {
        names: usize,
        dtypes: usize,
        locations: usize,
    },
    #[error("ingest {dtype} array has {found} rows; expected {expected}")]
    PartsRowMismatch {
        dtype: DType,
        expected: usize,
        found: usize,
    },
    #[error("ingest parts carry more than one {0} array")]
    DuplicateArray(DType),
    #[error("no {0} array supplied for columns of that dtype")]
    MissingArray(DType),
    #[error("column '{column}' location {location} exceeds the {ncols}-column {dtype} array")]
    LocationOutOfRange {
        column: String,
        dtype: DType,
        location: usize,
        ncols: usize,
    },
    #[error("{dtype} array location {location} is claimed by more than one column")]
    DuplicateLocation { dtype: DType, location: usize },
    #[error("column '{column}' uses string code {code} but its dictionary holds {len} entries")]
    InvalidStringCode {
        column: String,
        code: u32,
        len: usize,
    },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Typed buffer for one column, detached from any block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Bool(Vec<bool>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<Option<String>>),
    Datetime(Vec<i64>),
    Duration(Vec<i64>),
}

impl ColumnData {
    /// Materialize a typed buffer from scalars that must already fit `dtype`.
    ///
    /// Missing values map to the dtype's marker (NaN, null code, NaT) and are
    /// rejected for `Bool`/`Int64`, which have none.
    pub fn from_scalars(values: &[Scalar], dtype: DType) -> Result<Self, ColumnError> {
        let cast = values
            .iter()
            .map(|v| cast_scalar(v, dtype))
            .collect::<Result<Vec<_>, _>>()?;

        let out = match dtype {
            DType::Bool => Self::Bool(
                cast.into_iter()
                    .map(|v| match v {
                        Scalar::Bool(b) => Ok(b),
                        other => Err(missing_or_invalid(other, dtype)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            DType::Int64 => Self::Int64(
                cast.into_iter()
                    .map(|v| match v {
                        Scalar::Int64(i) => Ok(i),
                        other => Err(missing_or_invalid(other, dtype)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            DType::Float64 => Self::Float64(
                cast.into_iter()
                    .map(|v| match v {
                        Scalar::Float64(f) => f,
                        _ => f64::NAN,
                    })
                    .collect(),
            ),
            DType::Utf8 => Self::Utf8(
                cast.into_iter()
                    .map(|v| match v {
                        Scalar::Utf8(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
            ),
            DType::Datetime => Self::Datetime(
                cast.into_iter()
                    .map(|v| match v {
                        Scalar::Datetime(ns) => ns,
                        _ => NAT,
                    })
                    .collect(),
            ),
            DType::Duration => Self::Duration(
                cast.into_iter()
                    .map(|v| match v {
                        Scalar::Duration(ns) => ns,
                        _ => NAT,
                    })
                    .collect(),
            ),
        };
        Ok(out)
    }

    /// Classify a value list and materialize it.
    pub fn infer(values: &[Scalar]) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(values)?;
        Self::from_scalars(values, dtype)
    }

    /// Broadcast one scalar to `len` rows. The dtype comes from the scalar,
    /// so a zero-length result still carries it.
    pub fn repeat(value: &Scalar, len: usize) -> Result<Self, ColumnError> {
        let dtype = match value.dtype() {
            Some(dtype) => dtype,
            None => infer_dtype(std::slice::from_ref(value))?,
        };
        Self::from_scalars(&vec![value.clone(); len], dtype)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Datetime(_) => DType::Datetime,
            Self::Duration(_) => DType::Duration,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(d) => d.len(),
            Self::Int64(d) | Self::Datetime(d) | Self::Duration(d) => d.len(),
            Self::Float64(d) => d.len(),
            Self::Utf8(d) => d.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scalar at `row`, typed to the column's dtype; missing cells come back
    /// as `Scalar::Null` except float NaN, which stays a float.
    #[must_use]
    pub fn get(&self, row: usize) -> Option<Scalar> {
        Some(match self {
            Self::Bool(d) => Scalar::Bool(*d.get(row)?),
            Self::Int64(d) => Scalar::Int64(*d.get(row)?),
            Self::Float64(d) => Scalar::Float64(*d.get(row)?),
            Self::Utf8(d) => d
                .get(row)?
                .as_ref()
                .map_or(Scalar::Null(NullKind::Null), |s| Scalar::Utf8(s.clone())),
            Self::Datetime(d) => temporal_scalar(*d.get(row)?, Scalar::Datetime),
            Self::Duration(d) => temporal_scalar(*d.get(row)?, Scalar::Duration),
        })
    }

    #[must_use]
    pub fn to_scalars(&self) -> Vec<Scalar> {
        (0..self.len()).filter_map(|row| self.get(row)).collect()
    }

    #[must_use]
    pub fn has_missing(&self) -> bool {
        match self {
            Self::Bool(_) | Self::Int64(_) => false,
            Self::Float64(d) => d.iter().any(|v| v.is_nan()),
            Self::Utf8(d) => d.iter().any(Option::is_none),
            Self::Datetime(d) | Self::Duration(d) => d.contains(&NAT),
        }
    }

    /// Gather rows by position; positions must be in range.
    #[must_use]
    pub fn take(&self, positions: &[usize]) -> Self {
        match self {
            Self::Bool(d) => Self::Bool(positions.iter().map(|&i| d[i]).collect()),
            Self::Int64(d) => Self::Int64(positions.iter().map(|&i| d[i]).collect()),
            Self::Float64(d) => Self::Float64(positions.iter().map(|&i| d[i]).collect()),
            Self::Utf8(d) => Self::Utf8(positions.iter().map(|&i| d[i].clone()).collect()),
            Self::Datetime(d) => Self::Datetime(positions.iter().map(|&i| d[i]).collect()),
            Self::Duration(d) => Self::Duration(positions.iter().map(|&i| d[i]).collect()),
        }
    }

    /// Overwrite one cell. The value must already fit this column's dtype.
    pub fn set(&mut self, row: usize, value: &Scalar) -> Result<(), ColumnError> {
        let rows = self.len();
        if row >= rows {
            return Err(ColumnError::RowOutOfBounds { row, rows });
        }
        let dtype = self.dtype();
        let cast = cast_scalar(value, dtype)?;
        match (self, cast) {
            (Self::Bool(d), Scalar::Bool(v)) => d[row] = v,
            (Self::Int64(d), Scalar::Int64(v)) => d[row] = v,
            (Self::Float64(d), Scalar::Float64(v)) => d[row] = v,
            (Self::Float64(d), _) => d[row] = f64::NAN,
            (Self::Utf8(d), Scalar::Utf8(v)) => d[row] = Some(v),
            (Self::Utf8(d), _) => d[row] = None,
            (Self::Datetime(d), Scalar::Datetime(v)) | (Self::Duration(d), Scalar::Duration(v)) => {
                d[row] = v;
            }
            (Self::Datetime(d) | Self::Duration(d), _) => d[row] = NAT,
            (_, other) => return Err(missing_or_invalid(other, dtype)),
        }
        Ok(())
    }

    /// Value conversion used by `astype`.
    ///
    /// Numeric widening is exact, float to int truncates (NaN fails), anything
    /// renders to text, and bool conversion treats zero, `false` and the empty
    /// string as false. Missing values convert to `true`.
    pub fn cast(&self, target: DType) -> Result<Self, ColumnError> {
        let unsupported = || {
            ColumnError::Type(TypeError::UnsupportedConversion {
                from: self.dtype(),
                to: target,
            })
        };
        if self.dtype() == target {
            return Ok(self.clone());
        }

        let out = match (self, target) {
            (Self::Bool(d), DType::Int64) => Self::Int64(d.iter().map(|&b| i64::from(b)).collect()),
            (Self::Bool(d), DType::Float64) => {
                Self::Float64(d.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect())
            }
            (Self::Int64(d), DType::Float64) => Self::Float64(d.iter().map(|&v| v as f64).collect()),
            (Self::Int64(d), DType::Bool) => Self::Bool(d.iter().map(|&v| v != 0).collect()),
            (Self::Float64(d), DType::Int64) => Self::Int64(
                d.iter()
                    .map(|&v| {
                        if v.is_finite() {
                            Ok(v.trunc() as i64)
                        } else {
                            Err(TypeError::LossyFloatToInt { value: v })
                        }
                    })
                    .collect::<Result<_, _>>()?,
            ),
            (Self::Float64(d), DType::Bool) => {
                Self::Bool(d.iter().map(|&v| v.is_nan() || v != 0.0).collect())
            }
            (Self::Utf8(d), DType::Bool) => Self::Bool(
                d.iter()
                    .map(|v| v.as_ref().is_none_or(|s| !s.is_empty()))
                    .collect(),
            ),
            (Self::Datetime(d), DType::Bool) | (Self::Duration(d), DType::Bool) => {
                Self::Bool(d.iter().map(|&v| v != 0).collect())
            }
            (_, DType::Utf8) => Self::Utf8(self.render()),
            _ => return Err(unsupported()),
        };
        Ok(out)
    }

    fn render(&self) -> Vec<Option<String>> {
        match self {
            Self::Bool(d) => d
                .iter()
                .map(|&b| Some(if b { "True" } else { "False" }.to_owned()))
                .collect(),
            Self::Int64(d) => d.iter().map(|v| Some(v.to_string())).collect(),
            Self::Float64(d) => d
                .iter()
                .map(|&v| (!v.is_nan()).then(|| format_float(v)))
                .collect(),
            Self::Utf8(d) => d.clone(),
            Self::Datetime(d) => d
                .iter()
                .map(|&v| (v != NAT).then(|| format_datetime(v)))
                .collect(),
            Self::Duration(d) => d
                .iter()
                .map(|&v| (v != NAT).then(|| format_duration(v)))
                .collect(),
        }
    }

    fn as_i64(&self) -> Option<Vec<i64>> {
        match self {
            Self::Bool(d) => Some(d.iter().map(|&b| i64::from(b)).collect()),
            Self::Int64(d) => Some(d.clone()),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            Self::Float64(d) => Some(d.clone()),
            Self::Int64(d) => Some(d.iter().map(|&v| v as f64).collect()),
            Self::Bool(d) => Some(d.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect()),
            _ => None,
        }
    }

    /// Element-wise arithmetic between equal-length columns.
    pub fn binary_arithmetic(&self, right: &Self, op: ArithmeticOp) -> Result<Self, ColumnError> {
        check_lengths(self, right)?;
        let unsupported = ColumnError::UnsupportedBinary {
            op: op.symbol(),
            left: self.dtype(),
            right: right.dtype(),
        };

        match (self, right) {
            (Self::Utf8(l), Self::Utf8(r)) if op == ArithmeticOp::Add => Ok(Self::Utf8(
                l.iter()
                    .zip(r)
                    .map(|(a, b)| match (a, b) {
                        (Some(a), Some(b)) => Some(format!("{a}{b}")),
                        _ => None,
                    })
                    .collect(),
            )),
            (Self::Bool(l), Self::Bool(r)) if op == ArithmeticOp::Add => {
                Ok(Self::Bool(l.iter().zip(r).map(|(&a, &b)| a || b).collect()))
            }
            (Self::Bool(l), Self::Bool(r)) if op == ArithmeticOp::Mul => {
                Ok(Self::Bool(l.iter().zip(r).map(|(&a, &b)| a && b).collect()))
            }
            (Self::Datetime(l), Self::Duration(r))
                if matches!(op, ArithmeticOp::Add | ArithmeticOp::Sub) =>
            {
                Ok(Self::Datetime(temporal_binary(l, r, op)))
            }
            (Self::Duration(l), Self::Datetime(r)) if op == ArithmeticOp::Add => {
                Ok(Self::Datetime(temporal_binary(r, l, op)))
            }
            (Self::Datetime(l), Self::Datetime(r)) if op == ArithmeticOp::Sub => {
                Ok(Self::Duration(temporal_binary(l, r, op)))
            }
            (Self::Duration(l), Self::Duration(r))
                if matches!(op, ArithmeticOp::Add | ArithmeticOp::Sub) =>
            {
                Ok(Self::Duration(temporal_binary(l, r, op)))
            }
            _ if self.dtype().is_numeric() && right.dtype().is_numeric() => {
                if let (Some(l), Some(r)) = (self.as_i64(), right.as_i64())
                    && let Some(out) = vectorized_binary_i64(&l, &r, op)
                {
                    return Ok(Self::Int64(out));
                }
                match (self.as_f64(), right.as_f64()) {
                    (Some(l), Some(r)) => Ok(Self::Float64(vectorized_binary_f64(&l, &r, op))),
                    _ => Err(unsupported),
                }
            }
            _ => Err(unsupported),
        }
    }

    /// Element-wise comparison producing a `Bool` column.
    ///
    /// Missing values compare false under every operator except `!=`.
    pub fn compare(&self, right: &Self, op: ComparisonOp) -> Result<Self, ColumnError> {
        check_lengths(self, right)?;
        let out = match (self, right) {
            (Self::Utf8(l), Self::Utf8(r)) => l
                .iter()
                .zip(r)
                .map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => op.apply(a, b),
                    _ => op == ComparisonOp::Ne,
                })
                .collect(),
            (Self::Datetime(l), Self::Datetime(r)) | (Self::Duration(l), Self::Duration(r)) => l
                .iter()
                .zip(r)
                .map(|(&a, &b)| {
                    if a == NAT || b == NAT {
                        op == ComparisonOp::Ne
                    } else {
                        op.apply(&a, &b)
                    }
                })
                .collect(),
            (Self::Bool(l), Self::Bool(r)) => {
                l.iter().zip(r).map(|(a, b)| op.apply(a, b)).collect()
            }
            _ => {
                if let (Some(l), Some(r)) = (self.as_i64(), right.as_i64()) {
                    l.iter().zip(&r).map(|(a, b)| op.apply(a, b)).collect()
                } else if let (Some(l), Some(r)) = (self.as_f64(), right.as_f64()) {
                    // IEEE ordering already yields false (and true for `!=`) on NaN.
                    l.iter().zip(&r).map(|(a, b)| op.apply(a, b)).collect()
                } else {
                    return Err(ColumnError::UnsupportedBinary {
                        op: op.symbol(),
                        left: self.dtype(),
                        right: right.dtype(),
                    });
                }
            }
        };
        Ok(Self::Bool(out))
    }

    /// Element-wise `&`/`|`: logical on booleans, bitwise on integers.
    pub fn logical(&self, right: &Self, op: LogicalOp) -> Result<Self, ColumnError> {
        check_lengths(self, right)?;
        match (self, right) {
            (Self::Bool(l), Self::Bool(r)) => Ok(Self::Bool(
                l.iter().zip(r).map(|(&a, &b)| op.apply_bool(a, b)).collect(),
            )),
            _ => match (self.as_i64(), right.as_i64()) {
                (Some(l), Some(r)) => Ok(Self::Int64(
                    l.iter().zip(&r).map(|(&a, &b)| op.apply_i64(a, b)).collect(),
                )),
                _ => Err(ColumnError::UnsupportedBinary {
                    op: op.symbol(),
                    left: self.dtype(),
                    right: right.dtype(),
                }),
            },
        }
    }

    pub fn unary(&self, op: UnaryOp) -> Result<Self, ColumnError> {
        match (self, op) {
            (Self::Int64(d), UnaryOp::Neg) => Ok(Self::Int64(d.iter().map(|v| v.wrapping_neg()).collect())),
            (Self::Float64(d), UnaryOp::Neg) => Ok(Self::Float64(d.iter().map(|v| -v).collect())),
            (Self::Duration(d), UnaryOp::Neg) => Ok(Self::Duration(
                d.iter()
                    .map(|&v| if v == NAT { NAT } else { v.wrapping_neg() })
                    .collect(),
            )),
            (Self::Bool(d), UnaryOp::Invert) => Ok(Self::Bool(d.iter().map(|v| !v).collect())),
            (Self::Int64(d), UnaryOp::Invert) => Ok(Self::Int64(d.iter().map(|v| !v).collect())),
            _ => Err(ColumnError::UnsupportedUnary {
                op: op.symbol(),
                dtype: self.dtype(),
            }),
        }
    }
}

fn temporal_scalar(nanos: i64, wrap: fn(i64) -> Scalar) -> Scalar {
    if nanos == NAT {
        Scalar::Null(NullKind::NaT)
    } else {
        wrap(nanos)
    }
}

fn missing_or_invalid(value: Scalar, dtype: DType) -> ColumnError {
    match value {
        Scalar::Null(kind) => ColumnError::Type(TypeError::ValueIsMissing { kind }),
        other => ColumnError::Type(TypeError::InvalidCast {
            value: other.to_string(),
            to: dtype,
        }),
    }
}

fn check_lengths(left: &ColumnData, right: &ColumnData) -> Result<(), ColumnError> {
    if left.len() == right.len() {
        Ok(())
    } else {
        Err(ColumnError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        })
    }
}

fn temporal_binary(left: &[i64], right: &[i64], op: ArithmeticOp) -> Vec<i64> {
    left.iter()
        .zip(right)
        .map(|(&a, &b)| {
            if a == NAT || b == NAT {
                NAT
            } else if op == ArithmeticOp::Sub {
                a.wrapping_sub(b)
            } else {
                a.wrapping_add(b)
            }
        })
        .collect()
}

/// Integer kernel. Returns `None` when the result must be float: true
/// division always, and `pow` with any negative exponent.
fn vectorized_binary_i64(left: &[i64], right: &[i64], op: ArithmeticOp) -> Option<Vec<i64>> {
    if op == ArithmeticOp::Div || (op == ArithmeticOp::Pow && right.iter().any(|&e| e < 0)) {
        return None;
    }

    let apply: fn(i64, i64) -> i64 = match op {
        ArithmeticOp::Add => |a, b| a.wrapping_add(b),
        ArithmeticOp::Sub => |a, b| a.wrapping_sub(b),
        ArithmeticOp::Mul => |a, b| a.wrapping_mul(b),
        ArithmeticOp::FloorDiv => floor_div_i64,
        ArithmeticOp::Mod => floor_mod_i64,
        ArithmeticOp::Pow => |a, b| a.wrapping_pow(u32::try_from(b).unwrap_or(u32::MAX)),
        ArithmeticOp::Div => return None,
    };

    Some(left.iter().zip(right).map(|(&l, &r)| apply(l, r)).collect())
}

fn vectorized_binary_f64(left: &[f64], right: &[f64], op: ArithmeticOp) -> Vec<f64> {
    let apply: fn(f64, f64) -> f64 = match op {
        ArithmeticOp::Add => |a, b| a + b,
        ArithmeticOp::Sub => |a, b| a - b,
        ArithmeticOp::Mul => |a, b| a * b,
        ArithmeticOp::Div => |a, b| a / b,
        ArithmeticOp::FloorDiv => |a, b| (a / b).floor(),
        ArithmeticOp::Mod => floor_mod_f64,
        ArithmeticOp::Pow => f64::powf,
    };

    left.iter().zip(right).map(|(&l, &r)| apply(l, r)).collect()
}

// Integer division by zero yields 0.
fn floor_div_i64(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn floor_mod_i64(a: i64, b: i64) -> i64 {
    if b == 0 {
        return 0;
    }
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }
}

fn floor_mod_f64(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return f64::NAN;
    }
    let r = a % b;
    if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl ArithmeticOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
        }
    }

    #[must_use]
    pub fn is_commutative(self) -> bool {
        matches!(self, Self::Add | Self::Mul)
    }
}

/// Element-wise comparison operations that produce `Bool`-typed columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Gt,
    Lt,
    Eq,
    Ne,
    Ge,
    Le,
}

impl ComparisonOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    /// Operator with its operands swapped: `a < b` is `b > a`.
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Gt => Self::Lt,
            Self::Lt => Self::Gt,
            Self::Ge => Self::Le,
            Self::Le => Self::Ge,
            Self::Eq => Self::Eq,
            Self::Ne => Self::Ne,
        }
    }

    fn apply<T: PartialOrd + ?Sized>(self, a: &T, b: &T) -> bool {
        match self {
            Self::Gt => a > b,
            Self::Lt => a < b,
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Ge => a >= b,
            Self::Le => a <= b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::And => "&",
            Self::Or => "|",
        }
    }

    fn apply_bool(self, a: bool, b: bool) -> bool {
        match self {
            Self::And => a && b,
            Self::Or => a || b,
        }
    }

    fn apply_i64(self, a: i64, b: i64) -> i64 {
        match self {
            Self::And => a & b,
            Self::Or => a | b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Invert,
}

impl UnaryOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Invert => "~",
        }
    }
}

/// Column-major 2-D buffer: column `j` occupies `data[j * rows..(j + 1) * rows]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBlock<T> {
    rows: usize,
    ncols: usize,
    data: Vec<T>,
}

impl<T: Copy> DenseBlock<T> {
    #[must_use]
    pub fn empty(rows: usize) -> Self {
        Self {
            rows,
            ncols: 0,
            data: Vec::new(),
        }
    }

    pub fn from_column_major(rows: usize, ncols: usize, data: Vec<T>) -> Result<Self, ColumnError> {
        if data.len() != rows * ncols {
            return Err(ColumnError::BlockShape {
                expected: rows * ncols,
                found: data.len(),
            });
        }
        Ok(Self { rows, ncols, data })
    }

    pub fn from_columns(rows: usize, columns: &[Vec<T>]) -> Result<Self, ColumnError> {
        let mut block = Self::empty(rows);
        for column in columns {
            block.push_column(column)?;
        }
        Ok(block)
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    #[must_use]
    pub fn column(&self, col: usize) -> Option<&[T]> {
        (col < self.ncols).then(|| &self.data[col * self.rows..(col + 1) * self.rows])
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.rows {
            return None;
        }
        self.column(col).map(|values| values[row])
    }

    pub fn push_column(&mut self, values: &[T]) -> Result<usize, ColumnError> {
        if values.len() != self.rows {
            return Err(ColumnError::LengthMismatch {
                left: self.rows,
                right: values.len(),
            });
        }
        self.data.extend_from_slice(values);
        self.ncols += 1;
        Ok(self.ncols - 1)
    }

    /// Remove column `col`; later columns shift one offset left.
    pub fn remove_column(&mut self, col: usize) -> Option<Vec<T>> {
        if col >= self.ncols {
            return None;
        }
        let removed = self
            .data
            .drain(col * self.rows..(col + 1) * self.rows)
            .collect();
        self.ncols -= 1;
        Some(removed)
    }

    pub fn replace_column(&mut self, col: usize, values: &[T]) -> Result<(), ColumnError> {
        if values.len() != self.rows {
            return Err(ColumnError::LengthMismatch {
                left: self.rows,
                right: values.len(),
            });
        }
        if col >= self.ncols {
            return Err(ColumnError::BlockShape {
                expected: self.ncols,
                found: col + 1,
            });
        }
        self.data[col * self.rows..(col + 1) * self.rows].copy_from_slice(values);
        Ok(())
    }

    /// Fresh block holding `cols` (in that order) and, when given, only the
    /// listed rows. All positions must be in range.
    #[must_use]
    pub fn take(&self, rows: Option<&[usize]>, cols: &[usize]) -> Self {
        let out_rows = rows.map_or(self.rows, <[usize]>::len);
        let mut data = Vec::with_capacity(out_rows * cols.len());
        for &col in cols {
            let column = &self.data[col * self.rows..(col + 1) * self.rows];
            match rows {
                Some(rows) => data.extend(rows.iter().map(|&r| column[r])),
                None => data.extend_from_slice(column),
            }
        }
        Self {
            rows: out_rows,
            ncols: cols.len(),
            data,
        }
    }
}

/// Interner mapping distinct strings to codes `1..`; code 0 is null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringDictionary {
    values: Vec<String>,
    lookup: HashMap<String, u32>,
}

impl StringDictionary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get_or_insert(&mut self, value: &str) -> Result<u32, ColumnError> {
        if let Some(&code) = self.lookup.get(value) {
            return Ok(code);
        }
        let code = u32::try_from(self.values.len() + 1).map_err(|_| ColumnError::DictionaryFull)?;
        self.values.push(value.to_owned());
        self.lookup.insert(value.to_owned(), code);
        Ok(code)
    }

    pub fn encode(&mut self, value: Option<&str>) -> Result<u32, ColumnError> {
        value.map_or(Ok(NULL_CODE), |s| self.get_or_insert(s))
    }

    #[must_use]
    pub fn lookup(&self, value: &str) -> Option<u32> {
        self.lookup.get(value).copied()
    }

    /// String for `code`; `None` for the null code or an unknown code.
    #[must_use]
    pub fn resolve(&self, code: u32) -> Option<&str> {
        let idx = usize::try_from(code).ok()?.checked_sub(1)?;
        self.values.get(idx).map(String::as_str)
    }

    /// Distinct strings in code order; entry `k - 1` is the string for code `k`.
    #[must_use]
    pub fn into_values(self) -> Vec<String> {
        self.values
    }
}

/// Dictionary-encoded string block: a code block plus one dictionary shared
/// by all of its columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Utf8Block {
    codes: DenseBlock<u32>,
    dictionary: StringDictionary,
}

impl Utf8Block {
    #[must_use]
    pub fn empty(rows: usize) -> Self {
        Self {
            codes: DenseBlock::empty(rows),
            dictionary: StringDictionary::new(),
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.codes.rows()
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        self.codes.ncols()
    }

    #[must_use]
    pub fn codes(&self) -> &DenseBlock<u32> {
        &self.codes
    }

    #[must_use]
    pub fn dictionary(&self) -> &StringDictionary {
        &self.dictionary
    }

    /// `Some(None)` is a null cell; `None` is out of range.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<Option<&str>> {
        self.codes
            .get(row, col)
            .map(|code| self.dictionary.resolve(code))
    }

    #[must_use]
    pub fn column(&self, col: usize) -> Option<Vec<Option<String>>> {
        self.codes.column(col).map(|codes| {
            codes
                .iter()
                .map(|&code| self.dictionary.resolve(code).map(str::to_owned))
                .collect()
        })
    }

    fn encode_column(&mut self, values: &[Option<String>]) -> Result<Vec<u32>, ColumnError> {
        values
            .iter()
            .map(|v| self.dictionary.encode(v.as_deref()))
            .collect()
    }

    pub fn push_column(&mut self, values: &[Option<String>]) -> Result<usize, ColumnError> {
        if values.len() != self.rows() {
            return Err(ColumnError::LengthMismatch {
                left: self.rows(),
                right: values.len(),
            });
        }
        let codes = self.encode_column(values)?;
        self.codes.push_column(&codes)
    }

    pub fn remove_column(&mut self, col: usize) -> Option<Vec<Option<String>>> {
        let values = self.column(col)?;
        self.codes.remove_column(col);
        self.compact();
        Some(values)
    }

    pub fn replace_column(&mut self, col: usize, values: &[Option<String>]) -> Result<(), ColumnError> {
        if values.len() != self.rows() {
            return Err(ColumnError::LengthMismatch {
                left: self.rows(),
                right: values.len(),
            });
        }
        let codes = self.encode_column(values)?;
        self.codes.replace_column(col, &codes)?;
        self.compact();
        Ok(())
    }

    /// Drop dictionary entries no cell references and renumber the codes
    /// that remain, keeping their relative order.
    fn compact(&mut self) {
        let mut used = vec![false; self.dictionary.len() + 1];
        for &code in &self.codes.data {
            if let Some(slot) = usize::try_from(code).ok().and_then(|c| used.get_mut(c)) {
                *slot = true;
            }
        }
        let live = used.iter().skip(1).filter(|&&u| u).count();
        if live == self.dictionary.len() {
            return;
        }

        let before = self.dictionary.len();
        let old = std::mem::take(&mut self.dictionary);
        let mut remap = vec![NULL_CODE; used.len()];
        let mut next = NULL_CODE;
        for ((value, slot), _) in old
            .values
            .into_iter()
            .zip(remap.iter_mut().skip(1))
            .zip(used.iter().skip(1))
            .filter(|(_, live)| **live)
        {
            next += 1;
            *slot = next;
            self.dictionary.lookup.insert(value.clone(), next);
            self.dictionary.values.push(value);
        }
        for code in &mut self.codes.data {
            *code = usize::try_from(*code)
                .ok()
                .and_then(|c| remap.get(c))
                .copied()
                .unwrap_or(NULL_CODE);
        }
        trace!("compacted string dictionary: {before} -> {} entries", self.dictionary.len());
    }

    /// Fresh block over the selected cells with a rebuilt dictionary that
    /// holds only the strings still referenced.
    pub fn take(&self, rows: Option<&[usize]>, cols: &[usize]) -> Result<Self, ColumnError> {
        let gathered = self.codes.take(rows, cols);
        let mut dictionary = StringDictionary::new();
        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut data = Vec::with_capacity(gathered.data.len());
        for &code in &gathered.data {
            let new_code = match remap.get(&code) {
                Some(&mapped) => mapped,
                None => {
                    let mapped = dictionary.encode(self.dictionary.resolve(code))?;
                    remap.insert(code, mapped);
                    mapped
                }
            };
            data.push(new_code);
        }
        trace!(
            "rebuilt string dictionary: {} -> {} entries",
            self.dictionary.len(),
            dictionary.len()
        );
        Ok(Self {
            codes: DenseBlock::from_column_major(gathered.rows, gathered.ncols, data)?,
            dictionary,
        })
    }
}

/// One physical block per dtype, all sharing a row count.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStore {
    rows: usize,
    bools: DenseBlock<bool>,
    ints: DenseBlock<i64>,
    floats: DenseBlock<f64>,
    strings: Utf8Block,
    datetimes: DenseBlock<i64>,
    durations: DenseBlock<i64>,
}

impl BlockStore {
    #[must_use]
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            bools: DenseBlock::empty(rows),
            ints: DenseBlock::empty(rows),
            floats: DenseBlock::empty(rows),
            strings: Utf8Block::empty(rows),
            datetimes: DenseBlock::empty(rows),
            durations: DenseBlock::empty(rows),
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn ncols(&self, dtype: DType) -> usize {
        match dtype {
            DType::Bool => self.bools.ncols(),
            DType::Int64 => self.ints.ncols(),
            DType::Float64 => self.floats.ncols(),
            DType::Utf8 => self.strings.ncols(),
            DType::Datetime => self.datetimes.ncols(),
            DType::Duration => self.durations.ncols(),
        }
    }

    #[must_use]
    pub fn bools(&self) -> &DenseBlock<bool> {
        &self.bools
    }

    #[must_use]
    pub fn ints(&self) -> &DenseBlock<i64> {
        &self.ints
    }

    #[must_use]
    pub fn floats(&self) -> &DenseBlock<f64> {
        &self.floats
    }

    #[must_use]
    pub fn strings(&self) -> &Utf8Block {
        &self.strings
    }

    #[must_use]
    pub fn datetimes(&self) -> &DenseBlock<i64> {
        &self.datetimes
    }

    #[must_use]
    pub fn durations(&self) -> &DenseBlock<i64> {
        &self.durations
    }

    fn check_offset(&self, dtype: DType, offset: usize) -> Result<(), ColumnError> {
        let ncols = self.ncols(dtype);
        if offset < ncols {
            Ok(())
        } else {
            Err(ColumnError::OffsetOutOfBounds {
                dtype,
                offset,
                ncols,
            })
        }
    }

    pub fn column(&self, dtype: DType, offset: usize) -> Result<ColumnData, ColumnError> {
        self.check_offset(dtype, offset)?;
        let out = match dtype {
            DType::Bool => self.bools.column(offset).map(|c| ColumnData::Bool(c.to_vec())),
            DType::Int64 => self.ints.column(offset).map(|c| ColumnData::Int64(c.to_vec())),
            DType::Float64 => self.floats.column(offset).map(|c| ColumnData::Float64(c.to_vec())),
            DType::Utf8 => self.strings.column(offset).map(ColumnData::Utf8),
            DType::Datetime => self
                .datetimes
                .column(offset)
                .map(|c| ColumnData::Datetime(c.to_vec())),
            DType::Duration => self
                .durations
                .column(offset)
                .map(|c| ColumnData::Duration(c.to_vec())),
        };
        out.ok_or(ColumnError::OffsetOutOfBounds {
            dtype,
            offset,
            ncols: self.ncols(dtype),
        })
    }

    pub fn value(&self, dtype: DType, offset: usize, row: usize) -> Result<Scalar, ColumnError> {
        self.check_offset(dtype, offset)?;
        if row >= self.rows {
            return Err(ColumnError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }
        let out = match dtype {
            DType::Bool => self.bools.get(row, offset).map(Scalar::Bool),
            DType::Int64 => self.ints.get(row, offset).map(Scalar::Int64),
            DType::Float64 => self.floats.get(row, offset).map(Scalar::Float64),
            DType::Utf8 => self.strings.get(row, offset).map(Scalar::from),
            DType::Datetime => self
                .datetimes
                .get(row, offset)
                .map(|v| temporal_scalar(v, Scalar::Datetime)),
            DType::Duration => self
                .durations
                .get(row, offset)
                .map(|v| temporal_scalar(v, Scalar::Duration)),
        };
        out.ok_or(ColumnError::RowOutOfBounds {
            row,
            rows: self.rows,
        })
    }

    /// Append a column to the block of its dtype; returns its offset there.
    pub fn push_column(&mut self, column: &ColumnData) -> Result<usize, ColumnError> {
        match column {
            ColumnData::Bool(d) => self.bools.push_column(d),
            ColumnData::Int64(d) => self.ints.push_column(d),
            ColumnData::Float64(d) => self.floats.push_column(d),
            ColumnData::Utf8(d) => self.strings.push_column(d),
            ColumnData::Datetime(d) => self.datetimes.push_column(d),
            ColumnData::Duration(d) => self.durations.push_column(d),
        }
    }

    /// Remove a column; later offsets in the same block shift down by one.
    pub fn remove_column(&mut self, dtype: DType, offset: usize) -> Result<ColumnData, ColumnError> {
        self.check_offset(dtype, offset)?;
        let removed = match dtype {
            DType::Bool => self.bools.remove_column(offset).map(ColumnData::Bool),
            DType::Int64 => self.ints.remove_column(offset).map(ColumnData::Int64),
            DType::Float64 => self.floats.remove_column(offset).map(ColumnData::Float64),
            DType::Utf8 => self.strings.remove_column(offset).map(ColumnData::Utf8),
            DType::Datetime => self.datetimes.remove_column(offset).map(ColumnData::Datetime),
            DType::Duration => self.durations.remove_column(offset).map(ColumnData::Duration),
        };
        trace!("removed {dtype} column at offset {offset}");
        removed.ok_or(ColumnError::OffsetOutOfBounds {
            dtype,
            offset,
            ncols: self.ncols(dtype),
        })
    }

    /// Overwrite a column in place within the block of its own dtype.
    pub fn replace_column(&mut self, offset: usize, column: &ColumnData) -> Result<(), ColumnError> {
        self.check_offset(column.dtype(), offset)?;
        match column {
            ColumnData::Bool(d) => self.bools.replace_column(offset, d),
            ColumnData::Int64(d) => self.ints.replace_column(offset, d),
            ColumnData::Float64(d) => self.floats.replace_column(offset, d),
            ColumnData::Utf8(d) => self.strings.replace_column(offset, d),
            ColumnData::Datetime(d) => self.datetimes.replace_column(offset, d),
            ColumnData::Duration(d) => self.durations.replace_column(offset, d),
        }
    }

    /// Copy the listed `(dtype, offset)` columns (and rows, when given) into a
    /// fresh compacted store. Returns the store and each column's new offset.
    pub fn gather(
        &self,
        rows: Option<&[usize]>,
        columns: &[(DType, usize)],
    ) -> Result<(Self, Vec<usize>), ColumnError> {
        if let Some(rows) = rows
            && let Some(&row) = rows.iter().find(|&&r| r >= self.rows)
        {
            return Err(ColumnError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }

        let mut groups: HashMap<DType, Vec<usize>> = HashMap::new();
        let mut new_offsets = Vec::with_capacity(columns.len());
        for &(dtype, offset) in columns {
            self.check_offset(dtype, offset)?;
            let group = groups.entry(dtype).or_default();
            new_offsets.push(group.len());
            group.push(offset);
        }

        let out_rows = rows.map_or(self.rows, <[usize]>::len);
        let pick = |dtype: DType| groups.get(&dtype).map_or(&[][..], Vec::as_slice);
        let store = Self {
            rows: out_rows,
            bools: self.bools.take(rows, pick(DType::Bool)),
            ints: self.ints.take(rows, pick(DType::Int64)),
            floats: self.floats.take(rows, pick(DType::Float64)),
            strings: self.strings.take(rows, pick(DType::Utf8))?,
            datetimes: self.datetimes.take(rows, pick(DType::Datetime)),
            durations: self.durations.take(rows, pick(DType::Duration)),
        };
        trace!(
            "gathered {} columns x {} rows into compacted blocks",
            columns.len(),
            out_rows
        );
        Ok((store, new_offsets))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub name: String,
    pub dtype: DType,
    pub offset: usize,
}

/// Display-ordered column list plus a name index. A column's display order
/// is its position in `entries`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDirectory {
    entries: Vec<ColumnEntry>,
    positions: HashMap<String, usize>,
}

impl ColumnDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[ColumnEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&ColumnEntry> {
        self.entries.get(position)
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    #[must_use]
    pub fn count(&self, dtype: DType) -> usize {
        self.entries.iter().filter(|e| e.dtype == dtype).count()
    }

    /// Append a column at the next display position.
    pub fn push(&mut self, name: impl Into<String>, dtype: DType, offset: usize) -> Result<usize, ColumnError> {
        let name = name.into();
        if self.positions.contains_key(&name) {
            return Err(ColumnError::DuplicateColumn(name));
        }
        let position = self.entries.len();
        self.positions.insert(name.clone(), position);
        self.entries.push(ColumnEntry {
            name,
            dtype,
            offset,
        });
        Ok(position)
    }

    /// Point an existing entry at a new physical location.
    pub fn relocate(&mut self, position: usize, dtype: DType, offset: usize) {
        if let Some(entry) = self.entries.get_mut(position) {
            entry.dtype = dtype;
            entry.offset = offset;
        }
    }

    /// Account for a column removed from the `dtype` block at `offset`.
    pub fn release(&mut self, dtype: DType, offset: usize) {
        for entry in &mut self.entries {
            if entry.dtype == dtype && entry.offset > offset {
                entry.offset -= 1;
            }
        }
    }

    /// Replace every name at once, keeping order and physical layout.
    pub fn rename(&mut self, names: Vec<String>) -> Result<(), ColumnError> {
        if names.len() != self.entries.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.entries.len(),
                right: names.len(),
            });
        }
        let mut positions = HashMap::with_capacity(names.len());
        for (position, name) in names.iter().enumerate() {
            if positions.insert(name.clone(), position).is_some() {
                return Err(ColumnError::DuplicateColumn(name.clone()));
            }
        }
        for (entry, name) in self.entries.iter_mut().zip(names) {
            entry.name = name;
        }
        self.positions = positions;
        Ok(())
    }

    /// Check that every block's columns are claimed exactly once.
    pub fn validate(&self, blocks: &BlockStore) -> Result<(), ColumnError> {
        for dtype in DType::ALL {
            let ncols = blocks.ncols(dtype);
            let mut seen = vec![false; ncols];
            for entry in self.entries.iter().filter(|e| e.dtype == dtype) {
                match seen.get_mut(entry.offset) {
                    Some(slot) if !*slot => *slot = true,
                    Some(_) => {
                        return Err(ColumnError::DuplicateLocation {
                            dtype,
                            location: entry.offset,
                        });
                    }
                    None => {
                        return Err(ColumnError::OffsetOutOfBounds {
                            dtype,
                            offset: entry.offset,
                            ncols,
                        });
                    }
                }
            }
            if seen.iter().any(|s| !s) {
                return Err(ColumnError::BlockShape {
                    expected: ncols,
                    found: self.count(dtype),
                });
            }
        }
        Ok(())
    }
}

/// Typed 2-D array handed over by an ingestion reader. String arrays carry
/// per-column codes into that column's own dictionary.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestArray {
    Bool(DenseBlock<bool>),
    Int64(DenseBlock<i64>),
    Float64(DenseBlock<f64>),
    Utf8(DenseBlock<u32>),
    Datetime(DenseBlock<i64>),
    Duration(DenseBlock<i64>),
}

impl IngestArray {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Datetime(_) => DType::Datetime,
            Self::Duration(_) => DType::Duration,
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        match self {
            Self::Bool(b) => b.rows(),
            Self::Int64(b) | Self::Datetime(b) | Self::Duration(b) => b.rows(),
            Self::Float64(b) => b.rows(),
            Self::Utf8(b) => b.rows(),
        }
    }

    #[must_use]
    pub fn ncols(&self) -> usize {
        match self {
            Self::Bool(b) => b.ncols(),
            Self::Int64(b) | Self::Datetime(b) | Self::Duration(b) => b.ncols(),
            Self::Float64(b) => b.ncols(),
            Self::Utf8(b) => b.ncols(),
        }
    }
}

/// Output of an ingestion reader: per-dtype arrays, per-column string
/// dictionaries (keyed by location in the string array, code `k` resolving to
/// entry `k - 1`), and three parallel per-column lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestParts {
    pub rows: usize,
    pub arrays: Vec<IngestArray>,
    pub string_dictionaries: HashMap<usize, Vec<String>>,
    pub names: Vec<String>,
    pub dtypes: Vec<DType>,
    pub locations: Vec<usize>,
}

impl IngestParts {
    /// Rebuild blocks and directory. Columns of a dtype whose locations do
    /// not cover the array in order are compacted: the array is subset to
    /// those locations and offsets renumber from 0 in column order.
    pub fn assemble(self) -> Result<(BlockStore, ColumnDirectory), ColumnError> {
        let n = self.names.len();
        if self.dtypes.len() != n || self.locations.len() != n {
            return Err(ColumnError::PartsLengthMismatch {
                names: n,
                dtypes: self.dtypes.len(),
                locations: self.locations.len(),
            });
        }

        let mut seen_dtypes = HashSet::new();
        for array in &self.arrays {
            if !seen_dtypes.insert(array.dtype()) {
                return Err(ColumnError::DuplicateArray(array.dtype()));
            }
            if array.rows() != self.rows {
                return Err(ColumnError::PartsRowMismatch {
                    dtype: array.dtype(),
                    expected: self.rows,
                    found: array.rows(),
                });
            }
        }

        let mut store = BlockStore::new(self.rows);
        let mut offsets = vec![0_usize; n];
        for dtype in DType::ALL {
            let members: Vec<usize> = (0..n).filter(|&i| self.dtypes[i] == dtype).collect();
            if members.is_empty() {
                continue;
            }
            let array = self
                .arrays
                .iter()
                .find(|a| a.dtype() == dtype)
                .ok_or(ColumnError::MissingArray(dtype))?;

            let ncols = array.ncols();
            let mut claimed = HashSet::new();
            let mut locs = Vec::with_capacity(members.len());
            for &i in &members {
                let location = self.locations[i];
                if location >= ncols {
                    return Err(ColumnError::LocationOutOfRange {
                        column: self.names[i].clone(),
                        dtype,
                        location,
                        ncols,
                    });
                }
                if !claimed.insert(location) {
                    return Err(ColumnError::DuplicateLocation { dtype, location });
                }
                locs.push(location);
            }
            if locs.len() != ncols || locs.iter().enumerate().any(|(k, &loc)| k != loc) {
                debug!(
                    "compacting ingested {dtype} array: keeping {} of {ncols} columns",
                    locs.len()
                );
            }

            for (rank, (&i, &loc)) in members.iter().zip(&locs).enumerate() {
                let column = self.ingest_column(array, i, loc)?;
                let offset = store.push_column(&column)?;
                debug_assert_eq!(offset, rank);
                offsets[i] = offset;
            }
        }

        let mut directory = ColumnDirectory::new();
        for (i, name) in self.names.iter().enumerate() {
            directory.push(name.clone(), self.dtypes[i], offsets[i])?;
        }
        debug!(
            "assembled ingested table: {} rows x {} columns",
            self.rows,
            directory.len()
        );
        Ok((store, directory))
    }

    fn ingest_column(&self, array: &IngestArray, column: usize, loc: usize) -> Result<ColumnData, ColumnError> {
        let missing = || ColumnError::OffsetOutOfBounds {
            dtype: array.dtype(),
            offset: loc,
            ncols: array.ncols(),
        };
        Ok(match array {
            IngestArray::Bool(b) => ColumnData::Bool(b.column(loc).ok_or_else(missing)?.to_vec()),
            IngestArray::Int64(b) => ColumnData::Int64(b.column(loc).ok_or_else(missing)?.to_vec()),
            IngestArray::Float64(b) => {
                ColumnData::Float64(b.column(loc).ok_or_else(missing)?.to_vec())
            }
            IngestArray::Datetime(b) => {
                ColumnData::Datetime(b.column(loc).ok_or_else(missing)?.to_vec())
            }
            IngestArray::Duration(b) => {
                ColumnData::Duration(b.column(loc).ok_or_else(missing)?.to_vec())
            }
            IngestArray::Utf8(b) => {
                let codes = b.column(loc).ok_or_else(missing)?;
                let dictionary = self
                    .string_dictionaries
                    .get(&loc)
                    .map_or(&[][..], Vec::as_slice);
                let values = codes
                    .iter()
                    .map(|&code| {
                        if code == NULL_CODE {
                            return Ok(None);
                        }
                        usize::try_from(code - 1)
                            .ok()
                            .and_then(|idx| dictionary.get(idx))
                            .map(|s| Some(s.clone()))
                            .ok_or_else(|| ColumnError::InvalidStringCode {
                                column: self.names[column].clone(),
                                code,
                                len: dictionary.len(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                ColumnData::Utf8(values)
            }
        })
    }
}

impl fmt::Display for ColumnEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} @ {})", self.name, self.dtype, self.offset)
    }
}
