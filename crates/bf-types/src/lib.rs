#![forbid(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Missing-value sentinel for nanosecond temporal storage.
pub const NAT: i64 = i64::MIN;

/// Physical scalar family. Each variant owns exactly one block in a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Bool,
    Int64,
    Float64,
    Utf8,
    Datetime,
    Duration,
}

impl DType {
    /// Block iteration order.
    pub const ALL: [Self; 6] = [
        Self::Bool,
        Self::Int64,
        Self::Float64,
        Self::Utf8,
        Self::Datetime,
        Self::Duration,
    ];

    /// User-facing dtype name, as reported by `dtypes`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int64 => "int",
            Self::Float64 => "float",
            Self::Utf8 => "str",
            Self::Datetime => "datetime",
            Self::Duration => "timedelta",
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Bool | Self::Int64 | Self::Float64)
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Datetime | Self::Duration)
    }

    /// Whether the block for this dtype can hold a missing value.
    #[must_use]
    pub fn has_missing_marker(self) -> bool {
        !matches!(self, Self::Bool | Self::Int64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
    NaT,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    /// Nanoseconds since the Unix epoch.
    Datetime(i64),
    /// Nanoseconds.
    Duration(i64),
}

impl Scalar {
    /// Dtype of a present value; `None` for untyped nulls.
    #[must_use]
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Null(_) => None,
            Self::Bool(_) => Some(DType::Bool),
            Self::Int64(_) => Some(DType::Int64),
            Self::Float64(_) => Some(DType::Float64),
            Self::Utf8(_) => Some(DType::Utf8),
            Self::Datetime(_) => Some(DType::Datetime),
            Self::Duration(_) => Some(DType::Duration),
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            Self::Datetime(v) | Self::Duration(v) => *v == NAT,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Null(NullKind::NaN)) || matches!(self, Self::Float64(v) if v.is_nan())
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Datetime | DType::Duration => Self::Null(NullKind::NaT),
            DType::Bool | DType::Int64 | DType::Utf8 => Self::Null(NullKind::Null),
        }
    }

    /// Equality that treats any two missing values as equal.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        if self.is_missing() || other.is_missing() {
            return self.is_missing() && other.is_missing();
        }
        self == other
    }

    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Null(kind) => Err(TypeError::ValueIsMissing { kind: *kind }),
            Self::Utf8(v) => Err(TypeError::NonNumericValue {
                value: v.clone(),
                dtype: DType::Utf8,
            }),
            Self::Datetime(_) | Self::Duration(_) => Err(TypeError::NonNumericValue {
                value: self.to_string(),
                dtype: self.dtype().unwrap_or(DType::Datetime),
            }),
        }
    }

    #[must_use]
    pub fn from_datetime(value: NaiveDateTime) -> Self {
        value
            .and_utc()
            .timestamp_nanos_opt()
            .map_or(Self::Null(NullKind::NaT), Self::Datetime)
    }

    #[must_use]
    pub fn from_duration(value: TimeDelta) -> Self {
        value
            .num_nanoseconds()
            .map_or(Self::Null(NullKind::NaT), Self::Duration)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int64(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl From<Option<&str>> for Scalar {
    fn from(value: Option<&str>) -> Self {
        value.map_or(Self::Null(NullKind::Null), Self::from)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(value: NaiveDateTime) -> Self {
        Self::from_datetime(value)
    }
}

impl From<TimeDelta> for Scalar {
    fn from(value: TimeDelta) -> Self {
        Self::from_duration(value)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(NullKind::Null) => f.write_str("None"),
            Self::Null(NullKind::NaN) => f.write_str("nan"),
            Self::Null(NullKind::NaT) => f.write_str("NaT"),
            Self::Bool(v) => f.write_str(if *v { "True" } else { "False" }),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => f.write_str(&format_float(*v)),
            Self::Utf8(v) => f.write_str(v),
            Self::Datetime(v) => f.write_str(&format_datetime(*v)),
            Self::Duration(v) => f.write_str(&format_duration(*v)),
        }
    }
}

/// Canonical decimal text for a float: shortest round-trip digits, always
/// carrying a fractional part for integral values.
#[must_use]
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    format!("{value:?}")
}

#[must_use]
pub fn format_datetime(nanos: i64) -> String {
    if nanos == NAT {
        return "NaT".to_owned();
    }
    DateTime::from_timestamp_nanos(nanos)
        .naive_utc()
        .format("%Y-%m-%dT%H:%M:%S%.f")
        .to_string()
}

#[must_use]
pub fn format_duration(nanos: i64) -> String {
    if nanos == NAT {
        return "NaT".to_owned();
    }
    format!("{nanos} nanoseconds")
}

/// Column categories accepted by `select_dtypes` and `astype`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DTypeCategory {
    Bool,
    Int,
    Float,
    Str,
    /// Union of `Bool`, `Int` and `Float`.
    Number,
    Datetime,
    Timedelta,
}

impl DTypeCategory {
    #[must_use]
    pub fn matches(self, dtype: DType) -> bool {
        match self {
            Self::Number => dtype.is_numeric(),
            other => other.target_dtype() == Some(dtype),
        }
    }

    /// Concrete dtype a column is cast to; `None` for the `number` union.
    #[must_use]
    pub fn target_dtype(self) -> Option<DType> {
        match self {
            Self::Bool => Some(DType::Bool),
            Self::Int => Some(DType::Int64),
            Self::Float => Some(DType::Float64),
            Self::Str => Some(DType::Utf8),
            Self::Datetime => Some(DType::Datetime),
            Self::Timedelta => Some(DType::Duration),
            Self::Number => None,
        }
    }
}

impl FromStr for DTypeCategory {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(Self::Bool),
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "str" => Ok(Self::Str),
            "number" => Ok(Self::Number),
            "datetime" => Ok(Self::Datetime),
            "timedelta" => Ok(Self::Timedelta),
            other => Err(TypeError::UnknownCategory(other.to_owned())),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("dtype coercion from {left} to {right} has no compatible common type")]
    IncompatibleDtypes { left: DType, right: DType },
    #[error("cannot cast scalar {value} to {to}")]
    InvalidCast { value: String, to: DType },
    #[error("cannot cast column of dtype {from} to {to}")]
    UnsupportedConversion { from: DType, to: DType },
    #[error("cannot cast float {value} to int without loss")]
    LossyFloatToInt { value: f64 },
    #[error("value {value:?} has non-numeric dtype {dtype}")]
    NonNumericValue { value: String, dtype: DType },
    #[error("value is missing ({kind:?})")]
    ValueIsMissing { kind: NullKind },
    #[error("unknown dtype category '{0}'; expected one of bool, int, float, str, number, datetime, timedelta")]
    UnknownCategory(String),
}

pub fn common_dtype(left: DType, right: DType) -> Result<DType, TypeError> {
    use DType::{Bool, Float64, Int64};

    let out = match (left, right) {
        (a, b) if a == b => a,
        (Bool, Int64) | (Int64, Bool) => Int64,
        (Bool, Float64) | (Float64, Bool) => Float64,
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => return Err(TypeError::IncompatibleDtypes { left, right }),
    };

    Ok(out)
}

/// Classify a list of values the way construction does: missing values do
/// not vote, boolean and integer lists carrying a missing value become
/// float, and an all-missing list is float.
pub fn infer_dtype(values: &[Scalar]) -> Result<DType, TypeError> {
    let mut current: Option<DType> = None;
    let mut saw_missing = false;
    for value in values {
        if value.is_missing() {
            saw_missing = true;
            continue;
        }
        let Some(dtype) = value.dtype() else {
            continue;
        };
        current = Some(match current {
            None => dtype,
            Some(existing) => common_dtype(existing, dtype)?,
        });
    }

    Ok(match current {
        None => DType::Float64,
        Some(DType::Bool | DType::Int64) if saw_missing => DType::Float64,
        Some(dtype) => dtype,
    })
}

/// Dtype a column of `current` dtype must hold after the given values are
/// written into it.
///
/// Booleans only accept booleans; numeric columns accept integers and
/// floats; string and temporal columns accept their own kind. Missing values
/// are accepted everywhere but force `Bool`/`Int64` storage to `Float64`, as
/// does a float written into an integer column.
pub fn assignment_dtype<'a>(
    current: DType,
    values: impl IntoIterator<Item = &'a Scalar>,
) -> Result<DType, TypeError> {
    let mut promote = false;
    for value in values {
        if value.is_missing() {
            promote |= !current.has_missing_marker();
            continue;
        }
        let Some(dtype) = value.dtype() else {
            continue;
        };
        let accepted = match current {
            DType::Bool => dtype == DType::Bool,
            DType::Int64 | DType::Float64 => matches!(dtype, DType::Int64 | DType::Float64),
            DType::Utf8 | DType::Datetime | DType::Duration => dtype == current,
        };
        if !accepted {
            return Err(TypeError::IncompatibleDtypes {
                left: current,
                right: dtype,
            });
        }
        promote |= current == DType::Int64 && dtype == DType::Float64;
    }

    Ok(if promote { DType::Float64 } else { current })
}

/// Cast a scalar to a target dtype without changing its value.
///
/// Accepts identity casts, `Bool`/`Int64` widening into `Float64`, and any
/// missing value (mapped to the target's missing marker).
pub fn cast_scalar_owned(value: Scalar, target: DType) -> Result<Scalar, TypeError> {
    if value.is_missing() {
        return Ok(Scalar::missing_for_dtype(target));
    }
    if value.dtype() == Some(target) {
        return Ok(value);
    }

    match (target, &value) {
        (DType::Float64, Scalar::Int64(v)) => Ok(Scalar::Float64(*v as f64)),
        (DType::Float64, Scalar::Bool(v)) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),
        (DType::Int64, Scalar::Bool(v)) => Ok(Scalar::Int64(i64::from(*v))),
        (DType::Int64, Scalar::Float64(v)) => {
            if !v.is_finite() || *v != v.trunc() || *v < i64::MIN as f64 || *v > i64::MAX as f64 {
                return Err(TypeError::LossyFloatToInt { value: *v });
            }
            Ok(Scalar::Int64(*v as i64))
        }
        _ => Err(TypeError::InvalidCast {
            value: value.to_string(),
            to: target,
        }),
    }
}

pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    cast_scalar_owned(value.clone(), target)
}
