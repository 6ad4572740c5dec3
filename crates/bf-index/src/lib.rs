#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::fmt;
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A column reference: a (possibly negative) position or a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnKey {
    Position(i64),
    Label(String),
}

impl From<i64> for ColumnKey {
    fn from(value: i64) -> Self {
        Self::Position(value)
    }
}

impl From<i32> for ColumnKey {
    fn from(value: i32) -> Self {
        Self::Position(i64::from(value))
    }
}

impl From<&str> for ColumnKey {
    fn from(value: &str) -> Self {
        Self::Label(value.to_owned())
    }
}

impl From<String> for ColumnKey {
    fn from(value: String) -> Self {
        Self::Label(value)
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Position(v) => write!(f, "{v}"),
            Self::Label(v) => write!(f, "{v}"),
        }
    }
}

/// Python-style slice. Row slices take integer bounds only; column slices
/// may mix integer and label bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice<B> {
    pub start: Option<B>,
    pub stop: Option<B>,
    pub step: Option<i64>,
}

pub type RowSlice = Slice<i64>;
pub type ColumnSlice = Slice<ColumnKey>;

impl<B> Default for Slice<B> {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            step: None,
        }
    }
}

impl<B> Slice<B> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn start(mut self, bound: impl Into<B>) -> Self {
        self.start = Some(bound.into());
        self
    }

    #[must_use]
    pub fn stop(mut self, bound: impl Into<B>) -> Self {
        self.stop = Some(bound.into());
        self
    }

    #[must_use]
    pub fn step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RowSelector {
    All,
    Position(i64),
    Positions(Vec<i64>),
    Slice(RowSlice),
    Mask(Vec<bool>),
}

impl From<i64> for RowSelector {
    fn from(value: i64) -> Self {
        Self::Position(value)
    }
}

impl From<i32> for RowSelector {
    fn from(value: i32) -> Self {
        Self::Position(i64::from(value))
    }
}

impl From<Vec<i64>> for RowSelector {
    fn from(value: Vec<i64>) -> Self {
        Self::Positions(value)
    }
}

impl From<Vec<bool>> for RowSelector {
    fn from(value: Vec<bool>) -> Self {
        Self::Mask(value)
    }
}

impl From<RowSlice> for RowSelector {
    fn from(value: RowSlice) -> Self {
        Self::Slice(value)
    }
}

impl From<RangeFull> for RowSelector {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl From<Range<i64>> for RowSelector {
    fn from(value: Range<i64>) -> Self {
        Self::Slice(RowSlice::new().start(value.start).stop(value.end))
    }
}

impl From<RangeFrom<i64>> for RowSelector {
    fn from(value: RangeFrom<i64>) -> Self {
        Self::Slice(RowSlice::new().start(value.start))
    }
}

impl From<RangeTo<i64>> for RowSelector {
    fn from(value: RangeTo<i64>) -> Self {
        Self::Slice(RowSlice::new().stop(value.end))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ColumnSelector {
    All,
    Key(ColumnKey),
    Keys(Vec<ColumnKey>),
    Slice(ColumnSlice),
    Mask(Vec<bool>),
}

impl ColumnSelector {
    /// List selector from anything convertible to keys, e.g. `["b", "c"]`.
    pub fn keys<K: Into<ColumnKey>>(keys: impl IntoIterator<Item = K>) -> Self {
        Self::Keys(keys.into_iter().map(Into::into).collect())
    }
}

impl From<ColumnKey> for ColumnSelector {
    fn from(value: ColumnKey) -> Self {
        Self::Key(value)
    }
}

impl From<&str> for ColumnSelector {
    fn from(value: &str) -> Self {
        Self::Key(value.into())
    }
}

impl From<String> for ColumnSelector {
    fn from(value: String) -> Self {
        Self::Key(value.into())
    }
}

impl From<i64> for ColumnSelector {
    fn from(value: i64) -> Self {
        Self::Key(value.into())
    }
}

impl From<i32> for ColumnSelector {
    fn from(value: i32) -> Self {
        Self::Key(value.into())
    }
}

impl From<Vec<ColumnKey>> for ColumnSelector {
    fn from(value: Vec<ColumnKey>) -> Self {
        Self::Keys(value)
    }
}

impl From<Vec<&str>> for ColumnSelector {
    fn from(value: Vec<&str>) -> Self {
        Self::keys(value)
    }
}

impl From<Vec<bool>> for ColumnSelector {
    fn from(value: Vec<bool>) -> Self {
        Self::Mask(value)
    }
}

impl From<ColumnSlice> for ColumnSelector {
    fn from(value: ColumnSlice) -> Self {
        Self::Slice(value)
    }
}

impl From<RangeFull> for ColumnSelector {
    fn from(_: RangeFull) -> Self {
        Self::All
    }
}

impl From<Range<i64>> for ColumnSelector {
    fn from(value: Range<i64>) -> Self {
        Self::Slice(ColumnSlice::new().start(value.start).stop(value.end))
    }
}

/// Positions selected along one axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A bare scalar selector; squeezes the axis away when both axes are scalar.
    Scalar(usize),
    Many(Vec<usize>),
}

impl Resolved {
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    #[must_use]
    pub fn positions(&self) -> &[usize] {
        match self {
            Self::Scalar(position) => std::slice::from_ref(position),
            Self::Many(positions) => positions,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions().is_empty()
    }

    #[must_use]
    pub fn into_positions(self) -> Vec<usize> {
        match self {
            Self::Scalar(position) => vec![position],
            Self::Many(positions) => positions,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("position {position} is out of bounds for axis of length {len}")]
    OutOfBounds { position: i64, len: usize },
    #[error("column '{0}' not found")]
    UnknownLabel(String),
    #[error("boolean selector has length {found}; expected {expected}")]
    MaskLength { expected: usize, found: usize },
    #[error("duplicate column selection: {0} resolves to an already selected column")]
    DuplicateSelection(ColumnKey),
    #[error("slice step cannot be zero")]
    ZeroStep,
}

/// Resolve a possibly negative position against an axis of length `len`.
pub fn normalize_position(position: i64, len: usize) -> Result<usize, IndexError> {
    let len_i128 = i128::try_from(len).unwrap_or(i128::MAX);
    let position_i128 = i128::from(position);
    let normalized = if position_i128 < 0 {
        len_i128 + position_i128
    } else {
        position_i128
    };

    if normalized < 0 || normalized >= len_i128 {
        return Err(IndexError::OutOfBounds { position, len });
    }
    usize::try_from(normalized).map_err(|_| IndexError::OutOfBounds { position, len })
}

/// One slice bound after kind-specific interpretation.
#[derive(Debug, Clone, Copy)]
enum Bound {
    /// Integer bound: negative counts from the end, then clamps.
    Relative(i64),
    /// Label bound already converted to an absolute iteration limit.
    Absolute(i128),
}

fn clamp_bound(bound: Option<Bound>, len: i128, step: i64, is_start: bool) -> i128 {
    let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
    match bound {
        None => {
            if (step > 0) == is_start {
                lower
            } else {
                upper
            }
        }
        Some(Bound::Relative(value)) => {
            let value = i128::from(value);
            if value < 0 {
                (value + len).max(lower)
            } else {
                value.min(upper)
            }
        }
        Some(Bound::Absolute(value)) => value.clamp(lower, upper),
    }
}

fn walk(start: i128, stop: i128, step: i64) -> Vec<usize> {
    let step = i128::from(step);
    let mut out = Vec::new();
    let mut current = start;
    while (step > 0 && current < stop) || (step < 0 && current > stop) {
        if let Ok(position) = usize::try_from(current) {
            out.push(position);
        }
        current += step;
    }
    out
}

fn slice_with_bounds(
    len: usize,
    start: Option<Bound>,
    stop: Option<Bound>,
    step: Option<i64>,
) -> Result<Vec<usize>, IndexError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(IndexError::ZeroStep);
    }
    let len = i128::try_from(len).unwrap_or(i128::MAX);
    let start = clamp_bound(start, len, step, true);
    let stop = clamp_bound(stop, len, step, false);
    Ok(walk(start, stop, step))
}

/// Positions selected by an integer slice over `len` elements.
pub fn slice_positions(len: usize, slice: &RowSlice) -> Result<Vec<usize>, IndexError> {
    slice_with_bounds(
        len,
        slice.start.map(Bound::Relative),
        slice.stop.map(Bound::Relative),
        slice.step,
    )
}

fn mask_positions(mask: &[bool], len: usize) -> Result<Vec<usize>, IndexError> {
    if mask.len() != len {
        return Err(IndexError::MaskLength {
            expected: len,
            found: mask.len(),
        });
    }
    Ok(mask
        .iter()
        .enumerate()
        .filter_map(|(position, &keep)| keep.then_some(position))
        .collect())
}

pub fn resolve_rows(selector: &RowSelector, nrows: usize) -> Result<Resolved, IndexError> {
    Ok(match selector {
        RowSelector::All => Resolved::Many((0..nrows).collect()),
        RowSelector::Position(position) => Resolved::Scalar(normalize_position(*position, nrows)?),
        RowSelector::Positions(positions) => Resolved::Many(
            positions
                .iter()
                .map(|&p| normalize_position(p, nrows))
                .collect::<Result<_, _>>()?,
        ),
        RowSelector::Slice(slice) => Resolved::Many(slice_positions(nrows, slice)?),
        RowSelector::Mask(mask) => Resolved::Many(mask_positions(mask, nrows)?),
    })
}

/// Position of a single column key.
pub fn resolve_column_key(
    key: &ColumnKey,
    ncols: usize,
    lookup: &impl Fn(&str) -> Option<usize>,
) -> Result<usize, IndexError> {
    match key {
        ColumnKey::Position(position) => normalize_position(*position, ncols),
        ColumnKey::Label(label) => lookup(label).ok_or_else(|| IndexError::UnknownLabel(label.clone())),
    }
}

/// Resolve a column selector. Label bounds resolve to that column's position;
/// a label stop is inclusive, so it extends one step past that position.
pub fn resolve_columns(
    selector: &ColumnSelector,
    ncols: usize,
    lookup: impl Fn(&str) -> Option<usize>,
) -> Result<Resolved, IndexError> {
    Ok(match selector {
        ColumnSelector::All => Resolved::Many((0..ncols).collect()),
        ColumnSelector::Key(key) => Resolved::Scalar(resolve_column_key(key, ncols, &lookup)?),
        ColumnSelector::Keys(keys) => {
            let mut seen = HashSet::with_capacity(keys.len());
            let mut positions = Vec::with_capacity(keys.len());
            for key in keys {
                let position = resolve_column_key(key, ncols, &lookup)?;
                if !seen.insert(position) {
                    return Err(IndexError::DuplicateSelection(key.clone()));
                }
                positions.push(position);
            }
            Resolved::Many(positions)
        }
        ColumnSelector::Slice(slice) => {
            let step = slice.step.unwrap_or(1);
            let bound = |key: &ColumnKey, is_stop: bool| -> Result<Bound, IndexError> {
                Ok(match key {
                    ColumnKey::Position(value) => Bound::Relative(*value),
                    ColumnKey::Label(label) => {
                        let position = lookup(label)
                            .ok_or_else(|| IndexError::UnknownLabel(label.clone()))?;
                        let position = i128::try_from(position).unwrap_or(i128::MAX);
                        let shift = if !is_stop {
                            0
                        } else if step > 0 {
                            1
                        } else {
                            -1
                        };
                        Bound::Absolute(position + shift)
                    }
                })
            };
            let start = slice.start.as_ref().map(|k| bound(k, false)).transpose()?;
            let stop = slice.stop.as_ref().map(|k| bound(k, true)).transpose()?;
            Resolved::Many(slice_with_bounds(ncols, start, stop, slice.step)?)
        }
        ColumnSelector::Mask(mask) => Resolved::Many(mask_positions(mask, ncols)?),
    })
}

#[cfg(test)]
mod tests {
    use super::{
        ColumnKey, ColumnSelector, ColumnSlice, IndexError, Resolved, RowSelector, RowSlice,
        normalize_position, resolve_columns, resolve_rows, slice_positions,
    };

    const NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];

    fn lookup(name: &str) -> Option<usize> {
        NAMES.iter().position(|n| *n == name)
    }

    fn columns(selector: impl Into<ColumnSelector>) -> Vec<&'static str> {
        resolve_columns(&selector.into(), NAMES.len(), lookup)
            .expect("selector resolves")
            .positions()
            .iter()
            .map(|&p| NAMES[p])
            .collect()
    }

    #[test]
    fn negative_positions_count_from_end() {
        assert_eq!(normalize_position(-1, 5).expect("in range"), 4);
        assert!(matches!(
            normalize_position(5, 5),
            Err(IndexError::OutOfBounds { position: 5, len: 5 })
        ));
        assert!(normalize_position(-6, 5).is_err());
    }

    #[test]
    fn integer_slices_follow_exclusive_stop() {
        assert_eq!(
            slice_positions(10, &RowSlice::new().start(2).stop(5)).expect("slice"),
            vec![2, 3, 4]
        );
        assert_eq!(
            slice_positions(10, &RowSlice::new().start(-3)).expect("slice"),
            vec![7, 8, 9]
        );
        assert_eq!(
            slice_positions(5, &RowSlice::new().step(-2)).expect("slice"),
            vec![4, 2, 0]
        );
        assert_eq!(
            slice_positions(5, &RowSlice::new().start(100).stop(-100).step(-1)).expect("slice"),
            vec![4, 3, 2, 1, 0]
        );
        assert!(slice_positions(5, &RowSlice::new().start(4).stop(1)).expect("slice").is_empty());
        assert_eq!(
            slice_positions(5, &RowSlice::new().step(0)),
            Err(IndexError::ZeroStep)
        );
    }

    #[test]
    fn label_stop_is_inclusive() {
        assert_eq!(
            columns(ColumnSlice::new().start("c").stop("f")),
            ["c", "d", "e", "f"]
        );
        assert_eq!(columns(ColumnSlice::new().start("c").stop(5)), ["c", "d", "e"]);
        assert_eq!(columns(ColumnSlice::new().start(2).stop("e")), ["c", "d", "e"]);
        assert_eq!(columns(ColumnSlice::new().stop("b")), ["a", "b"]);
    }

    #[test]
    fn label_slices_with_negative_step() {
        assert_eq!(
            columns(ColumnSlice::new().start(6).stop("d").step(-1)),
            ["g", "f", "e", "d"]
        );
        assert_eq!(
            columns(ColumnSlice::new().start("g").stop("b").step(-2)),
            ["g", "e", "c"]
        );
        assert_eq!(
            columns(ColumnSlice::new().start("c").stop("a").step(-1)),
            ["c", "b", "a"]
        );
        assert_eq!(
            columns(ColumnSlice::new().start(-2).stop("f").step(-1)),
            ["g", "f"]
        );
    }

    #[test]
    fn list_selection_rejects_aliased_columns() {
        let selector = ColumnSelector::Keys(vec!["b".into(), 5_i64.into(), "e".into(), "f".into()]);
        let err = resolve_columns(&selector, NAMES.len(), lookup).expect_err("duplicate");
        assert_eq!(err, IndexError::DuplicateSelection(ColumnKey::from("f")));
        assert_eq!(columns(vec!["h", "a"]), ["h", "a"]);
        assert_eq!(
            columns(ColumnSelector::Keys(vec![(-1_i64).into(), "a".into()])),
            ["h", "a"]
        );
    }

    #[test]
    fn unknown_label_is_reported() {
        let err = resolve_columns(&"asdf".into(), NAMES.len(), lookup).expect_err("unknown");
        assert_eq!(err, IndexError::UnknownLabel("asdf".to_owned()));
    }

    #[test]
    fn masks_must_match_axis_length() {
        let mask = vec![true, false, true];
        assert_eq!(
            resolve_rows(&RowSelector::Mask(mask.clone()), 3).expect("mask"),
            Resolved::Many(vec![0, 2])
        );
        assert_eq!(
            resolve_rows(&RowSelector::Mask(mask), 4),
            Err(IndexError::MaskLength {
                expected: 4,
                found: 3
            })
        );
    }

    #[test]
    fn scalar_row_stays_scalar() {
        assert_eq!(
            resolve_rows(&RowSelector::from(-1), 3).expect("scalar"),
            Resolved::Scalar(2)
        );
        let one = resolve_rows(&RowSelector::Positions(vec![1]), 3).expect("list");
        assert!(!one.is_scalar());
        assert_eq!(
            resolve_rows(&RowSelector::Positions(vec![2, 0, 2, -3]), 3).expect("list"),
            Resolved::Many(vec![2, 0, 2, 0])
        );
    }

    #[test]
    fn range_conversions() {
        assert_eq!(
            resolve_rows(&RowSelector::from(1_i64..3), 5).expect("range"),
            Resolved::Many(vec![1, 2])
        );
        assert_eq!(
            resolve_rows(&RowSelector::from(..), 2).expect("all"),
            Resolved::Many(vec![0, 1])
        );
    }

    #[test]
    fn column_key_and_slice_wire_shape() {
        let key = serde_json::to_value(ColumnKey::from("b")).expect("serialize");
        assert_eq!(key, serde_json::json!({"kind": "label", "value": "b"}));
        let back: ColumnKey =
            serde_json::from_value(serde_json::json!({"kind": "position", "value": -2}))
                .expect("deserialize");
        assert_eq!(back, ColumnKey::Position(-2));

        let slice: ColumnSlice = serde_json::from_value(serde_json::json!({
            "start": {"kind": "label", "value": "c"},
            "stop": {"kind": "position", "value": 5},
            "step": null
        }))
        .expect("slice");
        assert_eq!(slice, ColumnSlice::new().start("c").stop(5));
    }
}
