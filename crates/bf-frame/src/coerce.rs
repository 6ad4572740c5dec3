use bf_columnar::ColumnData;
use bf_index::IndexError;
use bf_types::{DType, DTypeCategory};
use log::debug;

use crate::{FrameError, Table};

fn parse_categories(names: &[&str]) -> Result<Vec<DTypeCategory>, FrameError> {
    names
        .iter()
        .map(|name| name.parse::<DTypeCategory>().map_err(FrameError::from))
        .collect()
}

impl Table {
    /// Columns whose dtype matches (`include`) or does not match (`exclude`)
    /// any of the named categories: `bool`, `int`, `float`, `str`, `number`,
    /// `datetime`, `timedelta`. Exactly one of the two lists must be given.
    pub fn select_dtypes(
        &self,
        include: Option<&[&str]>,
        exclude: Option<&[&str]>,
    ) -> Result<Self, FrameError> {
        let (names, keep_matching) = match (include, exclude) {
            (Some(names), None) => (names, true),
            (None, Some(names)) => (names, false),
            _ => return Err(FrameError::DtypeFilter),
        };
        let categories = parse_categories(names)?;
        let positions: Vec<usize> = self
            .directory
            .entries()
            .iter()
            .enumerate()
            .filter(|(_, e)| categories.iter().any(|c| c.matches(e.dtype)) == keep_matching)
            .map(|(position, _)| position)
            .collect();
        self.gather(None, &positions)
    }

    /// Cast every column to `category`.
    pub fn astype(&self, category: DTypeCategory) -> Result<Self, FrameError> {
        let names = self.columns();
        let targets: Vec<(&str, DTypeCategory)> =
            names.iter().map(|n| (n.as_str(), category)).collect();
        self.astype_columns(&targets)
    }

    /// Cast the named columns; the rest are copied unchanged. `number` is a
    /// group, not a cast target.
    pub fn astype_columns(&self, targets: &[(&str, DTypeCategory)]) -> Result<Self, FrameError> {
        let mut out = self.copy()?;
        let mut plan = Vec::with_capacity(targets.len());
        for &(name, category) in targets {
            let position = self
                .directory
                .position(name)
                .ok_or_else(|| IndexError::UnknownLabel(name.to_owned()))?;
            let target = category
                .target_dtype()
                .ok_or_else(|| FrameError::AbstractCastTarget("number".to_owned()))?;
            let data = self.column_at(position)?.cast(target).map_err(|source| {
                FrameError::Cast {
                    column: name.to_owned(),
                    source,
                }
            })?;
            plan.push((position, data));
        }
        for (position, data) in &plan {
            out.store_column(*position, data)?;
        }
        debug!("cast {} of {} columns", plan.len(), self.ncols());
        Ok(out)
    }

    /// Two-column summary: `Column Name` and `Data Type`.
    pub fn dtypes(&self) -> Result<Self, FrameError> {
        let names = self.columns();
        let dtypes = self
            .dtype_list()
            .into_iter()
            .map(|d| Some(d.name().to_owned()))
            .collect();
        self.summary("Data Type", ColumnData::Utf8(dtypes), names)
    }

    /// Two-column summary: `Column Name` and `Has NaN`, true when a column
    /// holds any missing value.
    pub fn hasnans(&self) -> Result<Self, FrameError> {
        let names = self.columns();
        let flags = self
            .column_data()?
            .iter()
            .map(ColumnData::has_missing)
            .collect();
        self.summary("Has NaN", ColumnData::Bool(flags), names)
    }

    fn summary(&self, label: &str, values: ColumnData, names: Vec<String>) -> Result<Self, FrameError> {
        let names = ColumnData::Utf8(names.into_iter().map(Some).collect());
        Self::with_columns(
            self.ncols(),
            [("Column Name".to_owned(), names), (label.to_owned(), values)],
        )
    }

    /// Whether any column is stored in the block for `dtype`.
    #[must_use]
    pub fn has_dtype(&self, dtype: DType) -> bool {
        self.directory.count(dtype) > 0
    }
}

#[cfg(test)]
mod tests {
    use bf_columnar::ColumnData;
    use bf_types::{DType, DTypeCategory, NullKind, Scalar};

    use crate::{ErrorKind, Table};

    fn sample() -> Table {
        Table::from_dict(
            [
                ("a", vec![Scalar::Int64(0), Scalar::Int64(2), Scalar::Int64(-3)]),
                ("b", vec![Scalar::from("x"), Scalar::from(""), Scalar::Null(NullKind::Null)]),
                ("c", vec![Scalar::Float64(1.9), Scalar::Float64(f64::NAN), Scalar::Float64(0.0)]),
                ("d", vec![Scalar::Bool(true), Scalar::Bool(false), Scalar::Bool(true)]),
            ],
            None,
        )
        .expect("construct")
    }

    #[test]
    fn select_dtypes_by_category() {
        let table = sample();
        let numeric = table
            .select_dtypes(Some(&["number"][..]), None)
            .expect("include");
        assert_eq!(numeric.columns(), ["a", "c", "d"]);
        let rest = table
            .select_dtypes(None, Some(&["float", "bool"][..]))
            .expect("exclude");
        assert_eq!(rest.columns(), ["a", "b"]);
        let err = table.select_dtypes(None, None).expect_err("neither");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = table
            .select_dtypes(Some(&["int"][..]), Some(&["str"][..]))
            .expect_err("both");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = table
            .select_dtypes(Some(&["complex"][..]), None)
            .expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn astype_bool_treats_missing_as_true() {
        let table = sample().astype(DTypeCategory::Bool).expect("bool");
        assert_eq!(table.column("a").expect("a"), ColumnData::Bool(vec![false, true, true]));
        assert_eq!(table.column("b").expect("b"), ColumnData::Bool(vec![true, false, true]));
        assert_eq!(table.column("c").expect("c"), ColumnData::Bool(vec![true, true, false]));
        assert_eq!(table.blocks().ncols(DType::Bool), 4);
        table.directory().validate(table.blocks()).expect("consistent");
    }

    #[test]
    fn astype_str_renders_text() {
        let table = sample().astype(DTypeCategory::Str).expect("str");
        assert_eq!(table.get(2, "a").expect("a"), Scalar::from("-3"));
        assert_eq!(table.get(0, "d").expect("d"), Scalar::from("True"));
        assert_eq!(table.get(1, "c").expect("c"), Scalar::Null(NullKind::Null));
    }

    #[test]
    fn astype_failures() {
        let table = sample();
        let err = table.astype(DTypeCategory::Number).expect_err("abstract");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = table
            .astype_columns(&[("c", DTypeCategory::Int)])
            .expect_err("nan to int");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = table
            .astype_columns(&[("b", DTypeCategory::Float)])
            .expect_err("text to float");
        assert_eq!(err.kind(), ErrorKind::Value);
        let err = table
            .astype_columns(&[("zz", DTypeCategory::Float)])
            .expect_err("unknown column");
        assert_eq!(err.kind(), ErrorKind::Key);
    }

    #[test]
    fn astype_columns_leaves_source_untouched() {
        let table = sample();
        let out = table
            .astype_columns(&[("a", DTypeCategory::Float), ("d", DTypeCategory::Int)])
            .expect("cast");
        assert_eq!(out.dtype_list(), [DType::Float64, DType::Utf8, DType::Float64, DType::Int64]);
        assert_eq!(out.column("d").expect("d"), ColumnData::Int64(vec![1, 0, 1]));
        assert_eq!(table.dtype_list(), [DType::Int64, DType::Utf8, DType::Float64, DType::Bool]);
        assert!(out.has_dtype(DType::Int64));
    }

    #[test]
    fn dtype_and_missing_summaries() {
        let table = sample();
        let dtypes = table.dtypes().expect("dtypes");
        assert_eq!(dtypes.columns(), ["Column Name", "Data Type"]);
        assert_eq!(dtypes.shape(), (4, 2));
        assert_eq!(
            dtypes.column("Data Type").expect("types"),
            ColumnData::Utf8(vec![
                Some("int".into()),
                Some("str".into()),
                Some("float".into()),
                Some("bool".into()),
            ])
        );
        let nans = table.hasnans().expect("hasnans");
        assert_eq!(
            nans.column("Has NaN").expect("flags"),
            ColumnData::Bool(vec![false, true, true, false])
        );
    }
}
