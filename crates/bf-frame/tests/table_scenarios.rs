//! End-to-end behaviour of the public table surface: construction,
//! selection, assignment, arithmetic and dtype handling working together.

use bf_columnar::{ColumnData, DenseBlock, IngestArray, IngestParts};
use bf_frame::{
    ColumnKey, ColumnSelector, ColumnSlice, DTypeCategory, ErrorKind, RowSelector, RowSlice,
    Table,
};
use bf_types::{DType, NullKind, Scalar};
use chrono::{NaiveDate, TimeDelta};

fn letters() -> Table {
    let columns: Vec<(String, ColumnData)> = ('a'..='h')
        .zip(0_i64..)
        .map(|(name, i)| (name.to_string(), ColumnData::Int64(vec![i, i + 10, i + 20])))
        .collect();
    Table::from_columns(columns).expect("construct")
}

fn mixed() -> Table {
    Table::from_dict(
        [
            ("a", vec![Scalar::Int64(1), Scalar::Int64(5), Scalar::Int64(7), Scalar::Int64(-3)]),
            (
                "b",
                vec![
                    Scalar::from("eleni"),
                    Scalar::from("niko"),
                    Scalar::Null(NullKind::Null),
                    Scalar::from("penny"),
                ],
            ),
            (
                "c",
                vec![
                    Scalar::Float64(5.4),
                    Scalar::Float64(-1.1),
                    Scalar::Float64(0.0),
                    Scalar::Float64(f64::NAN),
                ],
            ),
            (
                "d",
                vec![Scalar::Bool(true), Scalar::Bool(false), Scalar::Bool(true), Scalar::Bool(true)],
            ),
            ("e", vec![Scalar::Int64(90), Scalar::Int64(20), Scalar::Int64(30), Scalar::Int64(40)]),
        ],
        None,
    )
    .expect("construct")
}

#[test]
fn label_slices_resolve_each_bound_independently() {
    let table = letters();
    let pick = |slice: ColumnSlice| table.select_columns(slice).expect("slice").columns();
    assert_eq!(pick(ColumnSlice::new().start("c").stop("f")), ["c", "d", "e", "f"]);
    assert_eq!(pick(ColumnSlice::new().start("c").stop(5)), ["c", "d", "e"]);
    assert_eq!(
        pick(ColumnSlice::new().start(6).stop("d").step(-1)),
        ["g", "f", "e", "d"]
    );
    assert_eq!(pick(ColumnSlice::new().start(-3)), ["f", "g", "h"]);
    assert_eq!(pick(ColumnSlice::new().stop("b").step(-1)), ["h", "g", "f", "e", "d", "c", "b"]);
    assert_eq!(pick(ColumnSlice::new().start("b").stop("f").step(2)), ["b", "d", "f"]);
}

#[test]
fn duplicate_column_selection_is_a_value_error() {
    let table = letters();
    let err = table
        .select(
            ..,
            ColumnSelector::Keys(vec!["b".into(), ColumnKey::Position(5), "e".into(), "f".into()]),
        )
        .expect_err("aliasing");
    assert_eq!(err.kind(), ErrorKind::Value);
    let err = table
        .select_columns(ColumnSelector::keys(["a", "a"]))
        .expect_err("repeated label");
    assert_eq!(err.kind(), ErrorKind::Value);
}

#[test]
fn row_lists_allow_duplicates_and_negatives() {
    let table = letters();
    let picked = table
        .select(RowSelector::Positions(vec![2, -3, 2]), "b")
        .expect("rows")
        .into_table()
        .expect("table");
    assert_eq!(picked.column("b").expect("b"), ColumnData::Int64(vec![21, 1, 21]));
}

#[test]
fn boolean_row_selector_length_must_match() {
    let table = mixed();
    let err = table
        .select(vec![true, false], ..)
        .expect_err("short mask");
    assert!(err.kind().is_value_error());
    let picked = table
        .select_rows(vec![false, true, false, true])
        .expect("mask");
    assert_eq!(picked.column("e").expect("e"), ColumnData::Int64(vec![20, 40]));
}

#[test]
fn comparison_output_drives_row_selection() {
    let table = mixed();
    let mask = table
        .select_columns("e")
        .expect("e")
        .gt(25)
        .expect("gt")
        .to_row_mask()
        .expect("mask");
    let picked = table.select_rows(mask).expect("rows");
    assert_eq!(picked.column("a").expect("a"), ColumnData::Int64(vec![1, 7, -3]));
}

#[test]
fn missing_into_int_promotes_only_that_column() {
    let mut table = mixed();
    let before = table.copy().expect("copy");
    table.assign(2, "a", Scalar::Null(NullKind::NaN)).expect("assign");

    assert_eq!(
        table.dtype_list(),
        [DType::Float64, DType::Utf8, DType::Float64, DType::Bool, DType::Int64]
    );
    for name in ["b", "c", "d", "e"] {
        let left = table.column(name).expect("after").to_scalars();
        let right = before.column(name).expect("before").to_scalars();
        assert!(left.iter().zip(&right).all(|(l, r)| l.semantic_eq(r)), "{name} changed");
    }
    assert!(table.get(2, "a").expect("a").is_missing());
    assert_eq!(table.get(-1, 0).expect("a"), Scalar::Float64(-3.0));
    table.directory().validate(table.blocks()).expect("consistent");
}

#[test]
fn equal_shape_arithmetic_is_positional() {
    let left = Table::from_columns([
        ("x", ColumnData::Int64(vec![1, 2])),
        ("y", ColumnData::Float64(vec![0.5, 1.5])),
    ])
    .expect("left");
    let right = Table::from_columns([
        ("p", ColumnData::Int64(vec![10, 20])),
        ("q", ColumnData::Int64(vec![100, 200])),
    ])
    .expect("right");
    let out = left.add(&right).expect("add");
    assert_eq!(out.columns(), ["x", "y"]);
    assert_eq!(out.column("x").expect("x"), ColumnData::Int64(vec![11, 22]));
    assert_eq!(out.column("y").expect("y"), ColumnData::Float64(vec![100.5, 201.5]));
}

#[test]
fn scalar_operand_order() {
    let table = mixed().select_dtypes(Some(&["number"][..]), None).expect("numbers");
    let forward = table.add(5).expect("forward");
    let reverse = table.radd(5).expect("reverse");
    assert!(forward.equals(&reverse));
    let out = table.select_columns("e").expect("e").rsub(100).expect("rsub");
    assert_eq!(out.column("e").expect("e"), ColumnData::Int64(vec![10, 80, 70, 60]));
}

#[test]
fn string_tables_concatenate_and_compare() {
    let table = mixed();
    let err = table.mul(2).expect_err("string column present");
    assert_eq!(err.kind(), ErrorKind::Type);

    let names = table.select_columns("b").expect("b");
    let doubled = names.add(&names).expect("concat");
    assert_eq!(doubled.get(0, "b").expect("b"), Scalar::from("elenieleni"));
    assert_eq!(doubled.get(2, "b").expect("b"), Scalar::Null(NullKind::Null));

    let shifted = names.radd("x").expect("prefix");
    let ordered = names.lt(&shifted).expect("lt");
    assert_eq!(
        ordered.column("b").expect("b"),
        ColumnData::Bool(vec![true, true, false, true])
    );
    let err = names.add(1).expect_err("string plus int");
    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn select_dtypes_number_keeps_relative_order() {
    let table = mixed();
    let numbers = table.select_dtypes(Some(&["number"][..]), None).expect("include");
    assert_eq!(numbers.columns(), ["a", "c", "d", "e"]);
    let err = table
        .select_dtypes(Some(&["number"][..]), Some(&["str"][..]))
        .expect_err("both");
    assert_eq!(err.kind(), ErrorKind::Value);
}

#[test]
fn copies_do_not_alias() {
    let table = mixed();
    let mut copy = table.copy().expect("copy");
    copy.assign(.., "b", "same").expect("overwrite");
    copy.assign(0, "e", 0).expect("cell");
    assert_eq!(table.get(0, "b").expect("b"), Scalar::from("eleni"));
    assert_eq!(table.get(0, "e").expect("e"), Scalar::Int64(90));

    let mut subset = table.select_columns(ColumnSelector::keys(["e", "a"])).expect("subset");
    subset.assign(1, "a", 99).expect("cell");
    assert_eq!(table.get(1, "a").expect("a"), Scalar::Int64(5));
}

#[test]
fn range_assignment_from_table_subset() {
    let mut table = mixed();
    let source = table
        .select(RowSlice::new().stop(2), ColumnSelector::keys(["e", "c"]))
        .expect("source")
        .into_table()
        .expect("table");
    table
        .assign(RowSlice::new().start(2), ColumnSelector::keys(["a", "c"]), &source)
        .expect("assign");
    assert_eq!(table.column("a").expect("a"), ColumnData::Int64(vec![1, 5, 90, 20]));
    assert_eq!(
        table.column("c").expect("c"),
        ColumnData::Float64(vec![5.4, -1.1, 5.4, -1.1])
    );
}

#[test]
fn temporal_columns_follow_datetime_rules() {
    let start = NaiveDate::from_ymd_opt(2024, 3, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("date");
    let table = Table::from_dict(
        [(
            "when",
            vec![
                Scalar::from(start),
                Scalar::Null(NullKind::NaT),
                Scalar::from(start + TimeDelta::days(1)),
            ],
        )],
        None,
    )
    .expect("construct");
    assert_eq!(table.dtype_list(), [DType::Datetime]);

    let later = table.add(Scalar::from(TimeDelta::hours(6))).expect("shift");
    assert_eq!(later.get(0, "when").expect("when"), Scalar::from(start + TimeDelta::hours(6)));
    assert_eq!(later.get(1, "when").expect("when"), Scalar::Null(NullKind::NaT));

    let gap = later.sub(&table).expect("difference");
    assert_eq!(gap.dtype_list(), [DType::Duration]);
    assert_eq!(gap.get(2, "when").expect("when"), Scalar::from(TimeDelta::hours(6)));

    let err = table.add(&table).expect_err("datetime plus datetime");
    assert_eq!(err.kind(), ErrorKind::Type);

    let text = table.astype(DTypeCategory::Str).expect("text");
    assert_eq!(text.get(0, "when").expect("when"), Scalar::from("2024-03-01T12:00:00"));
    let kinds = table.select_dtypes(Some(&["datetime"][..]), None).expect("datetime");
    assert_eq!(kinds.ncols(), 1);
}

#[test]
fn ingest_parts_reassemble_with_compaction() {
    let mut parts = IngestParts {
        rows: 2,
        ..IngestParts::default()
    };
    parts.arrays.push(IngestArray::Int64(
        DenseBlock::from_columns(2, &[vec![1, 2], vec![0, 0], vec![3, 4]]).expect("ints"),
    ));
    parts.arrays.push(IngestArray::Utf8(
        DenseBlock::from_columns(2, &[vec![1, 2]]).expect("codes"),
    ));
    parts
        .string_dictionaries
        .insert(0, vec!["left".to_owned(), "right".to_owned()]);
    parts.names = vec!["n".into(), "s".into(), "m".into()];
    parts.dtypes = vec![DType::Int64, DType::Utf8, DType::Int64];
    parts.locations = vec![0, 0, 2];

    let table = Table::from_parts(parts).expect("assemble");
    assert_eq!(table.columns(), ["n", "s", "m"]);
    assert_eq!(table.column_info("m").map(|i| i.offset), Some(1));
    assert_eq!(table.column("m").expect("m"), ColumnData::Int64(vec![3, 4]));
    assert_eq!(table.get(1, "s").expect("s"), Scalar::from("right"));
}

#[test]
fn in_place_arithmetic_is_not_implemented() {
    let mut table = mixed();
    let err = table
        .apply_in_place(1, bf_frame::ArithmeticOp::Mul)
        .expect_err("in place");
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
}
