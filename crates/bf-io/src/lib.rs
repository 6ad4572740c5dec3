#![forbid(unsafe_code)]

//! Delimited-text ingestion.
//!
//! The reader makes two passes over the input. The first counts data rows
//! and classifies every column; the second fills typed buffers and
//! per-column string dictionaries, which are handed to
//! [`Table::from_parts`] as [`IngestParts`].

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use bf_columnar::{ColumnError, DenseBlock, IngestArray, IngestParts, StringDictionary};
use bf_frame::{ErrorKind, FrameError, Table, synthetic_column_name};
use bf_index::{ColumnKey, IndexError, resolve_column_key};
use bf_types::DType;
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("separator must be a single ASCII character; got {0:?}")]
    InvalidSeparator(char),
    #[error("usecols must name at least one column")]
    EmptyUsecols,
    #[error("header row {header} not found; input has {records} records after skipping")]
    HeaderNotFound { header: usize, records: usize },
    #[error("input has no columns")]
    NoColumns,
    #[error("column '{column}': cannot read {value:?} as {dtype}")]
    InvalidField {
        column: String,
        value: String,
        dtype: DType,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl IoError {
    /// Classification shared with table errors. Malformed input counts as a
    /// value error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Index(err) => FrameError::Index(err.clone()).kind(),
            Self::Column(err) => FrameError::Column(err.clone()).kind(),
            Self::Frame(err) => err.kind(),
            _ => ErrorKind::Value,
        }
    }
}

/// Records dropped before the header is located. Indices count raw records
/// from 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SkipRows {
    #[default]
    None,
    /// The first `n` records.
    Leading(usize),
    /// Exactly these records.
    Rows(BTreeSet<usize>),
}

impl SkipRows {
    fn skips(&self, index: usize) -> bool {
        match self {
            Self::None => false,
            Self::Leading(n) => index < *n,
            Self::Rows(rows) => rows.contains(&index),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadCsvOptions {
    pub sep: char,
    /// Header position among the records kept after `skiprows`; records
    /// before it are discarded. `None` reads every record as data and names
    /// columns `a0`, `a1`, ...
    pub header: Option<usize>,
    pub skiprows: SkipRows,
    /// Columns to keep, by name or position. Kept columns stay in file order.
    pub usecols: Option<Vec<ColumnKey>>,
}

impl Default for ReadCsvOptions {
    fn default() -> Self {
        Self {
            sep: ',',
            header: Some(0),
            skiprows: SkipRows::None,
            usecols: None,
        }
    }
}

impl ReadCsvOptions {
    fn delimiter(&self) -> Result<u8, IoError> {
        u8::try_from(self.sep)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(IoError::InvalidSeparator(self.sep))
    }

    fn validate(&self) -> Result<u8, IoError> {
        if self.usecols.as_ref().is_some_and(Vec::is_empty) {
            return Err(IoError::EmptyUsecols);
        }
        self.delimiter()
    }
}

enum Row<'a> {
    Header(&'a StringRecord),
    Data(&'a StringRecord),
}

/// Walk the input, dropping skipped records and those before the header.
fn scan(
    input: &str,
    options: &ReadCsvOptions,
    delimiter: u8,
    mut visit: impl FnMut(Row<'_>) -> Result<(), IoError>,
) -> Result<usize, IoError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(input.as_bytes());
    let mut record = StringRecord::new();
    let mut raw = 0;
    let mut kept = 0;
    while reader.read_record(&mut record)? {
        let index = raw;
        raw += 1;
        if options.skiprows.skips(index) {
            continue;
        }
        let position = kept;
        kept += 1;
        match options.header {
            Some(header) if position < header => {}
            Some(header) if position == header => visit(Row::Header(&record))?,
            _ => visit(Row::Data(&record))?,
        }
    }
    Ok(kept)
}

fn parse_bool(field: &str) -> Option<bool> {
    if field.eq_ignore_ascii_case("true") {
        Some(true)
    } else if field.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
}

fn classify(field: &str) -> Option<FieldKind> {
    if field.is_empty() {
        None
    } else if parse_bool(field).is_some() {
        Some(FieldKind::Bool)
    } else if field.parse::<i64>().is_ok() {
        Some(FieldKind::Int)
    } else if field.parse::<f64>().is_ok() {
        Some(FieldKind::Float)
    } else {
        Some(FieldKind::Text)
    }
}

/// First-pass summary of one column.
#[derive(Debug, Clone, Copy, Default)]
struct ColumnScan {
    kind: Option<FieldKind>,
    missing: bool,
}

impl ColumnScan {
    fn observe(&mut self, field: &str) {
        let Some(kind) = classify(field) else {
            self.missing = true;
            return;
        };
        self.kind = Some(match (self.kind, kind) {
            (None, kind) => kind,
            (Some(seen), kind) if seen == kind => kind,
            (Some(FieldKind::Int), FieldKind::Float) | (Some(FieldKind::Float), FieldKind::Int) => {
                FieldKind::Float
            }
            _ => FieldKind::Text,
        });
    }

    fn sink(self, rows: usize) -> Sink {
        match self.kind {
            Some(FieldKind::Text) => Sink::Utf8(Vec::with_capacity(rows), StringDictionary::new()),
            Some(FieldKind::Bool) if !self.missing => Sink::Bool(Vec::with_capacity(rows)),
            Some(FieldKind::Int) if !self.missing => Sink::Int64(Vec::with_capacity(rows)),
            _ => Sink::Float64(Vec::with_capacity(rows)),
        }
    }
}

/// Second-pass typed buffer for one column.
enum Sink {
    Bool(Vec<bool>),
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Utf8(Vec<u32>, StringDictionary),
}

impl Sink {
    fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(..) => DType::Utf8,
        }
    }

    fn push(&mut self, field: &str, column: &str) -> Result<(), IoError> {
        let dtype = self.dtype();
        let invalid = || IoError::InvalidField {
            column: column.to_owned(),
            value: field.to_owned(),
            dtype,
        };
        match self {
            Self::Bool(values) => values.push(parse_bool(field).ok_or_else(invalid)?),
            Self::Int64(values) => values.push(field.parse().map_err(|_| invalid())?),
            Self::Float64(values) => {
                let value = if field.is_empty() {
                    f64::NAN
                } else if let Some(flag) = parse_bool(field) {
                    if flag { 1.0 } else { 0.0 }
                } else {
                    field.parse().map_err(|_| invalid())?
                };
                values.push(value);
            }
            Self::Utf8(codes, dictionary) => {
                codes.push(dictionary.encode((!field.is_empty()).then_some(field))?);
            }
        }
        Ok(())
    }
}

fn field(record: &StringRecord, position: usize) -> &str {
    record.get(position).unwrap_or_default().trim()
}

/// Read delimited text into the parts an ingestion reader hands over.
pub fn read_csv_parts(input: &str, options: &ReadCsvOptions) -> Result<IngestParts, IoError> {
    let delimiter = options.validate()?;

    let mut header: Option<Vec<String>> = None;
    let mut scans: Vec<ColumnScan> = Vec::new();
    let mut rows = 0;
    let kept = scan(input, options, delimiter, |row| {
        match row {
            Row::Header(record) => {
                header = Some(record.iter().map(|f| f.trim().to_owned()).collect());
            }
            Row::Data(record) => {
                rows += 1;
                if scans.len() < record.len() {
                    // Earlier, shorter records lacked these fields.
                    let widened = ColumnScan {
                        kind: None,
                        missing: rows > 1,
                    };
                    scans.resize(record.len(), widened);
                }
                for (position, scan) in scans.iter_mut().enumerate() {
                    scan.observe(field(record, position));
                }
            }
        }
        Ok(())
    })?;

    let names = match (options.header, header) {
        (Some(_), Some(names)) => names,
        (Some(header), None) => {
            return Err(IoError::HeaderNotFound {
                header,
                records: kept,
            });
        }
        (None, _) => (0..scans.len()).map(synthetic_column_name).collect(),
    };
    if names.is_empty() {
        return Err(IoError::NoColumns);
    }

    let positions: Vec<usize> = match &options.usecols {
        None => (0..names.len()).collect(),
        Some(keys) => {
            let lookup = |name: &str| names.iter().position(|n| n == name);
            let mut resolved = keys
                .iter()
                .map(|key| resolve_column_key(key, names.len(), &lookup))
                .collect::<Result<Vec<_>, _>>()?;
            resolved.sort_unstable();
            resolved.dedup();
            resolved
        }
    };
    debug!(
        "scanned {rows} data rows across {} columns; keeping {}",
        names.len(),
        positions.len()
    );

    let mut sinks: Vec<Sink> = positions
        .iter()
        .map(|&p| scans.get(p).copied().unwrap_or_default().sink(rows))
        .collect();
    scan(input, options, delimiter, |row| {
        if let Row::Data(record) = row {
            for (sink, &p) in sinks.iter_mut().zip(&positions) {
                sink.push(field(record, p), &names[p])?;
            }
        }
        Ok(())
    })?;

    let mut parts = IngestParts {
        rows,
        ..IngestParts::default()
    };
    let mut bools = Vec::new();
    let mut ints = Vec::new();
    let mut floats = Vec::new();
    let mut codes = Vec::new();
    for (sink, &p) in sinks.into_iter().zip(&positions) {
        parts.names.push(names[p].clone());
        parts.dtypes.push(sink.dtype());
        let location = match sink {
            Sink::Bool(values) => {
                bools.push(values);
                bools.len() - 1
            }
            Sink::Int64(values) => {
                ints.push(values);
                ints.len() - 1
            }
            Sink::Float64(values) => {
                floats.push(values);
                floats.len() - 1
            }
            Sink::Utf8(values, dictionary) => {
                parts
                    .string_dictionaries
                    .insert(codes.len(), dictionary.into_values());
                codes.push(values);
                codes.len() - 1
            }
        };
        parts.locations.push(location);
    }

    if !bools.is_empty() {
        parts
            .arrays
            .push(IngestArray::Bool(DenseBlock::from_columns(rows, &bools)?));
    }
    if !ints.is_empty() {
        parts
            .arrays
            .push(IngestArray::Int64(DenseBlock::from_columns(rows, &ints)?));
    }
    if !floats.is_empty() {
        parts
            .arrays
            .push(IngestArray::Float64(DenseBlock::from_columns(rows, &floats)?));
    }
    if !codes.is_empty() {
        parts
            .arrays
            .push(IngestArray::Utf8(DenseBlock::from_columns(rows, &codes)?));
    }
    Ok(parts)
}

pub fn read_csv_str(input: &str, options: &ReadCsvOptions) -> Result<Table, IoError> {
    Ok(Table::from_parts(read_csv_parts(input, options)?)?)
}

pub fn read_csv(path: impl AsRef<Path>, options: &ReadCsvOptions) -> Result<Table, IoError> {
    let path = path.as_ref();
    let input = fs::read_to_string(path)?;
    debug!("read {} bytes from {}", input.len(), path.display());
    read_csv_str(&input, options)
}

/// Column names of a headered input without materializing any data.
pub fn read_csv_header(input: &str, options: &ReadCsvOptions) -> Result<Vec<String>, IoError> {
    let delimiter = options.validate()?;
    let mut names: Option<Vec<String>> = None;
    let records = scan(input, options, delimiter, |row| {
        if let Row::Header(record) = row
            && names.is_none()
        {
            names = Some(record.iter().map(|f| f.trim().to_owned()).collect());
        }
        Ok(())
    })?;
    let header = options.header.unwrap_or_default();
    names.ok_or(IoError::HeaderNotFound { header, records })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::io::Write;

    use bf_columnar::ColumnData;
    use bf_frame::ErrorKind;
    use bf_index::ColumnKey;
    use bf_types::{DType, NullKind, Scalar};

    use super::{ReadCsvOptions, SkipRows, read_csv, read_csv_parts, read_csv_str};

    fn read(input: &str) -> bf_frame::Table {
        read_csv_str(input, &ReadCsvOptions::default()).expect("read")
    }

    #[test]
    fn columns_are_classified_independently() {
        let table = read("a,b,c,d\n1,2.5,x,true\n2,,y,False\n");
        assert_eq!(
            table.dtype_list(),
            [DType::Int64, DType::Float64, DType::Utf8, DType::Bool]
        );
        assert_eq!(table.column("a").expect("a"), ColumnData::Int64(vec![1, 2]));
        assert!(table.get(1, "b").expect("b").is_missing());
        assert_eq!(table.column("d").expect("d"), ColumnData::Bool(vec![true, false]));
        table.directory().validate(table.blocks()).expect("consistent");
    }

    #[test]
    fn missing_fields_promote_int_and_bool_to_float() {
        let table = read("i,b,s\n1,true,p\n,,\n3,false,q\n");
        assert_eq!(table.dtype_list(), [DType::Float64, DType::Float64, DType::Utf8]);
        assert_eq!(table.get(0, "b").expect("b"), Scalar::Float64(1.0));
        assert!(table.get(1, "i").expect("i").is_missing());
        assert_eq!(table.get(1, "s").expect("s"), Scalar::Null(NullKind::Null));
    }

    #[test]
    fn mixed_text_and_numbers_become_strings() {
        let table = read("v\n1\nabc\n2.5\n");
        assert_eq!(table.dtype_list(), [DType::Utf8]);
        assert_eq!(table.get(2, "v").expect("v"), Scalar::from("2.5"));
    }

    #[test]
    fn quoted_fields_and_custom_separator() {
        let options = ReadCsvOptions {
            sep: ';',
            ..ReadCsvOptions::default()
        };
        let table = read_csv_str("name;note\n\"a;b\";\"x, y\"\n", &options).expect("read");
        assert_eq!(table.get(0, "name").expect("name"), Scalar::from("a;b"));
        assert_eq!(table.get(0, "note").expect("note"), Scalar::from("x, y"));
    }

    #[test]
    fn headerless_input_gets_synthetic_names() {
        let options = ReadCsvOptions {
            header: None,
            ..ReadCsvOptions::default()
        };
        let table = read_csv_str("1,x\n2,y\n", &options).expect("read");
        assert_eq!(table.columns(), ["a0", "a1"]);
        assert_eq!(table.nrows(), 2);
    }

    #[test]
    fn skipped_records_and_later_header() {
        let options = ReadCsvOptions {
            header: Some(1),
            skiprows: SkipRows::Leading(1),
            ..ReadCsvOptions::default()
        };
        let table = read_csv_str("junk\nnotes\nx,y\n1,2\n3,4\n", &options).expect("read");
        assert_eq!(table.columns(), ["x", "y"]);
        assert_eq!(table.column("y").expect("y"), ColumnData::Int64(vec![2, 4]));

        let options = ReadCsvOptions {
            skiprows: SkipRows::Rows(BTreeSet::from([2])),
            ..ReadCsvOptions::default()
        };
        let table = read_csv_str("x\n1\nbad\n3\n", &options).expect("read");
        assert_eq!(table.column("x").expect("x"), ColumnData::Int64(vec![1, 3]));
    }

    #[test]
    fn usecols_keeps_file_order() {
        let options = ReadCsvOptions {
            usecols: Some(vec![ColumnKey::from("c"), ColumnKey::Position(0), ColumnKey::from("a")]),
            ..ReadCsvOptions::default()
        };
        let table = read_csv_str("a,b,c\n1,x,2.5\n", &options).expect("read");
        assert_eq!(table.columns(), ["a", "c"]);
        assert_eq!(table.column_info("c").map(|i| (i.dtype, i.offset)), Some((DType::Float64, 0)));
    }

    #[test]
    fn option_errors() {
        let bad_sep = ReadCsvOptions {
            sep: 'é',
            ..ReadCsvOptions::default()
        };
        let err = read_csv_str("a\n1\n", &bad_sep).expect_err("separator");
        assert_eq!(err.kind(), ErrorKind::Value);

        let empty = ReadCsvOptions {
            usecols: Some(Vec::new()),
            ..ReadCsvOptions::default()
        };
        assert_eq!(read_csv_str("a\n1\n", &empty).expect_err("usecols").kind(), ErrorKind::Value);

        let unknown = ReadCsvOptions {
            usecols: Some(vec![ColumnKey::from("zz")]),
            ..ReadCsvOptions::default()
        };
        assert_eq!(read_csv_str("a\n1\n", &unknown).expect_err("label").kind(), ErrorKind::Key);

        let missing_header = ReadCsvOptions {
            header: Some(3),
            ..ReadCsvOptions::default()
        };
        assert_eq!(
            read_csv_str("a\n1\n", &missing_header).expect_err("header").kind(),
            ErrorKind::Value
        );
    }

    #[test]
    fn ragged_records_fill_missing() {
        let table = read("a,b\n1,2\n3\n");
        assert_eq!(table.dtype_list(), [DType::Int64, DType::Float64]);
        assert!(table.get(1, "b").expect("b").is_missing());
    }

    #[test]
    fn string_columns_carry_their_own_dictionary() {
        let parts = read_csv_parts("s,t\nx,p\ny,p\nx,\n", &ReadCsvOptions::default()).expect("parts");
        assert_eq!(parts.rows, 3);
        assert_eq!(parts.locations, [0, 1]);
        assert_eq!(parts.string_dictionaries[&0], ["x", "y"]);
        assert_eq!(parts.string_dictionaries[&1], ["p"]);
    }

    #[test]
    fn header_only_lookup() {
        let names = super::read_csv_header("a, b\n1,2\n", &ReadCsvOptions::default()).expect("names");
        assert_eq!(names, ["a", "b"]);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: ReadCsvOptions =
            serde_json::from_str(r#"{"sep":"|","usecols":[{"kind":"label","value":"x"}]}"#)
                .expect("json");
        assert_eq!(options.sep, '|');
        assert_eq!(options.header, Some(0));
        assert_eq!(options.skiprows, SkipRows::None);
        assert_eq!(options.usecols, Some(vec![ColumnKey::from("x")]));
    }

    #[test]
    fn reads_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "id,score\n1,0.5\n2,0.75\n").expect("write");
        let table = read_csv(file.path(), &ReadCsvOptions::default()).expect("read");
        assert_eq!(table.shape(), (2, 2));
        assert_eq!(table.column("score").expect("score"), ColumnData::Float64(vec![0.5, 0.75]));
    }
}
