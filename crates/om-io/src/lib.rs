#![forbid(unsafe_code)]

use csv::{ReaderBuilder, WriterBuilder};
use om_frame::{Column, DataFrame, FrameError};
use om_types::{DType, NullKind, Scalar, infer_dtype};
use thiserror::Error;

/// Cell texts read as missing, on top of the empty string.
pub const MISSING_MARKERS: &[&str] = &[
    "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "NULL", "null", "None", "<NA>", "#N/A",
    "#NA",
];

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error("csv row {row} has {found} fields but the header has {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Read CSV text into a frame, inferring one dtype per column. Column order
/// follows the header, duplicates included.
pub fn read_csv_str(input: &str) -> Result<DataFrame, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input.as_bytes());

    let headers = reader.headers().cloned().map_err(IoError::from)?;

    if headers.is_empty() {
        return Err(IoError::MissingHeaders);
    }

    let mut cells = vec![Vec::<String>::new(); headers.len()];
    for (row_idx, row) in reader.records().enumerate() {
        let record = row?;
        if record.len() > headers.len() {
            return Err(IoError::RowWidth {
                row: row_idx,
                expected: headers.len(),
                found: record.len(),
            });
        }
        // short rows are padded with missing cells
        for (idx, values) in cells.iter_mut().enumerate() {
            values.push(record.get(idx).unwrap_or_default().to_owned());
        }
    }

    let names = headers.iter().map(str::to_owned).collect::<Vec<_>>();
    let columns = cells
        .iter()
        .map(|raw| infer_column(raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DataFrame::new(names, columns)?)
}

pub fn read_csv_bytes(input: &[u8]) -> Result<DataFrame, IoError> {
    let text = String::from_utf8(input.to_vec())?;
    read_csv_str(&text)
}

pub fn write_csv_string(frame: &DataFrame) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(frame.names())?;

    for row_idx in 0..frame.len() {
        let row = frame
            .columns()
            .iter()
            .map(|column| column.value(row_idx).map_or_else(String::new, scalar_to_csv))
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Dtype a CSV column settles on once every cell is parsed.
///
/// Missing cells cannot live in an integer or boolean column: integers widen
/// to `float64` and booleans fall back to `object`. A column with rows but no
/// values is `float64`; a column without rows is `object`. Integers past
/// `i64::MAX` make the column `uint64` unless it also holds negatives, which
/// leaves it `object`.
#[must_use]
pub fn csv_column_dtype(values: &[Scalar]) -> DType {
    if values.is_empty() {
        return DType::Object;
    }

    let has_missing = values.iter().any(Scalar::is_missing);
    match infer_dtype(values) {
        DType::Null => DType::Float64,
        DType::Int64 | DType::UInt64 if has_missing => DType::Float64,
        DType::Bool if has_missing => DType::Object,
        DType::Float64 if !has_missing && is_mixed_width_integers(values) => {
            if values.iter().any(|v| matches!(v, Scalar::Int64(i) if *i < 0)) {
                DType::Object
            } else {
                DType::UInt64
            }
        }
        other => other,
    }
}

fn is_mixed_width_integers(values: &[Scalar]) -> bool {
    values.iter().any(|v| matches!(v, Scalar::UInt64(_)))
        && values
            .iter()
            .all(|v| matches!(v, Scalar::Int64(_) | Scalar::UInt64(_)))
}

/// Parse one trimmed cell. Integer text wider than `u64` and non-finite
/// float text (`inf`, `1e400`) stay text, so no value is rounded or lost on
/// the way to a JSON body.
pub fn parse_scalar(field: &str) -> Scalar {
    let trimmed = field.trim();
    if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
        return Scalar::Null(NullKind::Null);
    }

    if let Ok(value) = trimmed.parse::<i64>() {
        return Scalar::Int64(value);
    }
    if let Ok(value) = trimmed.parse::<u64>() {
        return Scalar::UInt64(value);
    }
    if is_integer_text(trimmed) {
        return Scalar::Utf8(trimmed.to_owned());
    }
    if let Ok(value) = trimmed.parse::<f64>()
        && value.is_finite()
    {
        return Scalar::Float64(value);
    }
    match trimmed {
        "true" | "True" | "TRUE" => return Scalar::Bool(true),
        "false" | "False" | "FALSE" => return Scalar::Bool(false),
        _ => {}
    }

    Scalar::Utf8(trimmed.to_owned())
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn infer_column(raw: &[String]) -> Result<Column, IoError> {
    let parsed = raw.iter().map(|field| parse_scalar(field)).collect::<Vec<_>>();
    let dtype = csv_column_dtype(&parsed);

    // mixed-kind columns carry the untrimmed cell text; object columns of one
    // kind (bools with gaps, signed and unsigned integers) keep parsed values
    let values = if infer_dtype(&parsed) == DType::Object {
        raw.iter()
            .zip(parsed)
            .map(|(text, value)| {
                if value.is_missing() {
                    Scalar::Null(NullKind::Null)
                } else {
                    Scalar::Utf8(text.clone())
                }
            })
            .collect()
    } else {
        parsed
    };

    Ok(Column::new(dtype, values)?)
}

fn scalar_to_csv(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null(_) => String::new(),
        Scalar::Bool(v) => v.to_string(),
        Scalar::Int64(v) => v.to_string(),
        Scalar::UInt64(v) => v.to_string(),
        Scalar::Float64(v) => {
            if v.is_nan() {
                String::new()
            } else {
                format!("{v:?}")
            }
        }
        Scalar::Utf8(v) => v.clone(),
    }
}
