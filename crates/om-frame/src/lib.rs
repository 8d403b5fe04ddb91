#![forbid(unsafe_code)]

use std::fmt;

use om_types::{DType, Scalar, TypeError, cast_scalar, infer_dtype};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame has {names} column names but {columns} columns")]
    NameCountMismatch { names: usize, columns: usize },
    #[error("column {name:?} has {column_len} values but the frame has {frame_len} rows")]
    LengthMismatch {
        name: String,
        frame_len: usize,
        column_len: usize,
    },
    #[error("row {row} has {found} values but the frame has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Type(#[from] TypeError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
}

impl Column {
    /// Construct a column, coercing values to the target dtype. `object`
    /// columns keep every value as-is.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, FrameError> {
        let values = values
            .iter()
            .map(|value| cast_scalar(value, dtype))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { dtype, values })
    }

    pub fn from_values(values: Vec<Scalar>) -> Result<Self, FrameError> {
        let dtype = infer_dtype(&values);
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(left, right)| left.semantic_eq(right))
    }
}

/// A table of named columns in insertion order. Names are not deduplicated;
/// lookups by name return the first match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Column>,
    len: usize,
}

impl DataFrame {
    pub fn new(names: Vec<String>, columns: Vec<Column>) -> Result<Self, FrameError> {
        if names.len() != columns.len() {
            return Err(FrameError::NameCountMismatch {
                names: names.len(),
                columns: columns.len(),
            });
        }

        let len = columns.first().map_or(0, Column::len);
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != len {
                return Err(FrameError::LengthMismatch {
                    name: name.clone(),
                    frame_len: len,
                    column_len: column.len(),
                });
            }
        }

        Ok(Self {
            names,
            columns,
            len,
        })
    }

    /// Build a frame from row-major JSON cells, inferring each column's dtype.
    pub fn from_rows(names: Vec<String>, rows: &[Vec<Value>]) -> Result<Self, FrameError> {
        let mut cells = vec![Vec::with_capacity(rows.len()); names.len()];
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != names.len() {
                return Err(FrameError::RowWidth {
                    row: row_idx,
                    expected: names.len(),
                    found: row.len(),
                });
            }
            for (slot, cell) in cells.iter_mut().zip(row) {
                slot.push(Scalar::from_json(cell)?);
            }
        }

        let columns = cells
            .into_iter()
            .map(Column::from_values)
            .collect::<Result<Vec<_>, _>>()?;
        let mut frame = Self::new(names, columns)?;
        // zero-width frames still know how many rows they were given
        if frame.columns.is_empty() {
            frame.len = rows.len();
        }
        Ok(frame)
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .and_then(|idx| self.columns.get(idx))
    }

    #[must_use]
    pub fn column_at(&self, idx: usize) -> Option<(&str, &Column)> {
        Some((self.names.get(idx)?.as_str(), self.columns.get(idx)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn row(&self, idx: usize) -> Option<Vec<&Scalar>> {
        if idx >= self.len {
            return None;
        }
        self.columns.iter().map(|column| column.value(idx)).collect()
    }

    /// Row-major JSON cells, the shape tabular message bodies travel in.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        (0..self.len)
            .map(|row_idx| {
                self.columns
                    .iter()
                    .map(|column| column.value(row_idx).map_or(Value::Null, Scalar::to_json))
                    .collect()
            })
            .collect()
    }

    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        self.names == other.names
            && self.len == other.len
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(left, right)| left.semantic_eq(right))
    }
}

impl fmt::Display for DataFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names.join(","))?;
        for row_idx in 0..self.len {
            f.write_str("\n")?;
            for (col_idx, column) in self.columns.iter().enumerate() {
                if col_idx > 0 {
                    f.write_str(",")?;
                }
                if let Some(value) = column.value(row_idx) {
                    write!(f, "{value}")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use om_types::{DType, NullKind, Scalar};
    use serde_json::json;

    use super::{Column, DataFrame, FrameError};

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn column_widens_ints_when_floats_present() {
        let column = Column::from_values(vec![
            Scalar::Int64(1),
            Scalar::Float64(2.5),
            Scalar::Null(NullKind::Null),
        ])
        .expect("column");
        assert_eq!(column.dtype(), DType::Float64);
        assert_eq!(column.values()[0], Scalar::Float64(1.0));
        assert_eq!(column.values()[2], Scalar::Null(NullKind::NaN));
    }

    #[test]
    fn object_column_keeps_mixed_values() {
        let column = Column::from_values(vec![Scalar::Bool(true), Scalar::Int64(3)])
            .expect("column");
        assert_eq!(column.dtype(), DType::Object);
        assert_eq!(column.values(), &[Scalar::Bool(true), Scalar::Int64(3)]);
    }

    #[test]
    fn from_rows_preserves_column_order_and_values() {
        let rows = vec![vec![json!(2), json!("b")], vec![json!(1), json!("a")]];
        let frame = DataFrame::from_rows(names(&["z", "a"]), &rows).expect("frame");

        assert_eq!(frame.names(), &["z", "a"]);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.column("z").expect("z").dtype(), DType::Int64);
        assert_eq!(frame.to_rows(), rows);
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let rows = vec![vec![json!(1), json!(2)], vec![json!(3)]];
        let err = DataFrame::from_rows(names(&["a", "b"]), &rows).expect_err("ragged");
        assert_eq!(
            err,
            FrameError::RowWidth {
                row: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn duplicate_names_resolve_to_first_column() {
        let frame = DataFrame::from_rows(names(&["a", "a"]), &[vec![json!(1), json!("x")]])
            .expect("frame");
        assert_eq!(frame.width(), 2);
        assert_eq!(
            frame.column("a").expect("a").values(),
            &[Scalar::Int64(1)]
        );
    }

    #[test]
    fn new_rejects_columns_of_different_lengths() {
        let left = Column::from_values(vec![Scalar::Int64(1)]).expect("left");
        let right = Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("right");
        let err = DataFrame::new(names(&["l", "r"]), vec![left, right]).expect_err("mismatch");
        assert!(matches!(err, FrameError::LengthMismatch { column_len: 2, .. }));
    }

    #[test]
    fn display_renders_header_then_rows() {
        let frame = DataFrame::from_rows(
            names(&["id", "ok"]),
            &[vec![json!(1), json!(true)], vec![json!(2), json!(null)]],
        )
        .expect("frame");
        assert_eq!(frame.to_string(), "id,ok\n1,true\n2,None");
    }
}
