#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use om_frame::{DataFrame, FrameError};
use om_types::DType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Attribute key that carries the schema of a tabular message.
pub const TABLE_KEY: &str = "table";
pub const TABLE_NAME_KEY: &str = "table_name";
pub const TABLE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("table descriptor is missing `{key}`")]
    Schema { key: String },
    #[error("table descriptor field `{key}` must be {expected}")]
    SchemaShape { key: String, expected: &'static str },
    #[error("column {column:?} has dtype {dtype}, which has no {target_system} type")]
    UnsupportedType {
        column: String,
        dtype: DType,
        target_system: String,
    },
    #[error("message body of kind {kind} is not tabular")]
    NotTabular { kind: &'static str },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Message payload, tagged by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Body {
    #[default]
    Empty,
    Bytes(Vec<u8>),
    /// A scalar or structured JSON payload.
    Value(Value),
    /// Row-major cells of a table, as the host puts them on the wire.
    Rows(Vec<Vec<Value>>),
    /// A named-column table handed over as-is.
    Frame(DataFrame),
}

impl Body {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Bytes(_) => "bytes",
            Self::Value(_) => "value",
            Self::Rows(_) => "rows",
            Self::Frame(_) => "frame",
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Row-major cells, for `Rows` bodies and JSON arrays of arrays.
    pub fn rows(&self) -> Result<Cow<'_, [Vec<Value>]>, MessageError> {
        match self {
            Self::Rows(rows) => Ok(Cow::Borrowed(rows.as_slice())),
            Self::Value(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::Array(cells) => Ok(cells.clone()),
                    _ => Err(MessageError::NotTabular { kind: "value" }),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Cow::Owned),
            other => Err(MessageError::NotTabular { kind: other.kind() }),
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<DataFrame> for Body {
    fn from(value: DataFrame) -> Self {
        Self::Frame(value)
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("None"),
            Self::Bytes(bytes) => write!(f, "b\"{}\"", bytes.escape_ascii()),
            Self::Value(value) => write!(f, "{value}"),
            Self::Rows(rows) => {
                f.write_str("[")?;
                for (idx, row) in rows.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Value::Array(row.clone()))?;
                }
                f.write_str("]")
            }
            Self::Frame(frame) => write!(f, "{frame}"),
        }
    }
}

/// The unit exchanged on ports: a payload plus free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    body: Body,
    attributes: Value,
}

impl Message {
    #[must_use]
    pub fn new(body: impl Into<Body>, attributes: Value) -> Self {
        Self {
            body: body.into(),
            attributes,
        }
    }

    /// A message with the given body and empty attributes.
    #[must_use]
    pub fn from_body(body: impl Into<Body>) -> Self {
        Self::new(body, Value::Object(Map::new()))
    }

    #[must_use]
    pub fn with_attributes(self, attributes: Value) -> Self {
        Self { attributes, ..self }
    }

    /// Tabular message: body cells from `frame`, attributes holding a table
    /// descriptor inferred through `mapping`.
    pub fn table(
        frame: &DataFrame,
        table_name: impl Into<String>,
        mapping: &TypeMapping,
    ) -> Result<Self, MessageError> {
        let descriptor = TableDescriptor::infer(table_name, frame, mapping)?;
        Ok(Self::new(
            Body::Rows(frame.to_rows()),
            serde_json::to_value(descriptor)?,
        ))
    }

    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    #[must_use]
    pub fn attributes(&self) -> &Value {
        &self.attributes
    }

    #[must_use]
    pub fn into_parts(self) -> (Body, Value) {
        (self.body, self.attributes)
    }

    pub fn table_descriptor(&self) -> Result<TableDescriptor, MessageError> {
        TableDescriptor::from_attributes(&self.attributes)
    }

    /// Zip body rows against the descriptor's column names.
    pub fn to_frame(&self) -> Result<DataFrame, MessageError> {
        let names = TableDescriptor::column_names(&self.attributes)?;
        let rows = self.body.rows()?;
        Ok(DataFrame::from_rows(names, &rows)?)
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::from_body(Body::Empty)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attributes: {}\nbody: {}", self.attributes, self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub class: String,
    pub name: String,
    #[serde(rename = "type")]
    pub target_type: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSpec>,
    pub version: u32,
}

/// Schema block a tabular message carries in its attributes:
/// `{"table": {"columns": [...], "version": 1}, "table_name": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table: TableSchema,
    pub table_name: String,
}

impl TableDescriptor {
    pub fn infer(
        table_name: impl Into<String>,
        frame: &DataFrame,
        mapping: &TypeMapping,
    ) -> Result<Self, MessageError> {
        let columns = frame
            .iter()
            .map(|(name, column)| mapping.column_spec(name, column.dtype()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            table: TableSchema {
                columns,
                version: TABLE_VERSION,
            },
            table_name: table_name.into(),
        })
    }

    /// Parse a descriptor out of message attributes. Only column names are
    /// required; `class`, `type`, `version` and `table_name` default when
    /// absent so hand-written descriptors stay usable.
    pub fn from_attributes(attributes: &Value) -> Result<Self, MessageError> {
        let table = table_block(attributes)?;
        let entries = column_entries(table)?;

        let mut columns = Vec::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            let name = column_name(entry, idx)?;
            let class = entry
                .get("class")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned();
            let target_type = entry
                .get("type")
                .and_then(Value::as_object)
                .map(|types| {
                    types
                        .iter()
                        .filter_map(|(system, ty)| Some((system.clone(), ty.as_str()?.to_owned())))
                        .collect()
                })
                .unwrap_or_default();
            columns.push(ColumnSpec {
                class,
                name,
                target_type,
            });
        }

        let version = table
            .get("version")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(TABLE_VERSION);
        let table_name = attributes
            .get(TABLE_NAME_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        Ok(Self {
            table: TableSchema { columns, version },
            table_name,
        })
    }

    /// Column names in descriptor order, duplicates included.
    pub fn column_names(attributes: &Value) -> Result<Vec<String>, MessageError> {
        let entries = column_entries(table_block(attributes)?)?;
        entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| column_name(entry, idx))
            .collect()
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.table
            .columns
            .iter()
            .map(|column| column.name.as_str())
            .collect()
    }
}

fn table_block(attributes: &Value) -> Result<&Value, MessageError> {
    attributes.get(TABLE_KEY).ok_or_else(|| MessageError::Schema {
        key: TABLE_KEY.to_owned(),
    })
}

fn column_entries(table: &Value) -> Result<&Vec<Value>, MessageError> {
    let columns = table.get("columns").ok_or_else(|| MessageError::Schema {
        key: "table.columns".to_owned(),
    })?;
    columns.as_array().ok_or_else(|| MessageError::SchemaShape {
        key: "table.columns".to_owned(),
        expected: "an array",
    })
}

fn column_name(entry: &Value, idx: usize) -> Result<String, MessageError> {
    let key = format!("table.columns[{idx}].name");
    match entry.get("name") {
        Some(Value::String(name)) => Ok(name.clone()),
        Some(_) => Err(MessageError::SchemaShape {
            key,
            expected: "a string",
        }),
        None => Err(MessageError::Schema { key }),
    }
}

/// Translation from native dtypes to one target system's type names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMapping {
    target_system: String,
    types: BTreeMap<DType, String>,
}

impl TypeMapping {
    #[must_use]
    pub fn new(target_system: impl Into<String>) -> Self {
        Self {
            target_system: target_system.into(),
            types: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, dtype: DType, target_type: impl Into<String>) -> Self {
        self.types.insert(dtype, target_type.into());
        self
    }

    /// The default table: `int64 -> BIGINT`, `float64 -> DOUBLE`,
    /// `object -> NVARCHAR`, `bool -> BOOLEAN`.
    #[must_use]
    pub fn hana() -> Self {
        Self::new("hana")
            .with(DType::Int64, "BIGINT")
            .with(DType::Float64, "DOUBLE")
            .with(DType::Object, "NVARCHAR")
            .with(DType::Bool, "BOOLEAN")
    }

    #[must_use]
    pub fn target_system(&self) -> &str {
        &self.target_system
    }

    #[must_use]
    pub fn target_type(&self, dtype: DType) -> Option<&str> {
        self.types.get(&dtype).map(String::as_str)
    }

    pub fn column_spec(&self, name: &str, dtype: DType) -> Result<ColumnSpec, MessageError> {
        let target = self
            .target_type(dtype)
            .ok_or_else(|| MessageError::UnsupportedType {
                column: name.to_owned(),
                dtype,
                target_system: self.target_system.clone(),
            })?;

        Ok(ColumnSpec {
            class: dtype.class_name().to_owned(),
            name: name.to_owned(),
            target_type: BTreeMap::from([(self.target_system.clone(), target.to_owned())]),
        })
    }
}

impl Default for TypeMapping {
    fn default() -> Self {
        Self::hana()
    }
}

#[cfg(test)]
mod tests {
    use om_frame::{Column, DataFrame};
    use om_types::{DType, Scalar};
    use serde_json::json;

    use super::{Body, Message, MessageError, TableDescriptor, TypeMapping};

    fn sample_frame() -> DataFrame {
        DataFrame::new(
            vec!["id".to_owned(), "ok".to_owned()],
            vec![
                Column::from_values(vec![Scalar::Int64(1), Scalar::Int64(2)]).expect("id"),
                Column::from_values(vec![Scalar::Bool(true), Scalar::Bool(false)]).expect("ok"),
            ],
        )
        .expect("frame")
    }

    #[test]
    fn table_message_carries_descriptor_in_wire_shape() {
        let msg = Message::table(&sample_frame(), "sample", &TypeMapping::hana()).expect("msg");

        assert_eq!(
            msg.attributes(),
            &json!({
                "table": {
                    "columns": [
                        {"class": "int64", "name": "id", "type": {"hana": "BIGINT"}},
                        {"class": "bool", "name": "ok", "type": {"hana": "BOOLEAN"}}
                    ],
                    "version": 1
                },
                "table_name": "sample"
            })
        );
        assert_eq!(
            msg.body(),
            &Body::Rows(vec![vec![json!(1), json!(true)], vec![json!(2), json!(false)]])
        );
    }

    #[test]
    fn unmapped_dtype_is_rejected_with_column_name() {
        let mapping = TypeMapping::new("hana").with(DType::Int64, "BIGINT");
        let err = Message::table(&sample_frame(), "sample", &mapping).expect_err("no bool");
        assert!(matches!(
            err,
            MessageError::UnsupportedType { ref column, dtype: DType::Bool, .. } if column == "ok"
        ));
        assert_eq!(
            err.to_string(),
            "column \"ok\" has dtype bool, which has no hana type"
        );
    }

    #[test]
    fn to_frame_round_trips_table_messages() {
        let frame = sample_frame();
        let msg = Message::table(&frame, "sample", &TypeMapping::hana()).expect("msg");
        let back = msg.to_frame().expect("frame");
        assert_eq!(back, frame);
    }

    #[test]
    fn to_frame_accepts_json_array_bodies() {
        let msg = Message::new(
            json!([[1, "a"], [2, "b"]]),
            json!({"table": {"columns": [{"name": "n"}, {"name": "s"}]}}),
        );
        let frame = msg.to_frame().expect("frame");
        assert_eq!(frame.names(), &["n", "s"]);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn missing_descriptor_keys_are_named() {
        let no_table = Message::new(Body::Rows(Vec::new()), json!({"operator": "test"}));
        let err = no_table.to_frame().expect_err("no table");
        assert_eq!(err.to_string(), "table descriptor is missing `table`");

        let no_columns = Message::new(Body::Rows(Vec::new()), json!({"table": {"version": 1}}));
        let err = no_columns.to_frame().expect_err("no columns");
        assert_eq!(err.to_string(), "table descriptor is missing `table.columns`");

        let no_name = Message::new(
            Body::Rows(Vec::new()),
            json!({"table": {"columns": [{"name": "a"}, {"class": "int64"}]}}),
        );
        let err = no_name.to_frame().expect_err("no name");
        assert_eq!(
            err.to_string(),
            "table descriptor is missing `table.columns[1].name`"
        );
    }

    #[test]
    fn non_tabular_body_is_reported_by_kind() {
        let msg = Message::new(
            Body::Bytes(b"raw".to_vec()),
            json!({"table": {"columns": []}}),
        );
        let err = msg.to_frame().expect_err("bytes");
        assert!(matches!(err, MessageError::NotTabular { kind: "bytes" }));
    }

    #[test]
    fn descriptor_parse_fills_defaults() {
        let descriptor = TableDescriptor::from_attributes(&json!({
            "table": {"columns": [{"name": "a", "type": {"hana": "NVARCHAR(10)"}}]}
        }))
        .expect("descriptor");
        assert_eq!(descriptor.table.version, 1);
        assert_eq!(descriptor.names(), vec!["a"]);
        assert_eq!(descriptor.table.columns[0].target_type["hana"], "NVARCHAR(10)");
        assert!(descriptor.table_name.is_empty());
    }

    #[test]
    fn display_matches_send_rendering() {
        let msg = Message::new(Body::Bytes(b"a\nb".to_vec()), json!({"k": 1}));
        assert_eq!(msg.to_string(), "attributes: {\"k\":1}\nbody: b\"a\\nb\"");
        assert_eq!(Message::default().body().to_string(), "None");
    }
}
