#![forbid(unsafe_code)]

//! Loads canned operator inputs from a project's `testdata` tree.
//!
//! Fixtures for the operator whose source lives at
//! `<root>/<dir>/<package>/<operator>/<source>` are read from
//! `<root>/testdata/<package>/<operator>/`. Nothing is cached: every call
//! re-reads the file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use om_frame::DataFrame;
use om_io::IoError;
use om_message::{Body, Message, MessageError, TypeMapping};
use serde_json::{Value, json};
use thiserror::Error;

pub const TESTDATA_DIR: &str = "testdata";
/// Suffix of the schema sidecar that sits beside a CSV fixture.
pub const ATTRIBUTES_SUFFIX: &str = "_attributes.json";
pub const TABLE_EXTENSION: &str = "csv";

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("operator source path {path} is too shallow to locate a package and project root")]
    InvalidSourcePath { path: PathBuf },
    #[error("cannot read fixture {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fixture {path} is not valid json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("message fixture {path} has no `{key}` key")]
    MissingKey { path: PathBuf, key: &'static str },
    #[error("message fixture {path} must hold a json object")]
    NotAnObject { path: PathBuf },
    #[error("fixture {name:?} has unsupported format {extension:?}; table fixtures must be csv")]
    UnsupportedFormat { name: String, extension: String },
    #[error("cannot parse csv fixture {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: IoError,
    },
    #[error(transparent)]
    Message(#[from] MessageError),
}

impl FixtureError {
    /// True when the fixture file itself does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == ErrorKind::NotFound)
    }
}

#[derive(Debug, Clone)]
pub struct FixtureLoader {
    source_path: PathBuf,
    type_mapping: TypeMapping,
}

impl FixtureLoader {
    /// Remember the operator's source path; nothing is resolved yet.
    #[must_use]
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            type_mapping: TypeMapping::default(),
        }
    }

    /// Replace the dtype translation used when table schemas are inferred.
    #[must_use]
    pub fn with_type_mapping(mut self, type_mapping: TypeMapping) -> Self {
        self.type_mapping = type_mapping;
        self
    }

    #[must_use]
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    #[must_use]
    pub fn type_mapping(&self) -> &TypeMapping {
        &self.type_mapping
    }

    /// `<project_root>/testdata/<package>/<operator>`.
    ///
    /// The project root sits two levels above the package directory. Walking
    /// past the start of a relative path or past `/` stays there, so
    /// `pkg/op/src.rs` resolves to `testdata/pkg/op`. Only the operator and
    /// package directory names are required.
    pub fn testdata_dir(&self) -> Result<PathBuf, FixtureError> {
        let invalid = || FixtureError::InvalidSourcePath {
            path: self.source_path.clone(),
        };

        let operator_dir = self.source_path.parent().ok_or_else(invalid)?;
        let operator = operator_dir.file_name().ok_or_else(invalid)?;
        let package_dir = operator_dir.parent().ok_or_else(invalid)?;
        let package = package_dir.file_name().ok_or_else(invalid)?;
        let project_root = parent_or_self(parent_or_self(package_dir));

        Ok(project_root.join(TESTDATA_DIR).join(package).join(operator))
    }

    /// Absolute location of fixture `name`. Existence is not checked here.
    pub fn fixture_path(&self, name: &str) -> Result<PathBuf, FixtureError> {
        let path = self.testdata_dir()?.join(name);
        #[cfg(feature = "tracing")]
        tracing::debug!(fixture = name, path = %path.display(), "resolved fixture");
        Ok(path)
    }

    /// Raw bytes, as a file-typed input port would receive them.
    pub fn get_file(&self, name: &str) -> Result<Vec<u8>, FixtureError> {
        let path = self.fixture_path(name)?;
        read_bytes(&path)
    }

    /// A message stored as `{"attributes": ..., "body": ...}`.
    pub fn get_message(&self, name: &str) -> Result<Message, FixtureError> {
        let path = self.fixture_path(name)?;
        let Value::Object(mut doc) = read_json(&path)? else {
            return Err(FixtureError::NotAnObject { path });
        };

        let attributes = doc.remove("attributes").ok_or_else(|| FixtureError::MissingKey {
            path: path.clone(),
            key: "attributes",
        })?;
        let body = doc
            .remove("body")
            .ok_or(FixtureError::MissingKey { path, key: "body" })?;

        Ok(Message::new(Body::Value(body), attributes))
    }

    /// A tabular message built from a CSV fixture.
    ///
    /// The body holds the cells row by row. The attributes come verbatim from
    /// `<stem>_attributes.json` when that file exists, otherwise they are a
    /// table descriptor inferred from the column dtypes.
    pub fn get_msgtable(&self, name: &str) -> Result<Message, FixtureError> {
        let path = self.table_fixture_path(name)?;
        let frame = read_frame(&path)?;
        let stem = table_stem(&path);

        match read_sidecar(&path, &stem)? {
            Some(attributes) => Ok(Message::new(Body::Rows(frame.to_rows()), attributes)),
            None => Ok(Message::table(&frame, stem, &self.type_mapping)?),
        }
    }

    /// Rebuild the named-column table a tabular message describes.
    pub fn msgtable_to_frame(&self, msg: &Message) -> Result<DataFrame, FixtureError> {
        Ok(msg.to_frame()?)
    }

    /// A CSV fixture handed over as a whole table, without a descriptor.
    /// Attributes come from the sidecar when present, else
    /// `{"operator": "test"}`.
    pub fn get_df_message(&self, name: &str) -> Result<Message, FixtureError> {
        let path = self.table_fixture_path(name)?;
        let frame = read_frame(&path)?;
        let stem = table_stem(&path);

        let attributes = read_sidecar(&path, &stem)?.unwrap_or_else(|| json!({"operator": "test"}));
        Ok(Message::new(Body::Frame(frame), attributes))
    }

    fn table_fixture_path(&self, name: &str) -> Result<PathBuf, FixtureError> {
        let extension = Path::new(name)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !extension.eq_ignore_ascii_case(TABLE_EXTENSION) {
            return Err(FixtureError::UnsupportedFormat {
                name: name.to_owned(),
                extension,
            });
        }
        self.fixture_path(name)
    }
}

fn parent_or_self(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}

/// File name up to its first `.`; names both the table and its sidecar.
fn table_stem(path: &Path) -> String {
    path.file_name()
        .map(|file| file.to_string_lossy())
        .and_then(|file| file.split('.').next().map(str::to_owned))
        .unwrap_or_default()
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, FixtureError> {
    fs::read(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn read_json(path: &Path) -> Result<Value, FixtureError> {
    let bytes = read_bytes(path)?;
    serde_json::from_slice(&bytes).map_err(|source| FixtureError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_frame(path: &Path) -> Result<DataFrame, FixtureError> {
    let bytes = read_bytes(path)?;
    om_io::read_csv_bytes(&bytes).map_err(|source| FixtureError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Parsed sidecar, or `None` when there is no sidecar file.
fn read_sidecar(table_path: &Path, stem: &str) -> Result<Option<Value>, FixtureError> {
    let path = table_path.with_file_name(format!("{stem}{ATTRIBUTES_SUFFIX}"));
    match read_json(&path) {
        Ok(attributes) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(path = %path.display(), "using sidecar attributes");
            Ok(Some(attributes))
        }
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{FixtureError, FixtureLoader, table_stem};

    #[test]
    fn fixture_path_walks_up_to_project_root() {
        let loader = FixtureLoader::new("/proj/operators/sales/filter/filter.rs");
        assert_eq!(
            loader.fixture_path("in.csv").expect("path"),
            PathBuf::from("/proj/testdata/sales/filter/in.csv")
        );
    }

    #[test]
    fn relative_source_paths_resolve_relative_roots() {
        let loader = FixtureLoader::new("operators/sales/filter/filter.rs");
        assert_eq!(
            loader.testdata_dir().expect("dir"),
            PathBuf::from("testdata/sales/filter")
        );
    }

    #[test]
    fn roots_above_the_path_start_stay_at_the_start() {
        let relative = FixtureLoader::new("sales/filter/filter.rs");
        assert_eq!(
            relative.testdata_dir().expect("relative"),
            PathBuf::from("testdata/sales/filter")
        );
        let absolute = FixtureLoader::new("/sales/filter/filter.rs");
        assert_eq!(
            absolute.fixture_path("in.csv").expect("absolute"),
            PathBuf::from("/testdata/sales/filter/in.csv")
        );
    }

    #[test]
    fn shallow_source_path_is_rejected() {
        let loader = FixtureLoader::new("filter/filter.rs");
        let err = loader.fixture_path("in.csv").expect_err("too shallow");
        assert!(matches!(err, FixtureError::InvalidSourcePath { .. }));
    }

    #[test]
    fn unsupported_extension_fails_before_any_read() {
        let loader = FixtureLoader::new("/nonexistent/operators/p/o/o.rs");
        for name in ["data.tsv", "data", "data.json"] {
            let err = loader.get_msgtable(name).expect_err("unsupported");
            assert!(
                matches!(err, FixtureError::UnsupportedFormat { .. }),
                "{name}: {err}"
            );
        }
        let err = loader.get_msgtable("data.tsv").expect_err("tsv");
        assert_eq!(
            err.to_string(),
            "fixture \"data.tsv\" has unsupported format \"tsv\"; table fixtures must be csv"
        );
    }

    #[test]
    fn missing_fixture_surfaces_as_not_found() {
        let loader = FixtureLoader::new("/nonexistent/operators/p/o/o.rs");
        let err = loader.get_file("absent.bin").expect_err("absent");
        assert!(err.is_not_found());
        let err = loader.get_msgtable("ABSENT.CSV").expect_err("absent");
        assert!(err.is_not_found());
    }

    #[test]
    fn table_stem_stops_at_first_dot() {
        assert_eq!(table_stem(Path::new("/t/readings.v2.csv")), "readings");
        assert_eq!(table_stem(Path::new("/t/readings.csv")), "readings");
    }
}
