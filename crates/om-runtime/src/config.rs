use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Descriptor file expected next to the operator's source.
pub const DESCRIPTOR_FILE: &str = "operator.json";
/// Discriminator key stripped from the `config` object.
pub const TYPE_KEY: &str = "$type";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read operator descriptor {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("operator descriptor {path} is not valid json: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("operator descriptor has no `config` object")]
    MissingConfig,
    #[error("operator descriptor `config` must be an object")]
    ConfigNotObject,
    #[error("operator descriptor `config` has no `$type` key")]
    MissingTypeDiscriminator,
    #[error("config key {key:?} does not hold the requested type: {source}")]
    Value {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("config key {key:?} is not set")]
    MissingKey { key: String },
}

/// Operator configuration: the descriptor's `config` object minus `$type`,
/// in file order. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorConfig {
    type_name: Option<String>,
    values: Map<String, Value>,
}

impl OperatorConfig {
    /// Load `operator.json` from the directory containing `source_path`.
    pub fn load(source_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = descriptor_path(source_path.as_ref());
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let descriptor: Value =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Json { path, source })?;
        Self::from_descriptor(descriptor)
    }

    /// Extract the configuration from an already parsed descriptor.
    pub fn from_descriptor(descriptor: Value) -> Result<Self, ConfigError> {
        let Value::Object(mut root) = descriptor else {
            return Err(ConfigError::MissingConfig);
        };
        let config = root.remove("config").ok_or(ConfigError::MissingConfig)?;
        let Value::Object(mut values) = config else {
            return Err(ConfigError::ConfigNotObject);
        };

        let type_value = values
            .shift_remove(TYPE_KEY)
            .ok_or(ConfigError::MissingTypeDiscriminator)?;
        let type_name = match type_value {
            Value::String(name) => Some(name),
            _ => None,
        };

        Ok(Self { type_name, values })
    }

    /// Configuration built in code, for operators tested without a
    /// descriptor on disk.
    #[must_use]
    pub fn from_values(values: Map<String, Value>) -> Self {
        Self {
            type_name: None,
            values,
        }
    }

    /// The stripped `$type` discriminator, when it was a string.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Typed read of one key.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = self.values.get(key).ok_or_else(|| ConfigError::MissingKey {
            key: key.to_owned(),
        })?;
        serde_json::from_value(value.clone()).map_err(|source| ConfigError::Value {
            key: key.to_owned(),
            source,
        })
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }
}

#[must_use]
pub fn descriptor_path(source_path: &Path) -> PathBuf {
    source_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(DESCRIPTOR_FILE)
}
