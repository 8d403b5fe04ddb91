#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Native column type, named after the dtype classes pipeline hosts report
/// (`int64`, `float64`, `object`, `bool`). `uint64` holds integers past
/// `i64::MAX` and has no default target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    #[serde(rename = "uint64")]
    UInt64,
    Float64,
    Object,
}

impl DType {
    #[must_use]
    pub fn class_name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::UInt64 => "uint64",
            Self::Float64 => "float64",
            Self::Object => "object",
        }
    }

    #[must_use]
    pub fn from_class_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(Self::Null),
            "bool" => Some(Self::Bool),
            "int64" => Some(Self::Int64),
            "uint64" => Some(Self::UInt64),
            "float64" => Some(Self::Float64),
            "object" => Some(Self::Object),
            _ => None,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    #[serde(rename = "uint64")]
    UInt64(u64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::UInt64(_) => DType::UInt64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Object,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::Null | DType::Bool | DType::Int64 | DType::UInt64 | DType::Object => {
                Self::Null(NullKind::Null)
            }
        }
    }

    /// Equality that treats every missing marker as equal to every other.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (left, right) if left.is_missing() && right.is_missing() => true,
            _ => self == other,
        }
    }

    /// Wire form used in message bodies. Missing values (including NaN, which
    /// JSON cannot carry) become `null`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null(_) => Value::Null,
            Self::Bool(v) => Value::Bool(*v),
            Self::Int64(v) => Value::from(*v),
            Self::UInt64(v) => Value::from(*v),
            Self::Float64(v) => Value::from(*v),
            Self::Utf8(v) => Value::String(v.clone()),
        }
    }

    /// Inverse of [`Scalar::to_json`]. Integral JSON numbers stay `Int64`
    /// (or `UInt64` past `i64::MAX`), every other number is `Float64`.
    pub fn from_json(value: &Value) -> Result<Self, TypeError> {
        match value {
            Value::Null => Ok(Self::Null(NullKind::Null)),
            Value::Bool(v) => Ok(Self::Bool(*v)),
            Value::Number(number) => {
                if let Some(v) = number.as_i64() {
                    Ok(Self::Int64(v))
                } else if let Some(v) = number.as_u64() {
                    Ok(Self::UInt64(v))
                } else if let Some(v) = number.as_f64() {
                    Ok(Self::Float64(v))
                } else {
                    Err(TypeError::NumberOutOfRange {
                        value: number.to_string(),
                    })
                }
            }
            Value::String(v) => Ok(Self::Utf8(v.clone())),
            Value::Array(_) => Err(TypeError::NonScalarValue { kind: "array" }),
            Value::Object(_) => Err(TypeError::NonScalarValue { kind: "object" }),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(NullKind::Null) => f.write_str("None"),
            Self::Null(NullKind::NaN) => f.write_str("nan"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v:?}"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("cannot cast scalar of dtype {from} to {to}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot cast float {value} to int64 without loss")]
    LossyFloatToInt { value: f64 },
    #[error("json {kind} is not a scalar cell value")]
    NonScalarValue { kind: &'static str },
    #[error("json number {value} does not fit int64 or float64")]
    NumberOutOfRange { value: String },
}

/// Common dtype of two values sharing a column. Missing values adopt the
/// other side; numeric widening goes to float64, including int64 with
/// uint64; anything else falls back to `object`, which holds values of any
/// kind.
#[must_use]
pub fn common_dtype(left: DType, right: DType) -> DType {
    use DType::{Float64, Int64, Null, Object, UInt64};

    match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Int64 | UInt64, Float64 | Int64 | UInt64) | (Float64, Int64 | UInt64) => Float64,
        _ => Object,
    }
}

#[must_use]
pub fn infer_dtype(values: &[Scalar]) -> DType {
    values
        .iter()
        .fold(DType::Null, |current, value| common_dtype(current, value.dtype()))
}

pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if from == target || matches!(value, Scalar::Null(_)) {
        return Ok(match value {
            Scalar::Null(_) => Scalar::missing_for_dtype(target),
            _ => value.clone(),
        });
    }

    match target {
        DType::Null => Ok(Scalar::Null(NullKind::Null)),
        DType::Object => Ok(value.clone()),
        DType::Int64 => match value {
            Scalar::Bool(v) => Ok(Scalar::Int64(i64::from(*v))),
            Scalar::Float64(v) => {
                if !v.is_finite() || *v != v.trunc() {
                    return Err(TypeError::LossyFloatToInt { value: *v });
                }
                if *v < i64::MIN as f64 || *v > i64::MAX as f64 {
                    return Err(TypeError::LossyFloatToInt { value: *v });
                }
                Ok(Scalar::Int64(*v as i64))
            }
            Scalar::UInt64(v) => i64::try_from(*v)
                .map(Scalar::Int64)
                .map_err(|_| TypeError::InvalidCast { from, to: target }),
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::UInt64 => match value {
            Scalar::Int64(v) => u64::try_from(*v)
                .map(Scalar::UInt64)
                .map_err(|_| TypeError::InvalidCast { from, to: target }),
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Float64 => match value {
            Scalar::Bool(v) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),
            Scalar::Int64(v) => Ok(Scalar::Float64(*v as f64)),
            Scalar::UInt64(v) => Ok(Scalar::Float64(*v as f64)),
            _ => Err(TypeError::InvalidCast { from, to: target }),
        },
        DType::Bool => Err(TypeError::InvalidCast { from, to: target }),
    }
}
