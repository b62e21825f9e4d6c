//! Shape descriptors for operation arguments and builder parameters.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::value::{StructValue, TypedValue};

/// Seconds from the Unix epoch back to `0001-01-01T00:00:00Z`.
const ZERO_TIMESTAMP_SECS: i64 = -62_135_596_800;

/// Primitive kinds an argument can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Int32,
    Int64,
    Float32,
    Float64,
    String,
}

impl ScalarKind {
    /// Canonical lower-case name used in manifests and error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::String => "string",
        }
    }

    /// Parses a manifest type name. `integer` and `number` are accepted as
    /// aliases for `int32` and `float64`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Some(Self::Bool),
            "int32" | "integer" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "float32" => Some(Self::Float32),
            "float64" | "number" => Some(Self::Float64),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    fn zero_value(&self) -> TypedValue {
        match self {
            Self::Bool => TypedValue::Bool(false),
            Self::Int32 => TypedValue::Int32(0),
            Self::Int64 => TypedValue::Int64(0),
            Self::Float32 => TypedValue::Float32(0.0),
            Self::Float64 => TypedValue::Float64(0.0),
            Self::String => TypedValue::String(String::new()),
        }
    }
}

/// The statically declared shape of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// A primitive value.
    Scalar(ScalarKind),
    /// An instant in time, accepted as RFC3339 text or epoch milliseconds.
    Timestamp,
    /// A record decoded field by field from a JSON object.
    Struct(Arc<StructShape>),
    /// A homogeneous list.
    List(Box<Shape>),
    /// Untyped JSON passed through as-is.
    Any,
}

impl Shape {
    pub fn string() -> Self {
        Self::Scalar(ScalarKind::String)
    }

    pub fn bool() -> Self {
        Self::Scalar(ScalarKind::Bool)
    }

    pub fn int32() -> Self {
        Self::Scalar(ScalarKind::Int32)
    }

    pub fn int64() -> Self {
        Self::Scalar(ScalarKind::Int64)
    }

    pub fn float64() -> Self {
        Self::Scalar(ScalarKind::Float64)
    }

    pub fn list(element: Shape) -> Self {
        Self::List(Box::new(element))
    }

    pub fn structure(shape: StructShape) -> Self {
        Self::Struct(Arc::new(shape))
    }

    /// Returns true for the string scalar shape.
    pub fn is_string(&self) -> bool {
        matches!(self, Self::Scalar(ScalarKind::String))
    }

    /// The value an argument of this shape takes when the caller sends nothing.
    pub fn zero_value(&self) -> TypedValue {
        match self {
            Self::Scalar(kind) => kind.zero_value(),
            Self::Timestamp => TypedValue::Timestamp(zero_timestamp()),
            Self::Struct(shape) => TypedValue::Struct(shape.zero_value()),
            Self::List(_) => TypedValue::List(Vec::new()),
            Self::Any => TypedValue::Json(serde_json::Value::Null),
        }
    }
}

/// The first instant of year one, which unset timestamps take.
fn zero_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_TIMESTAMP_SECS, 0).unwrap_or_default()
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => f.write_str(kind.as_str()),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Struct(shape) => write!(f, "struct {}", shape.name),
            Self::List(element) => write!(f, "[]{element}"),
            Self::Any => f.write_str("any"),
        }
    }
}

/// A named record with ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructShape {
    pub name: String,
    pub fields: Vec<StructField>,
}

impl StructShape {
    pub fn new(name: impl Into<String>, fields: Vec<StructField>) -> Self {
        Self { name: name.into(), fields }
    }

    /// Finds a field by exact name, then by ASCII case-insensitive name.
    pub fn field(&self, key: &str) -> Option<&StructField> {
        self.fields
            .iter()
            .find(|field| field.name == key)
            .or_else(|| self.fields.iter().find(|field| field.name.eq_ignore_ascii_case(key)))
    }

    /// A record with every field at its zero value.
    pub fn zero_value(&self) -> StructValue {
        let fields: IndexMap<String, TypedValue> =
            self.fields.iter().map(|field| (field.name.clone(), field.zero_value())).collect();
        StructValue {
            name: self.name.clone(),
            fields,
        }
    }
}

/// A field of a [`StructShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub shape: Shape,
    /// Optional fields stay absent (and are omitted on encode) when not sent.
    pub optional: bool,
}

impl StructField {
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            optional: true,
        }
    }

    pub fn zero_value(&self) -> TypedValue {
        if self.optional { TypedValue::Absent } else { self.shape.zero_value() }
    }
}

/// Positional argument of an operation. The position is the index in the
/// operation's argument list; the implicit call context is not listed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgDescriptor {
    pub name: String,
    pub shape: Shape,
    pub optional: bool,
}

impl ArgDescriptor {
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            optional: true,
        }
    }

    /// Value bound when the caller sends `null` for this position.
    pub fn zero_value(&self) -> TypedValue {
        if self.optional { TypedValue::Absent } else { self.shape.zero_value() }
    }
}
