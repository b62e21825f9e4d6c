//! Statically shaped values produced by coercion and consumed by operations.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// A value that conforms to a [`Shape`](crate::Shape).
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Optional argument or field that the caller did not send.
    Absent,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Struct(StructValue),
    List(Vec<TypedValue>),
    /// Untyped payload for [`Shape::Any`](crate::Shape::Any) and raw results.
    Json(Value),
}

/// Decoded record; fields keep the declaration order of the struct shape.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub name: String,
    pub fields: IndexMap<String, TypedValue>,
}

impl StructValue {
    pub fn get(&self, field: &str) -> Option<&TypedValue> {
        self.fields.get(field)
    }
}

impl TypedValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int32(number) => Some(i64::from(*number)),
            Self::Int64(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float32(number) => Some(f64::from(*number)),
            Self::Float64(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(instant) => Some(*instant),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(record) => Some(record),
            _ => None,
        }
    }

    /// Encodes the value back to JSON.
    ///
    /// Timestamps are written as RFC3339 in UTC with a `Z` suffix, absent
    /// struct fields are omitted, and non-finite floats become `null`.
    ///
    /// # Example
    /// ```rust
    /// use chrono::{TimeZone, Utc};
    /// use opcall_registry::TypedValue;
    ///
    /// let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    /// assert_eq!(TypedValue::Timestamp(instant).to_json(), serde_json::json!("2024-05-01T12:30:00Z"));
    /// ```
    pub fn to_json(&self) -> Value {
        match self {
            Self::Absent => Value::Null,
            Self::Bool(flag) => Value::Bool(*flag),
            Self::Int32(number) => Value::from(*number),
            Self::Int64(number) => Value::from(*number),
            Self::Float32(number) => float_to_json(f64::from(*number)),
            Self::Float64(number) => float_to_json(*number),
            Self::String(text) => Value::String(text.clone()),
            Self::Timestamp(instant) => Value::String(instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Struct(record) => {
                let object: Map<String, Value> = record
                    .fields
                    .iter()
                    .filter(|(_, value)| !value.is_absent())
                    .map(|(name, value)| (name.clone(), value.to_json()))
                    .collect();
                Value::Object(object)
            }
            Self::List(items) => Value::Array(items.iter().map(TypedValue::to_json).collect()),
            Self::Json(value) => value.clone(),
        }
    }
}

fn float_to_json(number: f64) -> Value {
    Number::from_f64(number).map(Value::Number).unwrap_or(Value::Null)
}

impl From<Value> for TypedValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}
