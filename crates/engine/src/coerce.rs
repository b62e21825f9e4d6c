//! # Value Coercion
//!
//! Converts untyped JSON values into [`TypedValue`]s that match a declared
//! [`Shape`]. Coercion is a pure function over the JSON variant:
//!
//! - **Primitives** must match kind, with one widening rule: a fractional
//!   number targeting `int32` is truncated toward zero (`3.7 -> 3`).
//! - **Timestamps** accept RFC3339 text or a number of epoch milliseconds.
//! - **Structs** require an object; keys are matched exactly, then ASCII
//!   case-insensitively, and unknown keys are rejected.
//! - **Lists** require an array; every element is coerced with the element shape.
//! - `null` anywhere yields the zero value of the target.

use chrono::{DateTime, TimeZone, Utc};
use opcall_registry::{ScalarKind, Shape, StructShape, StructValue, TypedValue};
use serde_json::{Map, Number, Value};

use crate::errors::CoercionError;

/// Coerces `value` into the given `shape`.
///
/// # Arguments
///
/// * `value` - Untyped input value from the envelope
/// * `shape` - Declared shape of the target argument or field
///
/// # Returns
///
/// The typed value, or the first [`CoercionError`] encountered.
///
/// # Examples
///
/// ```rust
/// use opcall_engine::coerce::coerce;
/// use opcall_registry::{Shape, TypedValue};
/// use serde_json::json;
///
/// assert_eq!(coerce(&json!(3.7), &Shape::int32()).unwrap(), TypedValue::Int32(3));
/// assert!(coerce(&json!("3"), &Shape::int32()).is_err());
/// ```
pub fn coerce(value: &Value, shape: &Shape) -> Result<TypedValue, CoercionError> {
    if value.is_null() {
        return Ok(shape.zero_value());
    }
    match shape {
        Shape::Scalar(kind) => coerce_scalar(value, *kind),
        Shape::Timestamp => coerce_timestamp(value),
        Shape::Struct(struct_shape) => coerce_struct(value, struct_shape).map(TypedValue::Struct),
        Shape::List(element_shape) => coerce_list(value, shape, element_shape),
        Shape::Any => Ok(TypedValue::Json(value.clone())),
    }
}

/// Kind name of a JSON value as reported in error messages.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "float64",
        Value::String(_) => "string",
        Value::Array(_) => "slice",
        Value::Object(_) => "map",
    }
}

fn coerce_scalar(value: &Value, kind: ScalarKind) -> Result<TypedValue, CoercionError> {
    let mismatch = || CoercionError::type_mismatch(kind.as_str(), json_kind(value));
    match (kind, value) {
        (ScalarKind::Bool, Value::Bool(flag)) => Ok(TypedValue::Bool(*flag)),
        (ScalarKind::String, Value::String(text)) => Ok(TypedValue::String(text.clone())),
        (ScalarKind::Int32, Value::Number(number)) => coerce_int32(number),
        (ScalarKind::Int64, Value::Number(number)) => coerce_int64(number),
        (ScalarKind::Float32, Value::Number(number)) => number.as_f64().map(|float| TypedValue::Float32(float as f32)).ok_or_else(mismatch),
        (ScalarKind::Float64, Value::Number(number)) => number.as_f64().map(TypedValue::Float64).ok_or_else(mismatch),
        _ => Err(mismatch()),
    }
}

fn coerce_int32(number: &Number) -> Result<TypedValue, CoercionError> {
    let out_of_range = || CoercionError::out_of_range(ScalarKind::Int32.as_str(), number.to_string());
    if let Some(integer) = number.as_i64() {
        return i32::try_from(integer).map(TypedValue::Int32).map_err(|_| out_of_range());
    }
    if number.is_u64() {
        return Err(out_of_range());
    }
    let float = number.as_f64().ok_or_else(out_of_range)?;
    let truncated = float.trunc();
    if !truncated.is_finite() || truncated < f64::from(i32::MIN) || truncated > f64::from(i32::MAX) {
        return Err(out_of_range());
    }
    Ok(TypedValue::Int32(truncated as i32))
}

fn coerce_int64(number: &Number) -> Result<TypedValue, CoercionError> {
    if let Some(integer) = number.as_i64() {
        return Ok(TypedValue::Int64(integer));
    }
    if number.is_u64() {
        return Err(CoercionError::out_of_range(ScalarKind::Int64.as_str(), number.to_string()));
    }
    Err(CoercionError::type_mismatch(ScalarKind::Int64.as_str(), "float64"))
}

fn coerce_timestamp(value: &Value) -> Result<TypedValue, CoercionError> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .map(|instant| TypedValue::Timestamp(instant.with_timezone(&Utc)))
            .map_err(|error| CoercionError::InvalidTimestamp {
                input: text.clone(),
                reason: error.to_string(),
            }),
        Value::Number(number) => {
            let millis = match number.as_i64() {
                Some(integer) => Some(integer),
                None => number.as_f64().filter(|float| float.is_finite()).map(|float| float.trunc() as i64),
            };
            millis
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
                .map(TypedValue::Timestamp)
                .ok_or_else(|| CoercionError::InvalidTimestamp {
                    input: number.to_string(),
                    reason: "epoch milliseconds out of range".to_string(),
                })
        }
        other => Err(CoercionError::invalid_type(Shape::Timestamp.to_string(), json_kind(other))),
    }
}

fn coerce_struct(value: &Value, shape: &StructShape) -> Result<StructValue, CoercionError> {
    let Value::Object(object) = value else {
        return Err(CoercionError::invalid_type(format!("struct {}", shape.name), json_kind(value)));
    };
    decode_fields(object, shape)
}

/// Strict field-by-field decode into a zero-initialized record.
fn decode_fields(object: &Map<String, Value>, shape: &StructShape) -> Result<StructValue, CoercionError> {
    let mut record = shape.zero_value();
    for (key, field_value) in object {
        let field = shape.field(key).ok_or_else(|| CoercionError::UnknownField {
            shape: shape.name.clone(),
            field: key.clone(),
        })?;
        let typed = if field_value.is_null() {
            field.zero_value()
        } else {
            coerce(field_value, &field.shape).map_err(|error| error.within(&field.name))?
        };
        record.fields.insert(field.name.clone(), typed);
    }
    Ok(record)
}

fn coerce_list(value: &Value, shape: &Shape, element_shape: &Shape) -> Result<TypedValue, CoercionError> {
    let Value::Array(items) = value else {
        return Err(CoercionError::invalid_type(shape.to_string(), json_kind(value)));
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| coerce(item, element_shape).map_err(|error| error.within(&format!("[{index}]"))))
        .collect::<Result<Vec<_>, _>>()
        .map(TypedValue::List)
}
