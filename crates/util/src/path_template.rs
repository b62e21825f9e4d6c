//! Path template expansion for OpenAPI style `/resource/{id}` paths.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

/// Bytes that must be escaped inside a single path segment. Everything except
/// the RFC3986 unreserved set (`A-Z a-z 0-9 - . _ ~`).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Replaces `{name}` placeholders in `template` with the matching values.
///
/// String values are inserted verbatim (after encoding); other JSON values use
/// their JSON text. Placeholders without a matching variable are left as-is.
///
/// # Example
/// ```rust
/// use opcall_util::build_path;
/// use serde_json::{Map, Value};
///
/// let mut variables = Map::new();
/// variables.insert("datacenterId".into(), Value::String("dc 1".into()));
/// assert_eq!(build_path("/datacenters/{datacenterId}", &variables), "/datacenters/dc%201");
/// ```
pub fn build_path(template: &str, variables: &Map<String, Value>) -> String {
    let mut path = template.to_string();
    for (name, value) in variables {
        let raw = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        path = path.replace(&format!("{{{name}}}"), &encode_path_placeholder_value(&raw));
    }
    path
}

/// Percent-encodes a path placeholder value while preserving RFC3986 unreserved bytes.
pub fn encode_path_placeholder_value(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}
