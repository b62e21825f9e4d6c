//! Envelope decoding and encoding.
//!
//! Input arrives on stdin as one JSON document that may be split across
//! several lines. Lines are concatenated before parsing, so line breaks only
//! ever separate JSON tokens. Output is a single JSON document followed by a
//! newline.

use std::io::{self, BufRead, Write};

use thiserror::Error;

use crate::{InputEnvelope, OutputEnvelope};

/// Failures that prevent an envelope from being read or written.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The input stream could not be read.
    #[error("input error: {0}")]
    Read(#[source] io::Error),

    /// The input is not a JSON document matching [`InputEnvelope`].
    #[error("JSON decoding error: {0}")]
    Decode(#[source] serde_json::Error),

    /// The envelope names no operation.
    #[error("missing operation")]
    MissingOperation,

    /// The output envelope could not be serialized.
    #[error("failed to encode output: {0}")]
    Encode(#[source] serde_json::Error),

    /// The output stream rejected the write.
    #[error("output error: {0}")]
    Write(#[source] io::Error),
}

impl EnvelopeError {
    /// Exit status for envelope-level failures. These always abort with a
    /// non-zero code because no dispatch happened.
    pub fn exit_status(&self) -> i32 {
        1
    }
}

/// Reads every line from `reader` and decodes the concatenation.
///
/// # Errors
///
/// Returns [`EnvelopeError::Read`] when the stream fails and the errors of
/// [`decode_input`] otherwise.
pub fn read_input<R: BufRead>(reader: R) -> Result<InputEnvelope, EnvelopeError> {
    let mut joined = String::new();
    for line in reader.lines() {
        joined.push_str(&line.map_err(EnvelopeError::Read)?);
    }
    decode_input(&joined)
}

/// Decodes and validates an input envelope.
///
/// # Errors
///
/// - [`EnvelopeError::Decode`] for malformed JSON or a schema mismatch.
/// - [`EnvelopeError::MissingOperation`] when `operation` is empty or blank.
///
/// # Example
/// ```rust
/// use opcall_types::decode_input;
///
/// let input = decode_input(r#"{"operation":"datacentersGet","params":[]}"#).unwrap();
/// assert_eq!(input.operation, "datacentersGet");
/// assert!(decode_input(r#"{"operation":"  "}"#).is_err());
/// ```
pub fn decode_input(text: &str) -> Result<InputEnvelope, EnvelopeError> {
    let input: InputEnvelope = serde_json::from_str(text).map_err(EnvelopeError::Decode)?;
    if input.operation.trim().is_empty() {
        return Err(EnvelopeError::MissingOperation);
    }
    Ok(input)
}

/// Serializes an output envelope to a compact JSON string.
///
/// # Errors
///
/// Returns [`EnvelopeError::Encode`] if serialization fails.
pub fn encode_output(output: &OutputEnvelope) -> Result<String, EnvelopeError> {
    serde_json::to_string(output).map_err(EnvelopeError::Encode)
}

/// Writes the output envelope followed by a newline and flushes the writer.
///
/// # Errors
///
/// Returns [`EnvelopeError::Encode`] or [`EnvelopeError::Write`].
pub fn write_output<W: Write>(mut writer: W, output: &OutputEnvelope) -> Result<(), EnvelopeError> {
    let text = encode_output(output)?;
    writer.write_all(text.as_bytes()).map_err(EnvelopeError::Write)?;
    writer.write_all(b"\n").map_err(EnvelopeError::Write)?;
    writer.flush().map_err(EnvelopeError::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_envelope_split_across_lines() {
        let text = "{\"operation\":\"datacentersFindById\",\n\"params\":[\n{\"name\":\"datacenterId\",\"value\":\"dc-1\"}]}\n";
        let input = read_input(text.as_bytes()).expect("read multi-line envelope");
        assert_eq!(input.operation, "datacentersFindById");
        assert_eq!(input.params.len(), 1);
        assert_eq!(input.params[0].value, json!("dc-1"));
    }

    #[test]
    fn preserves_param_order() {
        let input = decode_input(r#"{"operation":"op","params":[{"name":"b","value":1},{"name":"a","value":2}]}"#).expect("decode");
        let names: Vec<_> = input.params.iter().map(|param| param.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn rejects_malformed_json() {
        let error = decode_input("{not json").expect_err("malformed input");
        assert!(matches!(error, EnvelopeError::Decode(_)));
        assert!(error.to_string().starts_with("JSON decoding error"));
        assert_eq!(error.exit_status(), 1);
    }

    #[test]
    fn rejects_empty_input() {
        let error = read_input("".as_bytes()).expect_err("empty input");
        assert!(matches!(error, EnvelopeError::Decode(_)));
    }

    #[test]
    fn rejects_missing_operation() {
        let error = decode_input(r#"{"params":[]}"#).expect_err("missing operation");
        assert!(matches!(error, EnvelopeError::MissingOperation));
        assert_eq!(error.to_string(), "missing operation");
    }

    #[test]
    fn writes_single_line_with_trailing_newline() {
        let mut buffer = Vec::new();
        write_output(&mut buffer, &OutputEnvelope::from_error("boom")).expect("write output");
        let text = String::from_utf8(buffer).expect("utf8");
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.starts_with(r#"{"error":{"message":"boom"}"#));
    }
}
