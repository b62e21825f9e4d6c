//! Wire types for the opcall dispatcher.
//!
//! A single dispatch reads one [`InputEnvelope`] and writes one
//! [`OutputEnvelope`]. The JSON field names defined here are the external
//! contract consumed by SDK test runners, so renames must stay stable.
//!
//! ```json
//! {"operation":"datacentersFindById","params":[{"name":"datacenterId","value":"dc-1"}]}
//! ```

pub mod codec;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use codec::{EnvelopeError, decode_input, encode_output, read_input, write_output};

/// Request envelope naming an operation and its ordered parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputEnvelope {
    /// Operation name as sent by the caller (for example `datacentersGet`).
    #[serde(default)]
    pub operation: String,
    /// Ordered parameters. Order decides positional binding.
    #[serde(default)]
    pub params: Vec<Param>,
    /// Credential and transport overrides for the API client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Options>,
}

/// A single named parameter.
///
/// `processed` is dispatch-time bookkeeping and never crosses the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Param {
    /// Parameter name, used for builder replay when not bound positionally.
    #[serde(default)]
    pub name: String,
    /// Untyped value; `null` and a missing key are equivalent.
    #[serde(default)]
    pub value: Value,
    /// Whether positional binding or builder replay consumed this parameter.
    #[serde(skip)]
    pub processed: bool,
}

impl Param {
    /// Creates an unprocessed parameter.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            processed: false,
        }
    }

    /// Returns true when the caller sent no value (or an explicit `null`).
    pub fn is_absent(&self) -> bool {
        self.value.is_null()
    }
}

/// Client options carried by the envelope.
///
/// The dispatcher never reads these; they feed the API client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i64>,
}

/// Raw HTTP context of a response.
///
/// Header names are lower-cased by the normalizer before they land here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: IndexMap<String, Vec<String>>,
    pub body: String,
}

/// Error section of the output envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStruct {
    pub message: String,
    /// HTTP context of the failed call, only when a response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_response: Option<HttpResponse>,
}

impl ErrorStruct {
    /// Creates an error without HTTP context.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            api_response: None,
        }
    }
}

/// Response envelope written once per dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorStruct>,
    /// Zero value when the call produced no HTTP response.
    #[serde(default)]
    pub http_response: HttpResponse,
    #[serde(default)]
    pub result: Option<Value>,
}

impl OutputEnvelope {
    /// Envelope carrying only an error message.
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(ErrorStruct::new(message)),
            ..Self::default()
        }
    }

    /// Returns true when the envelope reports an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
