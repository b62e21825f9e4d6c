//! Transport metadata returned next to every execute result.

use std::time::Duration;

use indexmap::IndexMap;

/// Request metadata reported by an operation's execute step.
///
/// `response` is `None` when the request never produced an HTTP response
/// (connection refused, timeout, invalid URL).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub operation: String,
    pub method: String,
    pub request_url: String,
    pub request_time: Duration,
    pub response: Option<TransportResponse>,
}

impl ApiResponse {
    /// Metadata for a request that received a response.
    pub fn with_response(operation: impl Into<String>, response: TransportResponse) -> Self {
        Self {
            operation: operation.into(),
            response: Some(response),
            ..Self::default()
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.response.as_ref().map(|response| response.status_code)
    }
}

/// The raw HTTP response as delivered by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportResponse {
    pub status_code: u16,
    /// Header names exactly as delivered; values keep their arrival order.
    pub headers: IndexMap<String, Vec<String>>,
    pub payload: Vec<u8>,
}

impl TransportResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            ..Self::default()
        }
    }

    /// Appends a header value, keeping earlier values for the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Payload decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}
