//! Execute-result normalization into the output envelope.

use indexmap::IndexMap;
use opcall_registry::{ApiResponse, CallError, ReturnValue, Returns, TransportResponse, TypedValue};
use opcall_types::{ErrorStruct, HttpResponse, OutputEnvelope};
use opcall_util::redact_sensitive;
use tracing::{debug, warn};

use crate::errors::DispatchError;

/// Builds the output envelope from an execute return tuple.
///
/// Accepts `(payload, metadata, error)` and `(metadata, error)`; any other
/// layout is a [`DispatchError::MalformedCallContract`]. The HTTP context is
/// taken from the transport response when one exists, with header names
/// lower-cased. An error keeps that context as `apiResponse`.
pub fn normalize(operation: &str, returns: Returns) -> Result<OutputEnvelope, DispatchError> {
    let (payload, metadata, error) = split_returns(operation, returns)?;

    let http_response = metadata.and_then(|metadata| {
        if let Some(status) = metadata.status_code() {
            debug!(operation, status, duration_ms = metadata.request_time.as_millis() as u64, "received response");
        }
        metadata.response.map(http_response_from)
    });

    let mut output = OutputEnvelope {
        http_response: http_response.clone().unwrap_or_default(),
        result: payload.map(|payload| payload.to_json()),
        ..OutputEnvelope::default()
    };
    if let Some(error) = error {
        warn!(operation, error = %redact_sensitive(&error.to_string()), "operation returned an error");
        output.error = Some(error_struct(&error, http_response));
    }
    Ok(output)
}

fn split_returns(
    operation: &str,
    returns: Returns,
) -> Result<(Option<TypedValue>, Option<ApiResponse>, Option<CallError>), DispatchError> {
    let values = match <[ReturnValue; 3]>::try_from(returns.into_values()) {
        Ok([ReturnValue::Payload(payload), ReturnValue::Metadata(metadata), ReturnValue::Error(error)]) => {
            return Ok((payload, metadata, error));
        }
        Ok(_) => return Err(DispatchError::malformed(operation, "execute returned three values in an unexpected order")),
        Err(values) => values,
    };
    match <[ReturnValue; 2]>::try_from(values) {
        Ok([ReturnValue::Metadata(metadata), ReturnValue::Error(error)]) => Ok((None, metadata, error)),
        Ok(_) => Err(DispatchError::malformed(operation, "execute returned two values in an unexpected order")),
        Err(values) => Err(DispatchError::malformed(
            operation,
            format!("execute returned {} values, expected 2 or 3", values.len()),
        )),
    }
}

/// Projects a transport response into the wire representation.
///
/// Header names are lower-cased; names that collide after lower-casing keep
/// all their values in arrival order.
pub fn http_response_from(response: TransportResponse) -> HttpResponse {
    let body = response.body_text();
    let mut headers: IndexMap<String, Vec<String>> = IndexMap::with_capacity(response.headers.len());
    for (name, values) in response.headers {
        headers.entry(name.to_ascii_lowercase()).or_default().extend(values);
    }
    HttpResponse {
        status_code: response.status_code,
        headers,
        body,
    }
}

fn error_struct(error: &CallError, api_response: Option<HttpResponse>) -> ErrorStruct {
    ErrorStruct {
        message: error.to_string(),
        api_response,
    }
}
