//! `WaitForRequest`: polls an asynchronous API request until it settles.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use opcall_registry::{ArgDescriptor, CallError, Operation, Returns, Shape, TypedValue, WAIT_FOR_REQUEST};
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{ApiClient, HttpCall, api_error, is_success};

static REQUEST_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/requests/([-A-Fa-f0-9]+)").expect("request id regex should compile"));
static BARE_REQUEST_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-A-Fa-f0-9]+$").expect("bare request id regex should compile"));

/// Polling cadence and overall deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(80),
        }
    }
}

/// The request being waited on and the URL its status is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTarget {
    pub request_id: String,
    pub status_path: String,
}

/// Works out the status URL for `request`.
///
/// Accepts a status URL as returned in the `Location` header, a request URL
/// (`.../requests/<id>`), or a bare request id.
pub fn status_target(request: &str) -> Option<StatusTarget> {
    let request = request.trim();
    if let Some(captures) = REQUEST_ID.captures(request) {
        let request_id = captures.get(1)?.as_str().to_string();
        let status_path = if request.trim_end_matches('/').ends_with("/status") {
            request.to_string()
        } else {
            format!("/requests/{request_id}/status")
        };
        return Some(StatusTarget { request_id, status_path });
    }
    BARE_REQUEST_ID.is_match(request).then(|| StatusTarget {
        request_id: request.to_string(),
        status_path: format!("/requests/{request}/status"),
    })
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    #[serde(default)]
    metadata: StatusMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct StatusMetadata {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: Option<String>,
}

/// Polls the status of `request` until it is `DONE` or `FAILED`.
///
/// Returns `(metadata, error)` where metadata describes the last status call.
pub fn wait_for_request(client: &ApiClient, request: &str, policy: &WaitPolicy) -> Returns {
    let Some(target) = status_target(request) else {
        return Returns::metadata_only(None, Some(CallError::failed(format!("could not find a request id in '{request}'"))));
    };
    let deadline = Instant::now() + policy.timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let exchange = client.perform(HttpCall::new(WAIT_FOR_REQUEST, Method::GET, target.status_path.clone()));
        let metadata = exchange.metadata;
        if let Some(error) = exchange.error {
            return Returns::metadata_only(Some(metadata), Some(error));
        }
        let Some(response) = metadata.response.as_ref() else {
            return Returns::metadata_only(Some(metadata), Some(CallError::transport("no response received")));
        };
        if !is_success(response.status_code) {
            let error = api_error(response);
            return Returns::metadata_only(Some(metadata), Some(error));
        }

        let status = match serde_json::from_slice::<RequestStatus>(&response.payload) {
            Ok(status) => status.metadata,
            Err(error) => {
                let error = CallError::failed(format!("invalid request status for {}: {error}", target.request_id));
                return Returns::metadata_only(Some(metadata), Some(error));
            }
        };
        debug!(request_id = %target.request_id, attempt, status = %status.status, "polled request status");

        match status.status.as_str() {
            "DONE" => {
                info!(request_id = %target.request_id, attempt, "request completed");
                return Returns::metadata_only(Some(metadata), None);
            }
            "FAILED" => {
                let message = status.message.unwrap_or_default();
                let error = CallError::failed(format!("Request {} failed: {message}", target.request_id));
                return Returns::metadata_only(Some(metadata), Some(error));
            }
            _ => {}
        }

        if Instant::now() + policy.interval > deadline {
            let error = CallError::failed(format!(
                "timed out after {}s waiting for request {}",
                policy.timeout.as_secs(),
                target.request_id
            ));
            return Returns::metadata_only(Some(metadata), Some(error));
        }
        thread::sleep(policy.interval);
    }
}

/// The client-level `WaitForRequest(request)` operation.
pub fn wait_for_request_operation(client: Arc<ApiClient>, policy: WaitPolicy) -> Operation {
    Operation::direct(
        WAIT_FOR_REQUEST,
        vec![ArgDescriptor::required("request", Shape::string())],
        move |_context, arguments| {
            let request = arguments.first().and_then(TypedValue::as_str).unwrap_or_default();
            wait_for_request(&client, request, &policy)
        },
    )
}
