//! HTTP transport shared by every catalog operation.

use std::env;
use std::time::Instant;

use indexmap::IndexMap;
use opcall_registry::{ApiResponse, CallError, TransportResponse};
use opcall_util::{block_on_future, redact_sensitive};
use reqwest::{Client, Method, RequestBuilder, StatusCode, header};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ClientConfig, ConfigError, Credentials, validate_base_url};

/// One HTTP request as assembled by a configured operation.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    pub operation: String,
    pub method: Method,
    /// API-relative path (`/datacenters/dc-1`) or an absolute URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpCall {
    pub fn new(operation: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Outcome of a sent call.
///
/// `error` is set only when no response was received; HTTP error statuses
/// are left for the caller to interpret.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub metadata: ApiResponse,
    pub error: Option<CallError>,
}

/// Thin wrapper around a configured `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    credentials: Credentials,
    http: Client,
    user_agent: String,
}

impl ApiClient {
    /// Builds the client for a resolved configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        validate_base_url(&config.base_url)?;

        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        let mut builder = Client::builder().default_headers(default_headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|error| ConfigError::Client(error.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials: config.credentials,
            http,
            user_agent: format!("opcall/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves an API-relative path against the base URL. Absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request(&self, call: &HttpCall, url: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(call.method.clone(), url)
            .header(header::USER_AGENT, &self.user_agent);
        builder = match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credentials::Anonymous => builder,
        };
        if !call.query.is_empty() {
            builder = builder.query(&call.query);
        }
        for (name, value) in &call.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &call.body {
            builder = builder.json(body);
        }
        builder
    }

    /// Sends `call` and blocks until the response body has been read.
    pub fn perform(&self, call: HttpCall) -> Exchange {
        let url = self.url_for(&call.path);
        let request = self.request(&call, &url);
        debug!(operation = %call.operation, method = %call.method, url = %url, "sending request");

        let started = Instant::now();
        let outcome = block_on_future(async move {
            let response = request.send().await?;
            read_response(response).await
        });
        let mut metadata = ApiResponse {
            operation: call.operation,
            method: call.method.to_string(),
            request_url: url,
            request_time: started.elapsed(),
            response: None,
        };

        match outcome {
            Ok(response) => {
                debug!(
                    operation = %metadata.operation,
                    status = response.status_code,
                    duration_ms = metadata.request_time.as_millis() as u64,
                    "http request completed"
                );
                metadata.response = Some(response);
                Exchange { metadata, error: None }
            }
            Err(error) => {
                let message = format!("Network error: {error}");
                warn!(operation = %metadata.operation, error = %redact_sensitive(&message), "http request failed");
                Exchange {
                    metadata,
                    error: Some(CallError::transport(message)),
                }
            }
        }
    }
}

async fn read_response(response: reqwest::Response) -> anyhow::Result<TransportResponse> {
    let status_code = response.status().as_u16();
    let mut headers: IndexMap<String, Vec<String>> = IndexMap::new();
    for (name, value) in response.headers() {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    let payload = response.bytes().await?.to_vec();
    Ok(TransportResponse {
        status_code,
        headers,
        payload,
    })
}

/// `"<code> <reason>"`, as used in API error messages.
pub fn status_line(status_code: u16) -> String {
    StatusCode::from_u16(status_code)
        .map(|status| status.to_string())
        .unwrap_or_else(|_| status_code.to_string())
}

pub fn is_success(status_code: u16) -> bool {
    (200..300).contains(&status_code)
}

/// The error an operation reports for a non-success response.
pub fn api_error(response: &TransportResponse) -> CallError {
    CallError::api(status_line(response.status_code), response.body_text())
}
