//! Configurable HTTP requests produced by catalog operations.

use std::sync::Arc;

use opcall_registry::{ArgDescriptor, BuilderSignature, CallError, ConfigurableRequest, Returns, TypedValue};
use opcall_util::build_path;
use reqwest::Method;
use serde_json::{Map, Value};
use tracing::debug;

use crate::catalog::{ArgLocation, ReturnsKind};
use crate::client::{ApiClient, HttpCall, api_error, is_success};

/// Query parameter prefix used by `Filter(key, value)`.
pub const FILTER_QUERY_PREFIX: &str = "filter.";

/// Where a builder method writes its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderTarget {
    Query(String),
    Header(String),
    Filter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuilderBinding {
    pub signature: BuilderSignature,
    pub target: BuilderTarget,
}

/// Positional argument and where it lands in the request.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgBinding {
    pub descriptor: ArgDescriptor,
    pub location: ArgLocation,
}

/// A catalog operation compiled for execution.
#[derive(Debug, Clone)]
pub struct OperationPlan {
    pub name: String,
    pub method: Method,
    pub path: String,
    pub args: Vec<ArgBinding>,
    pub builders: Vec<BuilderBinding>,
    pub returns: ReturnsKind,
}

/// Request state accumulated between the entry call and execute.
#[derive(Debug)]
pub struct HttpRequest {
    client: Arc<ApiClient>,
    plan: Arc<OperationPlan>,
    call: HttpCall,
}

impl HttpRequest {
    /// Starts a request from bound positional arguments.
    pub fn new(client: Arc<ApiClient>, plan: Arc<OperationPlan>, arguments: Vec<TypedValue>) -> Self {
        let mut path_variables = Map::new();
        let mut call = HttpCall::new(plan.name.clone(), plan.method.clone(), String::new());

        for (binding, value) in plan.args.iter().zip(arguments) {
            if value.is_absent() {
                continue;
            }
            let name = binding.descriptor.name.clone();
            match binding.location {
                ArgLocation::Path => {
                    path_variables.insert(name, Value::String(wire_text(&value)));
                }
                ArgLocation::Body => call.body = Some(value.to_json()),
                ArgLocation::Query => push_wire_values(&mut call.query, &name, &value),
            }
        }
        call.path = build_path(&plan.path, &path_variables);

        Self { client, plan, call }
    }

    /// Applies a builder method in place.
    pub fn apply(&mut self, method: &str, arguments: Vec<TypedValue>) -> Result<(), CallError> {
        let binding = self
            .plan
            .builders
            .iter()
            .find(|binding| binding.signature.name == method)
            .ok_or_else(|| CallError::failed(format!("operation {}: no builder method {method}", self.plan.name)))?;

        match (&binding.target, arguments.as_slice()) {
            (BuilderTarget::Query(name), [value]) => push_wire_values(&mut self.call.query, name, value),
            (BuilderTarget::Header(name), [value]) => {
                if !value.is_absent() {
                    self.call.headers.push((name.clone(), wire_text(value)));
                }
            }
            (BuilderTarget::Filter, [key, value]) => {
                let name = format!("{FILTER_QUERY_PREFIX}{}", wire_text(key));
                push_wire_values(&mut self.call.query, &name, value);
            }
            (_, arguments) => {
                return Err(CallError::failed(format!(
                    "operation {}: builder {method} received {} arguments",
                    self.plan.name,
                    arguments.len()
                )));
            }
        }
        Ok(())
    }

    pub fn call(&self) -> &HttpCall {
        &self.call
    }
}

impl ConfigurableRequest for HttpRequest {
    fn builder(&self, name: &str) -> Option<&BuilderSignature> {
        self.plan
            .builders
            .iter()
            .find(|binding| binding.signature.name == name)
            .map(|binding| &binding.signature)
    }

    fn configure(mut self: Box<Self>, method: &str, arguments: Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError> {
        self.apply(method, arguments)?;
        Ok(self)
    }

    fn execute(self: Box<Self>) -> Returns {
        let HttpRequest { client, plan, call } = *self;
        let exchange = client.perform(call);

        let (result, error) = match (&exchange.metadata.response, exchange.error) {
            (_, Some(error)) => (None, Some(error)),
            (None, None) => (None, Some(CallError::transport("no response received"))),
            (Some(response), None) if !is_success(response.status_code) => (None, Some(api_error(response))),
            (Some(response), None) => match parse_payload(&response.payload) {
                Ok(result) => (result, None),
                Err(error) => (None, Some(error)),
            },
        };
        debug!(operation = %plan.name, failed = error.is_some(), "executed request");

        match plan.returns {
            ReturnsKind::Result => Returns::with_result(result, Some(exchange.metadata), error),
            ReturnsKind::Metadata => Returns::metadata_only(Some(exchange.metadata), error),
        }
    }
}

fn parse_payload(payload: &[u8]) -> Result<Option<TypedValue>, CallError> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<Value>(payload)
        .map(|value| Some(TypedValue::Json(value)))
        .map_err(|error| CallError::failed(format!("invalid JSON response: {error}")))
}

/// Text form of a value as sent in paths, query strings and headers.
pub fn wire_text(value: &TypedValue) -> String {
    match value.to_json() {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Appends `name=value`, one pair per element for lists. Absent values add nothing.
fn push_wire_values(pairs: &mut Vec<(String, String)>, name: &str, value: &TypedValue) {
    match value {
        TypedValue::Absent => {}
        TypedValue::List(items) => {
            for item in items {
                push_wire_values(pairs, name, item);
            }
        }
        other => pairs.push((name.to_string(), wire_text(other))),
    }
}
