//! # Dispatcher
//!
//! Drives a single envelope through the dispatch state machine:
//!
//! ```text
//! Decoded -> Located -> Bound -> Configured -> Executed -> Encoded
//! ```
//!
//! Direct operations (such as `WaitForRequest`) skip `Configured`. Any stage
//! may fail; the failure is still encoded into the output envelope so callers
//! always receive a structured response for dispatch-level errors.

use std::fmt;

use opcall_registry::{CallContext, CallContract, CapabilitySurface, Located};
use opcall_types::{InputEnvelope, OutputEnvelope};
use opcall_util::redact_sensitive;
use tracing::{Span, debug, field, info_span, warn};

use crate::binder::bind;
use crate::errors::DispatchError;
use crate::normalize::normalize;
use crate::replay::{builder_method_name, replay};

/// Stage a dispatch has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Decoded,
    Located,
    Bound,
    Configured,
    Executed,
    Encoded,
    Failed,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decoded => "decoded",
            Self::Located => "located",
            Self::Bound => "bound",
            Self::Configured => "configured",
            Self::Executed => "executed",
            Self::Encoded => "encoded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes a caller-supplied operation name to the registry's naming.
///
/// Surrounding whitespace is trimmed and the first letter capitalized, so
/// `datacentersGet` resolves to `DatacentersGet`.
pub fn normalize_operation_name(name: &str) -> String {
    builder_method_name(name.trim())
}

/// Dispatches envelopes against a read-only capability surface.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher<'a> {
    surface: &'a CapabilitySurface,
}

impl<'a> Dispatcher<'a> {
    pub fn new(surface: &'a CapabilitySurface) -> Self {
        Self { surface }
    }

    /// Dispatches one envelope and always produces an output envelope.
    ///
    /// Dispatch failures are reported through `error.message`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use opcall_engine::Dispatcher;
    /// use opcall_registry::CapabilitySurface;
    /// use opcall_types::InputEnvelope;
    ///
    /// let surface = CapabilitySurface::new();
    /// let input = InputEnvelope { operation: "unknownThing".into(), ..InputEnvelope::default() };
    /// let output = Dispatcher::new(&surface).dispatch(input);
    /// assert_eq!(output.error.map(|error| error.message).as_deref(), Some("operation unknownThing not found"));
    /// assert!(output.result.is_none());
    /// ```
    pub fn dispatch(&self, input: InputEnvelope) -> OutputEnvelope {
        match self.try_dispatch(input) {
            Ok(output) => output,
            Err(error) => OutputEnvelope::from_error(error.to_string()),
        }
    }

    /// Dispatches one envelope, returning dispatch failures as errors.
    ///
    /// Errors returned by the operation itself (API and transport failures)
    /// are part of a successful dispatch and end up inside the envelope.
    pub fn try_dispatch(&self, input: InputEnvelope) -> Result<OutputEnvelope, DispatchError> {
        let operation_name = normalize_operation_name(&input.operation);
        let span = info_span!("dispatch", operation = %operation_name, namespace = field::Empty, stage = field::Empty);
        let _entered = span.enter();
        record_stage(&span, DispatchStage::Decoded);

        let result = self.run(&span, &operation_name, input);
        match &result {
            Ok(_) => record_stage(&span, DispatchStage::Encoded),
            Err(error) => {
                record_stage(&span, DispatchStage::Failed);
                warn!(error = %redact_sensitive(&error.to_string()), "dispatch failed");
            }
        }
        result
    }

    fn run(&self, span: &Span, operation_name: &str, input: InputEnvelope) -> Result<OutputEnvelope, DispatchError> {
        let InputEnvelope {
            operation: requested_name,
            mut params,
            ..
        } = input;

        let Located { operation, namespace } =
            self.surface.locate(operation_name).ok_or_else(|| DispatchError::not_found(requested_name))?;
        if let Some(namespace) = namespace {
            span.record("namespace", namespace);
        }
        record_stage(span, DispatchStage::Located);

        let arguments = bind(operation, &mut params)?;
        record_stage(span, DispatchStage::Bound);

        let context = CallContext::new(operation.name(), namespace);
        let returns = match operation.contract() {
            CallContract::Builder(entry) => {
                let request = entry(&context, arguments)?;
                let request = replay(operation.name(), request, &mut params)?;
                record_stage(span, DispatchStage::Configured);
                request.execute()
            }
            CallContract::Direct(entry) => {
                if let Some(leftover) = params.iter().find(|param| !param.processed) {
                    return Err(DispatchError::unknown_parameter(operation.name(), &leftover.name));
                }
                let returns = entry(&context, arguments);
                if returns.arity() != 2 {
                    return Err(DispatchError::malformed(
                        operation.name(),
                        format!("direct operation returned {} values, expected 2", returns.arity()),
                    ));
                }
                returns
            }
        };
        record_stage(span, DispatchStage::Executed);

        normalize(operation.name(), returns)
    }
}

fn record_stage(span: &Span, stage: DispatchStage) {
    span.record("stage", stage.as_str());
    debug!(stage = %stage, "dispatch stage");
}
