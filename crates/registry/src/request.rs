//! Configurable requests, builder signatures and execute return tuples.

use thiserror::Error;

use crate::shape::Shape;
use crate::transport::ApiResponse;
use crate::value::TypedValue;

/// Implicit leading argument of every operation call.
///
/// Callers never supply it; the dispatcher creates one per dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub operation: String,
    pub namespace: Option<String>,
}

impl CallContext {
    pub fn new(operation: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            operation: operation.into(),
            namespace: namespace.map(str::to_string),
        }
    }
}

/// Errors produced by the capability surface itself.
///
/// The display text is what ends up in the output envelope's
/// `error.message`, so variants render without extra decoration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The API answered with a non-success status.
    #[error("{status_line}: {body}")]
    Api { status_line: String, body: String },

    /// No response was received.
    #[error("{message}")]
    Transport { message: String },

    /// The operation rejected its input or failed for another reason.
    #[error("{message}")]
    Failed { message: String },
}

impl CallError {
    pub fn api(status_line: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Api {
            status_line: status_line.into(),
            body: body.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }
}

/// Declared parameter shapes of a builder method.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderSignature {
    pub name: String,
    pub params: Vec<Shape>,
}

impl BuilderSignature {
    pub fn new(name: impl Into<String>, params: Vec<Shape>) -> Self {
        Self { name: name.into(), params }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// One slot of the tuple returned by `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Payload(Option<TypedValue>),
    Metadata(Option<ApiResponse>),
    Error(Option<CallError>),
}

/// The ordered values returned by an execute step.
///
/// Well-formed surfaces return either `(payload, metadata, error)` or
/// `(metadata, error)`; the normalizer rejects any other layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Returns(pub Vec<ReturnValue>);

impl Returns {
    /// Three-value return of operations that produce a result.
    pub fn with_result(result: Option<TypedValue>, metadata: Option<ApiResponse>, error: Option<CallError>) -> Self {
        Self(vec![
            ReturnValue::Payload(result),
            ReturnValue::Metadata(metadata),
            ReturnValue::Error(error),
        ])
    }

    /// Two-value return of operations without a result body.
    pub fn metadata_only(metadata: Option<ApiResponse>, error: Option<CallError>) -> Self {
        Self(vec![ReturnValue::Metadata(metadata), ReturnValue::Error(error)])
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn into_values(self) -> Vec<ReturnValue> {
        self.0
    }
}

/// The object an operation's entry point returns.
///
/// Builder methods consume the request and hand back the next one; an
/// implementation may return itself or a different request type.
pub trait ConfigurableRequest: Send {
    /// Looks up a builder method by its exact (capitalized) name.
    fn builder(&self, name: &str) -> Option<&BuilderSignature>;

    /// Applies a builder method. `arguments` already match the signature.
    ///
    /// # Errors
    ///
    /// Returns a [`CallError`] when the request rejects the configuration.
    fn configure(self: Box<Self>, method: &str, arguments: Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError>;

    /// Performs the request.
    fn execute(self: Box<Self>) -> Returns;
}
