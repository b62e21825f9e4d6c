//! Error types raised while coercing values and dispatching operations.

use opcall_registry::CallError;
use opcall_types::EnvelopeError;
use thiserror::Error;

/// Failure converting an untyped JSON value into a shaped argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    /// The JSON kind cannot represent the target shape at all.
    #[error("invalid parameter type: expected {expected}, got {found}")]
    InvalidParameterType { expected: String, found: String },

    /// A string targeted a timestamp but is not valid RFC3339.
    #[error("could not parse time parameter {input}: {reason}")]
    InvalidTimestamp { input: String, reason: String },

    /// Primitive kinds differ and no widening rule applies.
    #[error("needed {expected} arg but got {found}")]
    TypeMismatch { expected: String, found: String },

    /// The number does not fit the target integer width.
    #[error("value {value} out of range for {expected}")]
    OutOfRange { expected: String, value: String },

    /// Strict struct decoding met a key the struct does not declare.
    #[error("struct {shape} has no field {field}")]
    UnknownField { shape: String, field: String },

    /// A nested field or list element failed.
    #[error("{path}: {source}")]
    Nested {
        path: String,
        #[source]
        source: Box<CoercionError>,
    },
}

impl CoercionError {
    pub fn invalid_type(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::InvalidParameterType {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn out_of_range(expected: impl Into<String>, value: impl Into<String>) -> Self {
        Self::OutOfRange {
            expected: expected.into(),
            value: value.into(),
        }
    }

    /// Prefixes the error with a field name or `[index]` segment.
    pub fn within(self, segment: &str) -> Self {
        match self {
            Self::Nested { path, source } => {
                let joined = if path.starts_with('[') { format!("{segment}{path}") } else { format!("{segment}.{path}") };
                Self::Nested { path: joined, source }
            }
            other => Self::Nested {
                path: segment.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping nesting.
    pub fn root(&self) -> &CoercionError {
        match self {
            Self::Nested { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Failure at any stage of a dispatch.
///
/// Everything except [`DispatchError::Envelope`] is reported inside the output
/// envelope with a zero exit status.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error("operation {name} not found")]
    OperationNotFound { name: String },

    #[error("operation {operation}: too few params; found {found}, expected {expected}")]
    TooFewParameters { operation: String, found: usize, expected: usize },

    #[error("operation {operation}: param #{index}: {source}")]
    Parameter {
        operation: String,
        index: usize,
        #[source]
        source: CoercionError,
    },

    #[error("operation {operation}: {method}: {source}")]
    BuilderArgument {
        operation: String,
        method: String,
        #[source]
        source: CoercionError,
    },

    #[error("operation {operation}: unknown parameter {parameter}")]
    UnknownParameter { operation: String, parameter: String },

    #[error("no valid value param for filter query param")]
    InvalidFilterParameter { operation: String },

    #[error("no valid builder method for filter query param")]
    NoFilterMethod { operation: String },

    #[error("operation {operation}: malformed call contract: {detail}")]
    MalformedCallContract { operation: String, detail: String },

    /// Error returned by the capability surface itself (transport, API or entry point).
    #[error(transparent)]
    Call(#[from] CallError),
}

impl DispatchError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::OperationNotFound { name: name.into() }
    }

    pub fn unknown_parameter(operation: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self::UnknownParameter {
            operation: operation.into(),
            parameter: parameter.into(),
        }
    }

    pub fn malformed(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::MalformedCallContract {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Process exit status for this failure.
    ///
    /// Only envelope-level failures (unreadable or undecodable input, missing
    /// operation) are non-zero; dispatch failures travel inside the envelope.
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Envelope(error) => error.exit_status(),
            _ => 0,
        }
    }
}
