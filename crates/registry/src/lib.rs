//! Registry crate describing the capability surface opcall dispatches against.
//!
//! A [`CapabilitySurface`] is an immutable catalog of operations. Client-level
//! operations sit at the top; everything else lives in ordered, named
//! [`Namespace`]s (one per API category). Every [`Operation`] declares its
//! positional [`ArgDescriptor`]s and a [`CallContract`]:
//!
//! - [`CallContract::Builder`]: the entry point yields a
//!   [`ConfigurableRequest`] whose builder methods are replayed from named
//!   parameters before `execute` produces a three- or two-value [`Returns`].
//! - [`CallContract::Direct`]: a single call that returns `(metadata, error)`.
//!
//! The registry replaces runtime method discovery with an explicit table:
//! lookup order is the declaration order of namespaces.

pub mod request;
pub mod shape;
pub mod surface;
pub mod transport;
pub mod value;

pub use request::{BuilderSignature, CallContext, CallError, ConfigurableRequest, ReturnValue, Returns};
pub use shape::{ArgDescriptor, ScalarKind, Shape, StructField, StructShape};
pub use surface::{BuilderEntry, CallContract, CapabilitySurface, DirectEntry, Located, Namespace, Operation, WAIT_FOR_REQUEST};
pub use transport::{ApiResponse, TransportResponse};
pub use value::{StructValue, TypedValue};
