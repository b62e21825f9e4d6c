//! # Opcall Engine
//!
//! The engine turns one decoded [`InputEnvelope`](opcall_types::InputEnvelope)
//! into one [`OutputEnvelope`](opcall_types::OutputEnvelope) by driving an
//! operation of a [`CapabilitySurface`](opcall_registry::CapabilitySurface).
//!
//! ## Pipeline
//!
//! - **`coerce`**: untyped JSON to shaped [`TypedValue`](opcall_registry::TypedValue)s
//! - **`binder`**: positional parameters onto operation arguments
//! - **`replay`**: remaining named parameters onto builder methods, including
//!   the `filters` expansion
//! - **`normalize`**: execute return tuples into the output envelope
//! - **`dispatch`**: the per-envelope state machine tying the stages together
//!
//! ## Usage
//!
//! ```rust
//! use opcall_engine::Dispatcher;
//! use opcall_registry::{CapabilitySurface, Namespace, Operation, Returns};
//! use opcall_types::decode_input;
//!
//! let surface = CapabilitySurface::new().with_namespace(Namespace::new("LocationsApi").with_operation(Operation::direct(
//!     "LocationsGet",
//!     vec![],
//!     |_, _| Returns::metadata_only(None, None),
//! )));
//!
//! let input = decode_input(r#"{"operation":"locationsGet","params":[]}"#)?;
//! let output = Dispatcher::new(&surface).dispatch(input);
//! assert!(output.error.is_none());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binder;
pub mod coerce;
pub mod dispatch;
pub mod errors;
pub mod normalize;
pub mod replay;

#[cfg(test)]
pub(crate) mod testing;

pub use binder::bind;
pub use coerce::coerce;
pub use dispatch::{DispatchStage, Dispatcher, normalize_operation_name};
pub use errors::{CoercionError, DispatchError};
pub use normalize::{http_response_from, normalize};
pub use replay::{FILTER_METHOD, FILTERS_PARAM, builder_method_name, replay};
