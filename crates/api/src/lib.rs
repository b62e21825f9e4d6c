//! HTTP-backed capability surface for the opcall dispatcher.
//!
//! A [`Catalog`] describes namespaces of REST operations. [`build_surface`]
//! turns it into a [`CapabilitySurface`](opcall_registry::CapabilitySurface)
//! whose operations assemble a request from bound arguments and builder
//! calls, then send it through a shared [`ApiClient`]. The client-level
//! `WaitForRequest` operation polls asynchronous requests until they settle.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use opcall_api::{ApiClient, Catalog, ClientConfig, WaitPolicy, build_surface};
//!
//! # fn main() -> anyhow::Result<()> {
//! let client = Arc::new(ApiClient::new(ClientConfig::resolve(None)?)?);
//! let surface = build_surface(&Catalog::embedded()?, client, WaitPolicy::default())?;
//! assert!(surface.locate("DatacentersGet").is_some());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod client;
pub mod config;
pub mod request;
pub mod surface;
pub mod wait;

pub use catalog::{CATALOG_PATH_ENV, Catalog, CatalogError, CatalogSource};
pub use client::{ApiClient, HttpCall, status_line};
pub use config::{ClientConfig, ConfigError, Credentials, DEFAULT_API_URL};
pub use request::HttpRequest;
pub use surface::{build_surface, builder_name};
pub use wait::{WaitPolicy, wait_for_request};
