//! Compiles a [`Catalog`] into a [`CapabilitySurface`] backed by HTTP.

use std::sync::Arc;

use heck::ToUpperCamelCase;
use opcall_registry::{ArgDescriptor, BuilderSignature, CapabilitySurface, ConfigurableRequest, Namespace, Operation, Shape};
use reqwest::Method;
use tracing::debug;

use crate::catalog::{ArgLocation, Catalog, CatalogError, OperationSpec, ShapeResolver, path_placeholders};
use crate::client::ApiClient;
use crate::request::{ArgBinding, BuilderBinding, BuilderTarget, HttpRequest, OperationPlan};
use crate::wait::{WaitPolicy, wait_for_request_operation};

/// Builder method name for a wire name: `X-Contract-Number` becomes `XContractNumber`.
pub fn builder_name(wire_name: &str) -> String {
    wire_name.to_upper_camel_case()
}

/// Builds the surface for `catalog`, with `WaitForRequest` at client level.
///
/// # Errors
///
/// Returns [`CatalogError`] when a type cannot be resolved, a method is not a
/// valid HTTP verb, or a path placeholder has no matching path argument.
pub fn build_surface(catalog: &Catalog, client: Arc<ApiClient>, wait: WaitPolicy) -> Result<CapabilitySurface, CatalogError> {
    let mut resolver = ShapeResolver::new(catalog);
    let mut surface = CapabilitySurface::new().with_client_operation(wait_for_request_operation(Arc::clone(&client), wait));

    for namespace_spec in &catalog.namespaces {
        let mut namespace = Namespace::new(&namespace_spec.name).api_bearing(namespace_spec.api_bearing);
        for spec in &namespace_spec.operations {
            let plan = Arc::new(compile_operation(spec, &mut resolver)?);
            namespace = namespace.with_operation(http_operation(plan, Arc::clone(&client)));
        }
        debug!(
            namespace = %namespace_spec.name,
            operations = namespace_spec.operations.len(),
            "registered namespace"
        );
        surface = surface.with_namespace(namespace);
    }
    Ok(surface)
}

fn compile_operation(spec: &OperationSpec, resolver: &mut ShapeResolver<'_>) -> Result<OperationPlan, CatalogError> {
    let method = Method::from_bytes(spec.method.trim().to_ascii_uppercase().as_bytes()).map_err(|_| CatalogError::InvalidMethod {
        operation: spec.name.clone(),
        method: spec.method.clone(),
    })?;

    for placeholder in path_placeholders(&spec.path) {
        let bound = spec
            .args
            .iter()
            .any(|arg| arg.location == ArgLocation::Path && arg.name == placeholder);
        if !bound {
            return Err(CatalogError::MissingPathArgument {
                operation: spec.name.clone(),
                placeholder,
            });
        }
    }

    let mut args = Vec::with_capacity(spec.args.len());
    for arg in &spec.args {
        if arg.location == ArgLocation::Path && arg.optional {
            return Err(CatalogError::OptionalPathArgument {
                operation: spec.name.clone(),
                argument: arg.name.clone(),
            });
        }
        let shape = resolver.resolve(&arg.type_name, &format!("operation {}, argument {}", spec.name, arg.name))?;
        let descriptor = if arg.optional {
            ArgDescriptor::optional(&arg.name, shape)
        } else {
            ArgDescriptor::required(&arg.name, shape)
        };
        args.push(ArgBinding {
            descriptor,
            location: arg.location,
        });
    }

    let mut builders = Vec::new();
    for (params, header) in [(&spec.query, false), (&spec.headers, true)] {
        for param in params {
            let shape = resolver.resolve(&param.type_name, &format!("operation {}, parameter {}", spec.name, param.name))?;
            let target = if header {
                BuilderTarget::Header(param.name.clone())
            } else {
                BuilderTarget::Query(param.name.clone())
            };
            builders.push(BuilderBinding {
                signature: BuilderSignature::new(builder_name(&param.name), vec![shape]),
                target,
            });
        }
    }
    if spec.filters {
        builders.push(BuilderBinding {
            signature: BuilderSignature::new("Filter", vec![Shape::string(), Shape::string()]),
            target: BuilderTarget::Filter,
        });
    }

    Ok(OperationPlan {
        name: spec.name.clone(),
        method,
        path: spec.path.clone(),
        args,
        builders,
        returns: spec.returns,
    })
}

fn http_operation(plan: Arc<OperationPlan>, client: Arc<ApiClient>) -> Operation {
    let args = plan.args.iter().map(|binding| binding.descriptor.clone()).collect();
    let name = plan.name.clone();
    Operation::builder(name, args, move |_context, arguments| {
        let request: Box<dyn ConfigurableRequest> =
            Box::new(HttpRequest::new(Arc::clone(&client), Arc::clone(&plan), arguments));
        Ok(request)
    })
}
