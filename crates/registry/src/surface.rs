//! Operations, namespaces and the capability surface lookup.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::request::{CallContext, CallError, ConfigurableRequest, Returns};
use crate::shape::ArgDescriptor;
use crate::value::TypedValue;

/// Client-level operation that blocks until an asynchronous request finishes.
///
/// It is resolved only against the client operations and never inside a
/// namespace.
pub const WAIT_FOR_REQUEST: &str = "WaitForRequest";

/// Entry point of an operation with a builder phase.
pub type BuilderEntry =
    Arc<dyn Fn(&CallContext, Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError> + Send + Sync>;

/// Entry point of an operation that executes in a single call.
pub type DirectEntry = Arc<dyn Fn(&CallContext, Vec<TypedValue>) -> Returns + Send + Sync>;

/// How an operation is driven once its arguments are bound.
#[derive(Clone)]
pub enum CallContract {
    /// Call, replay builder methods, then execute.
    Builder(BuilderEntry),
    /// Call once; the result is always `(metadata, error)`.
    Direct(DirectEntry),
}

impl fmt::Debug for CallContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builder(_) => f.write_str("Builder"),
            Self::Direct(_) => f.write_str("Direct"),
        }
    }
}

/// A single invokable capability.
#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    namespace: Option<String>,
    args: Vec<ArgDescriptor>,
    contract: CallContract,
}

impl Operation {
    /// Declares an operation with a builder phase.
    pub fn builder<F>(name: impl Into<String>, args: Vec<ArgDescriptor>, entry: F) -> Self
    where
        F: Fn(&CallContext, Vec<TypedValue>) -> Result<Box<dyn ConfigurableRequest>, CallError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            namespace: None,
            args,
            contract: CallContract::Builder(Arc::new(entry)),
        }
    }

    /// Declares a single-call operation returning `(metadata, error)`.
    pub fn direct<F>(name: impl Into<String>, args: Vec<ArgDescriptor>, entry: F) -> Self
    where
        F: Fn(&CallContext, Vec<TypedValue>) -> Returns + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            namespace: None,
            args,
            contract: CallContract::Direct(Arc::new(entry)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespace that owns the operation, `None` for client-level operations.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn args(&self) -> &[ArgDescriptor] {
        &self.args
    }

    pub fn contract(&self) -> &CallContract {
        &self.contract
    }

    /// Number of parameters a caller must send positionally.
    ///
    /// Trailing optional arguments may be omitted; an optional argument
    /// followed by a required one still needs a placeholder.
    pub fn required_positional_count(&self) -> usize {
        self.args.iter().rposition(|arg| !arg.optional).map(|index| index + 1).unwrap_or(0)
    }

    /// `Namespace.Operation`, or just the name for client operations.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(namespace) => format!("{namespace}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// A named group of operations (one API category).
#[derive(Debug, Clone)]
pub struct Namespace {
    name: String,
    api_bearing: bool,
    operations: IndexMap<String, Operation>,
}

impl Namespace {
    /// Creates an API-bearing namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_bearing: true,
            operations: IndexMap::new(),
        }
    }

    /// Marks whether lookups should consider this namespace.
    pub fn api_bearing(mut self, api_bearing: bool) -> Self {
        self.api_bearing = api_bearing;
        self
    }

    /// Adds an operation; a later operation with the same name replaces the earlier one.
    pub fn with_operation(mut self, mut operation: Operation) -> Self {
        operation.namespace = Some(self.name.clone());
        self.operations.insert(operation.name.clone(), operation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_api_bearing(&self) -> bool {
        self.api_bearing
    }

    pub fn operation(&self, name: &str) -> Option<&Operation> {
        self.operations.get(name)
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.operations.values()
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, Copy)]
pub struct Located<'a> {
    pub operation: &'a Operation,
    /// Namespace the operation was found in; `None` at client level.
    pub namespace: Option<&'a str>,
}

/// Immutable catalog of client-level operations and ordered namespaces.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySurface {
    client_operations: IndexMap<String, Operation>,
    namespaces: Vec<Namespace>,
}

impl CapabilitySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_operation(mut self, operation: Operation) -> Self {
        self.client_operations.insert(operation.name.clone(), operation);
        self
    }

    /// Appends a namespace. Declaration order is the lookup order.
    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespaces.push(namespace);
        self
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    pub fn client_operations(&self) -> impl Iterator<Item = &Operation> {
        self.client_operations.values()
    }

    /// Every operation, client-level first, then namespaces in order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.client_operations
            .values()
            .chain(self.namespaces.iter().flat_map(|namespace| namespace.operations()))
    }

    /// Finds the operation with the exact (already normalized) `name`.
    ///
    /// [`WAIT_FOR_REQUEST`] is only looked up among client operations. Every
    /// other name is searched across API-bearing namespaces in declaration
    /// order and the first match wins. A namespace name that appears twice is
    /// only searched the first time.
    ///
    /// # Example
    /// ```rust
    /// use opcall_registry::{CapabilitySurface, Namespace, Operation, Returns};
    ///
    /// let surface = CapabilitySurface::new().with_namespace(
    ///     Namespace::new("LocationsApi").with_operation(Operation::direct("LocationsGet", vec![], |_, _| Returns::metadata_only(None, None))),
    /// );
    /// let located = surface.locate("LocationsGet").expect("found");
    /// assert_eq!(located.namespace, Some("LocationsApi"));
    /// assert!(surface.locate("ServersGet").is_none());
    /// ```
    pub fn locate(&self, name: &str) -> Option<Located<'_>> {
        if name == WAIT_FOR_REQUEST {
            return self.client_operations.get(name).map(|operation| Located {
                operation,
                namespace: None,
            });
        }

        let mut searched: HashSet<&str> = HashSet::new();
        for namespace in &self.namespaces {
            if !namespace.api_bearing || !searched.insert(namespace.name.as_str()) {
                continue;
            }
            if let Some(operation) = namespace.operation(name) {
                debug!(operation = name, namespace = %namespace.name, "located operation");
                return Some(Located {
                    operation,
                    namespace: Some(namespace.name.as_str()),
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;

    fn direct(name: &str) -> Operation {
        Operation::direct(name, vec![], |_, _| Returns::metadata_only(None, None))
    }

    #[test]
    fn first_declared_namespace_wins() {
        let surface = CapabilitySurface::new()
            .with_namespace(Namespace::new("DataCentersApi").with_operation(direct("DatacentersGet")))
            .with_namespace(Namespace::new("LegacyApi").with_operation(direct("DatacentersGet")));
        let located = surface.locate("DatacentersGet").expect("located");
        assert_eq!(located.namespace, Some("DataCentersApi"));
        assert_eq!(located.operation.qualified_name(), "DataCentersApi.DatacentersGet");
    }

    #[test]
    fn skips_namespaces_without_api() {
        let surface = CapabilitySurface::new()
            .with_namespace(Namespace::new("Configuration").api_bearing(false).with_operation(direct("ServersGet")))
            .with_namespace(Namespace::new("ServersApi").with_operation(direct("ServersGet")));
        assert_eq!(surface.locate("ServersGet").and_then(|located| located.namespace), Some("ServersApi"));
    }

    #[test]
    fn duplicate_namespace_is_searched_once() {
        let surface = CapabilitySurface::new()
            .with_namespace(Namespace::new("ServersApi"))
            .with_namespace(Namespace::new("ServersApi").with_operation(direct("ServersGet")));
        assert!(surface.locate("ServersGet").is_none());
    }

    #[test]
    fn wait_for_request_only_resolves_at_client_level() {
        let namespaced = CapabilitySurface::new().with_namespace(Namespace::new("RequestsApi").with_operation(direct(WAIT_FOR_REQUEST)));
        assert!(namespaced.locate(WAIT_FOR_REQUEST).is_none());

        let client = namespaced.with_client_operation(direct(WAIT_FOR_REQUEST));
        let located = client.locate(WAIT_FOR_REQUEST).expect("client operation");
        assert!(located.namespace.is_none());
        assert!(located.operation.namespace().is_none());
    }

    #[test]
    fn client_operations_are_not_searched_for_other_names() {
        let surface = CapabilitySurface::new().with_client_operation(direct("ApiInfoGet"));
        assert!(surface.locate("ApiInfoGet").is_none());
    }

    #[test]
    fn lookup_is_exact() {
        let surface = CapabilitySurface::new().with_namespace(Namespace::new("DataCentersApi").with_operation(direct("DatacentersGet")));
        assert!(surface.locate("datacentersGet").is_none());
    }

    #[test]
    fn required_count_ignores_trailing_optionals() {
        let operation = Operation::direct(
            "DatacentersServersGet",
            vec![
                ArgDescriptor::required("datacenterId", Shape::string()),
                ArgDescriptor::optional("serverId", Shape::string()),
            ],
            |_, _| Returns::metadata_only(None, None),
        );
        assert_eq!(operation.required_positional_count(), 1);

        let inner_optional = Operation::direct(
            "X",
            vec![ArgDescriptor::optional("a", Shape::string()), ArgDescriptor::required("b", Shape::string())],
            |_, _| Returns::metadata_only(None, None),
        );
        assert_eq!(inner_optional.required_positional_count(), 2);
    }

    #[test]
    fn operations_lists_client_level_first() {
        let surface = CapabilitySurface::new()
            .with_namespace(Namespace::new("LocationsApi").with_operation(direct("LocationsGet")))
            .with_client_operation(direct(WAIT_FOR_REQUEST));
        let names: Vec<String> = surface.operations().map(Operation::qualified_name).collect();
        assert_eq!(names, vec!["WaitForRequest".to_string(), "LocationsApi.LocationsGet".to_string()]);
    }
}
