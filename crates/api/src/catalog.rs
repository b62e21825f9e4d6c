//! # Operation Catalog
//!
//! A JSON manifest describing the HTTP operations the surface exposes:
//!
//! ```json
//! {
//!   "structs": {"DatacenterProperties": [{"name": "name", "type": "string", "optional": true}]},
//!   "namespaces": [{
//!     "name": "DataCentersApi",
//!     "operations": [{
//!       "name": "DatacentersFindById",
//!       "method": "GET",
//!       "path": "/datacenters/{datacenterId}",
//!       "args": [{"name": "datacenterId", "type": "string", "in": "path"}],
//!       "query": [{"name": "depth", "type": "int32"}],
//!       "headers": [{"name": "X-Contract-Number", "type": "int32"}],
//!       "filters": true,
//!       "returns": "result"
//!     }]
//!   }]
//! }
//! ```
//!
//! Type names are the scalar names (`string`, `bool`, `int32`, `int64`,
//! `float32`, `float64`), `timestamp`, `any`, `[]<type>` for lists, or the
//! name of an entry in `structs`.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use opcall_registry::{ScalarKind, Shape, StructField, StructShape, WAIT_FOR_REQUEST};
use opcall_util::expand_tilde;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a catalog file to load instead of the embedded one.
pub const CATALOG_PATH_ENV: &str = "OPCALL_CATALOG_PATH";

const EMBEDDED_CATALOG: &str = include_str!("../catalog/cloudapi.json");

static PATH_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder regex should compile"));

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{context}: unknown type '{type_name}'")]
    UnknownType { context: String, type_name: String },

    #[error("struct {name} refers to itself")]
    RecursiveStruct { name: String },

    #[error("operation {operation}: invalid HTTP method '{method}'")]
    InvalidMethod { operation: String, method: String },

    #[error("operation {operation}: path placeholder {{{placeholder}}} has no path argument")]
    MissingPathArgument { operation: String, placeholder: String },

    #[error("operation {operation}: path argument {argument} cannot be optional")]
    OptionalPathArgument { operation: String, argument: String },
}

impl CatalogError {
    pub fn unknown_type(context: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::UnknownType {
            context: context.into(),
            type_name: type_name.into(),
        }
    }
}

/// Where the catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Embedded,
    File(PathBuf),
}

impl CatalogSource {
    /// Picks the catalog: an explicit path, then `OPCALL_CATALOG_PATH`, then the embedded one.
    pub fn select(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::File(path.to_path_buf());
        }
        match env::var(CATALOG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::File(expand_tilde(path.trim())),
            _ => Self::Embedded,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    #[serde(default)]
    pub structs: IndexMap<String, Vec<FieldSpec>>,
    #[serde(default)]
    pub namespaces: Vec<NamespaceSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSpec {
    pub name: String,
    #[serde(default = "default_true")]
    pub api_bearing: bool,
    #[serde(default)]
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationSpec {
    pub name: String,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub query: Vec<ParamSpec>,
    #[serde(default)]
    pub headers: Vec<ParamSpec>,
    /// Exposes `Filter(key, value)`, sent as `filter.<key>=<value>`.
    #[serde(default)]
    pub filters: bool,
    #[serde(default)]
    pub returns: ReturnsKind,
}

/// Positional argument declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, rename = "in")]
    pub location: ArgLocation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgLocation {
    #[default]
    Path,
    Body,
    Query,
}

/// Named query or header parameter, exposed as a builder method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSpec {
    /// Wire name; the builder method is its UpperCamelCase form.
    pub name: String,
    #[serde(rename = "type", default = "default_type")]
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub optional: bool,
}

/// Which execute tuple an operation returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnsKind {
    /// `(result, metadata, error)`
    #[default]
    Result,
    /// `(metadata, error)`
    Metadata,
}

fn default_true() -> bool {
    true
}

fn default_type() -> String {
    ScalarKind::String.as_str().to_string()
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn embedded() -> Result<Self, CatalogError> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(source: &CatalogSource) -> Result<Self, CatalogError> {
        match source {
            CatalogSource::Embedded => Self::embedded(),
            CatalogSource::File(path) => {
                debug!(path = %path.display(), "loading catalog file");
                let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
                    path: path.clone(),
                    source,
                })?;
                Self::from_json(&text)
            }
        }
    }

    /// `Namespace.Operation` for every API-bearing operation, plus the client-level wait operation.
    pub fn operation_names(&self) -> Vec<String> {
        let mut names = vec![WAIT_FOR_REQUEST.to_string()];
        for namespace in self.namespaces.iter().filter(|namespace| namespace.api_bearing) {
            names.extend(namespace.operations.iter().map(|operation| format!("{}.{}", namespace.name, operation.name)));
        }
        names
    }
}

/// Placeholder names in a path template, in order of appearance.
pub fn path_placeholders(path: &str) -> Vec<String> {
    PATH_PLACEHOLDER
        .captures_iter(path)
        .filter_map(|captures| captures.get(1).map(|name| name.as_str().to_string()))
        .collect()
}

/// Resolves catalog type names into shapes, sharing each struct shape.
pub struct ShapeResolver<'a> {
    structs: &'a IndexMap<String, Vec<FieldSpec>>,
    resolved: HashMap<String, Arc<StructShape>>,
    in_progress: Vec<String>,
}

impl<'a> ShapeResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            structs: &catalog.structs,
            resolved: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Resolves `type_name`; `context` names the declaration for error messages.
    pub fn resolve(&mut self, type_name: &str, context: &str) -> Result<Shape, CatalogError> {
        let type_name = type_name.trim();
        if let Some(element) = type_name.strip_prefix("[]") {
            return Ok(Shape::list(self.resolve(element, context)?));
        }
        match type_name {
            "timestamp" => return Ok(Shape::Timestamp),
            "any" => return Ok(Shape::Any),
            _ => {}
        }
        if let Some(kind) = ScalarKind::parse(type_name) {
            return Ok(Shape::Scalar(kind));
        }
        self.resolve_struct(type_name, context).map(Shape::Struct)
    }

    fn resolve_struct(&mut self, name: &str, context: &str) -> Result<Arc<StructShape>, CatalogError> {
        if let Some(shape) = self.resolved.get(name) {
            return Ok(Arc::clone(shape));
        }
        let structs = self.structs;
        let Some(field_specs) = structs.get(name) else {
            return Err(CatalogError::unknown_type(context, name));
        };
        if self.in_progress.iter().any(|pending| pending == name) {
            return Err(CatalogError::RecursiveStruct { name: name.to_string() });
        }

        self.in_progress.push(name.to_string());
        let fields = self.resolve_fields(name, field_specs);
        self.in_progress.pop();

        let shape = Arc::new(StructShape::new(name, fields?));
        self.resolved.insert(name.to_string(), Arc::clone(&shape));
        Ok(shape)
    }

    fn resolve_fields(&mut self, name: &str, field_specs: &[FieldSpec]) -> Result<Vec<StructField>, CatalogError> {
        field_specs
            .iter()
            .map(|spec| {
                let shape = self.resolve(&spec.type_name, &format!("struct {name}, field {}", spec.name))?;
                Ok(if spec.optional {
                    StructField::optional(&spec.name, shape)
                } else {
                    StructField::required(&spec.name, shape)
                })
            })
            .collect()
    }
}
