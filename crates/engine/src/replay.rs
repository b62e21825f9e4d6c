//! Builder replay for parameters not consumed positionally.
//!
//! Each unprocessed parameter maps to a builder method named after the
//! parameter with its first letter capitalized (`depth` -> `Depth`). The
//! `filters` parameter is special: its mapping value expands into one
//! `Filter(key, value)` call per entry, in the order the entries were sent.

use opcall_registry::{BuilderSignature, ConfigurableRequest, TypedValue};
use opcall_types::Param;
use serde_json::Value;
use tracing::debug;

use crate::coerce::coerce;
use crate::errors::DispatchError;

/// Parameter whose mapping value expands into repeated [`FILTER_METHOD`] calls.
pub const FILTERS_PARAM: &str = "filters";

/// Two-argument builder method that receives each filter entry.
pub const FILTER_METHOD: &str = "Filter";

/// Capitalizes the first character of `name`, leaving the rest untouched.
///
/// # Examples
///
/// ```rust
/// use opcall_engine::replay::builder_method_name;
///
/// assert_eq!(builder_method_name("depth"), "Depth");
/// assert_eq!(builder_method_name("xContractNumber"), "XContractNumber");
/// assert_eq!(builder_method_name(""), "");
/// ```
pub fn builder_method_name(name: &str) -> String {
    let mut characters = name.chars();
    match characters.next() {
        Some(first) => first.to_uppercase().chain(characters).collect(),
        None => String::new(),
    }
}

/// Applies every unprocessed parameter to `request` and returns the final request.
///
/// Each builder call consumes the working request and the returned request
/// becomes the new one. Fails on the first parameter that has no builder
/// method, a malformed `filters` value, or a value that does not coerce.
pub fn replay(
    operation: &str,
    mut request: Box<dyn ConfigurableRequest>,
    params: &mut [Param],
) -> Result<Box<dyn ConfigurableRequest>, DispatchError> {
    for param in params.iter_mut().filter(|param| !param.processed) {
        request = if param.name == FILTERS_PARAM {
            apply_filters(operation, request, param)?
        } else {
            apply_builder(operation, request, param)?
        };
    }

    if let Some(leftover) = params.iter().find(|param| !param.processed) {
        return Err(DispatchError::unknown_parameter(operation, &leftover.name));
    }
    Ok(request)
}

fn apply_builder(
    operation: &str,
    request: Box<dyn ConfigurableRequest>,
    param: &mut Param,
) -> Result<Box<dyn ConfigurableRequest>, DispatchError> {
    let method = builder_method_name(&param.name);
    let Some(signature) = request.builder(&method).cloned() else {
        return Err(DispatchError::unknown_parameter(operation, &param.name));
    };
    if param.is_absent() {
        param.processed = true;
        return Ok(request);
    }
    let [shape] = signature.params.as_slice() else {
        return Err(DispatchError::malformed(
            operation,
            format!("builder {method} takes {} arguments, expected 1", signature.arity()),
        ));
    };
    let argument = coerce(&param.value, shape).map_err(|source| DispatchError::BuilderArgument {
        operation: operation.to_string(),
        method: method.clone(),
        source,
    })?;

    debug!(operation, method = %method, "applying builder method");
    let request = request.configure(&method, vec![argument])?;
    param.processed = true;
    Ok(request)
}

fn apply_filters(
    operation: &str,
    mut request: Box<dyn ConfigurableRequest>,
    param: &mut Param,
) -> Result<Box<dyn ConfigurableRequest>, DispatchError> {
    let signature = request
        .builder(FILTER_METHOD)
        .filter(|signature| is_filter_signature(signature))
        .cloned()
        .ok_or_else(|| DispatchError::NoFilterMethod {
            operation: operation.to_string(),
        })?;
    let Value::Object(entries) = &param.value else {
        return Err(DispatchError::InvalidFilterParameter {
            operation: operation.to_string(),
        });
    };

    for (key, value) in entries {
        let filter_value = coerce(value, &signature.params[1]).map_err(|source| DispatchError::BuilderArgument {
            operation: operation.to_string(),
            method: format!("{FILTER_METHOD}({key})"),
            source,
        })?;
        debug!(operation, filter = %key, "applying filter");
        request = request.configure(FILTER_METHOD, vec![TypedValue::String(key.clone()), filter_value])?;
    }
    param.processed = true;
    Ok(request)
}

fn is_filter_signature(signature: &BuilderSignature) -> bool {
    signature.arity() == 2 && signature.params.iter().all(|shape| shape.is_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingRequest, recorded};
    use opcall_registry::{Returns, Shape};
    use serde_json::json;

    fn builders() -> Vec<BuilderSignature> {
        vec![
            BuilderSignature::new("Depth", vec![Shape::int32()]),
            BuilderSignature::new("Pretty", vec![Shape::bool()]),
            BuilderSignature::new(FILTER_METHOD, vec![Shape::string(), Shape::string()]),
            BuilderSignature::new("Broken", vec![]),
        ]
    }

    fn request(builders: Vec<BuilderSignature>) -> (Box<dyn ConfigurableRequest>, crate::testing::CallLog) {
        let (request, calls) = RecordingRequest::new(builders, Returns::metadata_only(None, None));
        (request as Box<dyn ConfigurableRequest>, calls)
    }

    #[test]
    fn replays_named_params_through_capitalized_builders() {
        let (working, calls) = request(builders());
        let mut params = vec![Param::new("depth", json!(2.9)), Param::new("pretty", json!(false))];
        replay("DatacentersGet", working, &mut params).map(drop).expect("replay");
        assert_eq!(
            recorded(&calls),
            vec![
                ("Depth".to_string(), vec![TypedValue::Int32(2)]),
                ("Pretty".to_string(), vec![TypedValue::Bool(false)])
            ]
        );
        assert!(params.iter().all(|param| param.processed));
    }

    #[test]
    fn skips_params_already_bound() {
        let (working, calls) = request(builders());
        let mut bound = Param::new("datacenterId", json!("dc-1"));
        bound.processed = true;
        let mut params = vec![bound, Param::new("depth", json!(1))];
        replay("DatacentersFindById", working, &mut params).map(drop).expect("replay");
        assert_eq!(recorded(&calls).len(), 1);
    }

    #[test]
    fn null_value_is_a_no_op_configuration() {
        let (working, calls) = request(builders());
        let mut params = vec![Param::new("depth", Value::Null)];
        replay("DatacentersGet", working, &mut params).map(drop).expect("replay");
        assert!(recorded(&calls).is_empty());
        assert!(params[0].processed);
    }

    #[test]
    fn unknown_builder_fails_with_operation_and_param() {
        let (working, _) = request(builders());
        let mut params = vec![Param::new("orderBy", json!("name"))];
        let error = replay("DatacentersGet", working, &mut params).err().expect("unknown parameter");
        assert_eq!(error.to_string(), "operation DatacentersGet: unknown parameter orderBy");
    }

    #[test]
    fn builder_with_wrong_arity_is_malformed() {
        let (working, _) = request(builders());
        let mut params = vec![Param::new("broken", json!(1))];
        let error = replay("DatacentersGet", working, &mut params).err().expect("malformed");
        assert!(matches!(error, DispatchError::MalformedCallContract { .. }));
    }

    #[test]
    fn builder_argument_mismatch_names_the_method() {
        let (working, _) = request(builders());
        let mut params = vec![Param::new("pretty", json!("yes"))];
        let error = replay("DatacentersGet", working, &mut params).err().expect("mismatch");
        assert_eq!(error.to_string(), "operation DatacentersGet: Pretty: needed bool arg but got string");
        assert!(!params[0].processed);
    }

    #[test]
    fn filters_expand_once_per_entry_in_sent_order() {
        let (working, calls) = request(builders());
        let mut params = vec![Param::new(FILTERS_PARAM, json!({"b": "y", "a": "x"}))];
        replay("DatacentersGet", working, &mut params).map(drop).expect("replay");
        assert_eq!(
            recorded(&calls),
            vec![
                (
                    FILTER_METHOD.to_string(),
                    vec![TypedValue::String("b".into()), TypedValue::String("y".into())]
                ),
                (
                    FILTER_METHOD.to_string(),
                    vec![TypedValue::String("a".into()), TypedValue::String("x".into())]
                ),
            ]
        );
        assert!(params[0].processed);
    }

    #[test]
    fn filters_require_a_mapping() {
        let (working, calls) = request(builders());
        let mut params = vec![Param::new(FILTERS_PARAM, json!(["a", "x"]))];
        let error = replay("DatacentersGet", working, &mut params).err().expect("invalid filters");
        assert_eq!(error.to_string(), "no valid value param for filter query param");
        assert!(recorded(&calls).is_empty());
        assert!(!params[0].processed);
    }

    #[test]
    fn filters_require_a_two_string_filter_method() {
        let (working, _) = request(vec![BuilderSignature::new(FILTER_METHOD, vec![Shape::string()])]);
        let mut params = vec![Param::new(FILTERS_PARAM, json!({"a": "x"}))];
        let error = replay("DatacentersGet", working, &mut params).err().expect("no filter method");
        assert!(matches!(error, DispatchError::NoFilterMethod { .. }));
    }

    #[test]
    fn failing_filter_entry_leaves_param_unprocessed() {
        let (working, calls) = request(builders());
        let mut params = vec![Param::new(FILTERS_PARAM, json!({"a": "x", "b": 2}))];
        let error = replay("DatacentersGet", working, &mut params).err().expect("bad entry");
        assert_eq!(error.to_string(), "operation DatacentersGet: Filter(b): needed string arg but got float64");
        assert_eq!(recorded(&calls).len(), 1);
        assert!(!params[0].processed);
    }
}
