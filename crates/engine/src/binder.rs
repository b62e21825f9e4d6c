//! Positional parameter binding.

use opcall_registry::{Operation, TypedValue};
use opcall_types::Param;
use tracing::debug;

use crate::coerce::coerce;
use crate::errors::DispatchError;

/// Binds `params` onto the positional arguments of `operation`.
///
/// Parameter `i` binds to argument `i`. A `null` value binds the argument's
/// zero value and still counts as consumed. Parameters beyond the declared
/// arguments stay unprocessed and are left for builder replay. Binding stops at
/// the first coercion failure; parameters bound before it keep their
/// `processed` flag.
///
/// # Returns
///
/// One value per declared argument. Arguments with no matching parameter take
/// their zero value.
pub fn bind(operation: &Operation, params: &mut [Param]) -> Result<Vec<TypedValue>, DispatchError> {
    let required = operation.required_positional_count();
    if params.len() < required {
        return Err(DispatchError::TooFewParameters {
            operation: operation.name().to_string(),
            found: params.len(),
            expected: required,
        });
    }

    let mut bound = Vec::with_capacity(operation.args().len());
    for (index, argument) in operation.args().iter().enumerate() {
        let Some(param) = params.get_mut(index) else {
            bound.push(argument.zero_value());
            continue;
        };
        let value = if param.is_absent() {
            argument.zero_value()
        } else {
            coerce(&param.value, &argument.shape).map_err(|source| DispatchError::Parameter {
                operation: operation.name().to_string(),
                index,
                source,
            })?
        };
        debug!(operation = operation.name(), index, argument = %argument.name, "bound positional parameter");
        param.processed = true;
        bound.push(value);
    }
    Ok(bound)
}
