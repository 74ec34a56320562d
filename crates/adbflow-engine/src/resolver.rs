//! Variable resolution
//!
//! Turns an authored [`Action`] into a [`ResolvedAction`] by substituting
//! every `{{ name }}` reference with its value for this run.

use adbflow_core::{
    split_template, Action, ActionError, ParamValue, ResolvedAction, TemplatePart,
    VariableValueMap,
};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

/// Resolve all variable references of an action
///
/// Pure: neither `action` nor `values` is touched. Fails with
/// [`ActionError::UnboundVariable`] on the first reference that has no
/// value, so no handler ever sees a partially resolved action.
pub fn resolve(action: &Action, values: &VariableValueMap) -> Result<ResolvedAction, ActionError> {
    let mut parameters = IndexMap::with_capacity(action.parameters.len());

    for (name, raw) in &action.parameters {
        let value = resolve_value(raw, values)?;
        trace!(param = %name, value = %value, "Resolved parameter");
        parameters.insert(name.clone(), value);
    }

    Ok(ResolvedAction::new(action.kind.clone(), parameters))
}

fn resolve_value(raw: &ParamValue, values: &VariableValueMap) -> Result<Value, ActionError> {
    match raw {
        ParamValue::Literal(value) => Ok(value.clone()),
        ParamValue::Variable(name) => lookup(name, values).map(|v| Value::String(v.to_string())),
        ParamValue::Template(template) => {
            let mut out = String::with_capacity(template.len());
            for part in split_template(template) {
                match part {
                    TemplatePart::Text(text) => out.push_str(text),
                    TemplatePart::Var(name) => out.push_str(lookup(name, values)?),
                }
            }
            Ok(Value::String(out))
        }
    }
}

fn lookup<'a>(name: &str, values: &'a VariableValueMap) -> Result<&'a str, ActionError> {
    values
        .get(name)
        .ok_or_else(|| ActionError::UnboundVariable(name.to_string()))
}
