//! Table lookups and embedded templates: `mapBy` and `mapTo`

use super::{arg_text, FunctionRegistry};
use crate::processor::resource::process_resource_spec;
use crate::processor::TemplateState;
use crate::template::{value_expand, Expansion, MapError, MapResult, Value};

/// Look the value up in a named mapping table and value-expand the entry
fn map_by(value: Value, state: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    if value.is_empty() {
        return Ok(Value::Null);
    }
    let key = match &value {
        Value::List(_) | Value::Map(_) => {
            return Err(MapError::transform(
                "mapBy",
                format!("can only map scalar values, found {:?}", value),
            ))
        }
        other => other.render(),
    };
    let mapping_name =
        arg_text(args, 0).ok_or_else(|| MapError::transform("mapBy", "missing mapping name"))?;

    let spec = state.spec();
    let table = spec
        .mappings
        .get(&mapping_name)
        .ok_or_else(|| MapError::UnknownMapping(mapping_name.clone()))?;
    let template = table.get(&key).ok_or_else(|| MapError::UnmappedValue {
        mapping: mapping_name.clone(),
        value: key.clone(),
    })?;

    match value_expand(template, state)? {
        Expansion::Absent => Err(MapError::MissingValue(template.clone())),
        Expansion::One(term) => Ok(term.into()),
        Expansion::Many(terms) => {
            if terms.len() > 1 {
                tracing::warn!(
                    mapping = %mapping_name,
                    value = %key,
                    "mapping produced several values, using the first"
                );
            }
            terms
                .into_iter()
                .next()
                .map(Value::from)
                .ok_or_else(|| MapError::MissingValue(template.clone()))
        }
    }
}

/// Apply a named embedded template to a nested map value
fn map_to(value: Value, state: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    if value.is_empty() {
        return Ok(Value::Null);
    }
    let Value::Map(bindings) = value else {
        return Err(MapError::transform(
            "mapTo",
            format!("can only map nested records, found {:?}", value),
        ));
    };
    let template_name = arg_text(args, 0)
        .ok_or_else(|| MapError::transform("mapTo", "missing embedded template name"))?;
    let spec = state.spec();
    let rs = spec
        .embedded
        .get(&template_name)
        .ok_or(MapError::UnknownEmbedded(template_name))?;

    let mut nested = state.child(bindings);
    Ok(process_resource_spec(&rs.name, rs, &mut nested)?.into())
}

pub(super) fn install(registry: &mut FunctionRegistry) {
    registry.register("mapBy", map_by);
    registry.register("map_by", map_by);
    registry.register("mapTo", map_to);
    registry.register("map_to", map_to);
}
