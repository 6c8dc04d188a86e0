//! Applying a resource template: filter, graph, identity, type, properties

use super::state::{DeclarationKind, TemplateState};
use crate::graph::{vocab, Literal, Statement, Term};
use crate::spec::{PropSpec, PropTemplate, ResourceSpec, RowFilter};
use crate::template::{uri_expand, value_expand, vars, Expansion, MapError, MapResult, Value};

/// Default identity pattern when a template declares no `@id`
const ROW_ID: &str = "<row>";
/// `@id` marker for an anonymous node
const BLANK_ID: &str = "<_>";

/// Keys handled before the property loop
fn is_structural(key: &str) -> bool {
    matches!(key, "@id" | "@type" | "@graph" | "@graphAdd")
}

// ---------------------------------------------------------------------------
// Row filters
// ---------------------------------------------------------------------------

fn describe(value: &Option<Value>) -> String {
    match value {
        None | Some(Value::Null) => "absent".to_string(),
        Some(v) => format!("'{}'", v.render()),
    }
}

fn is_member(value: &Value, candidates: &[Value]) -> bool {
    candidates.iter().any(|c| value.matches(c))
}

/// Reason to skip the resource because of a `requires` entry, if any
fn requires_mismatch(filter: &RowFilter, state: &TemplateState<'_>) -> Option<String> {
    for (key, expected) in filter {
        let value = state.get(key);
        let present = value.as_ref().filter(|v| !v.is_null());
        match (expected, present) {
            (Value::Null, _) => {
                if value.as_ref().map_or(true, Value::is_empty) {
                    return Some(format!("there is no value for {}", key));
                }
            }
            (_, None) => return Some(format!("there is no value for {}", key)),
            (Value::List(allowed), Some(v)) => {
                if !is_member(v, allowed) {
                    return Some(format!(
                        "value for {} is {}, which is not one of the required values",
                        key,
                        describe(&value)
                    ));
                }
            }
            (expected, Some(v)) => {
                if !v.matches(expected) {
                    return Some(format!(
                        "value for {} is {}, which is different from the required value '{}'",
                        key,
                        describe(&value),
                        expected.render()
                    ));
                }
            }
        }
    }
    None
}

/// Reason to skip the resource because of an `unless` entry, if any
fn unless_match(filter: &RowFilter, state: &TemplateState<'_>) -> Option<String> {
    for (key, forbidden) in filter {
        let Some(value) = state.get(key).filter(|v| !v.is_null()) else {
            continue;
        };
        let skip = match forbidden {
            Value::Null => !value.is_empty(),
            Value::List(values) => is_member(&value, values),
            other => value.matches(other),
        };
        if skip {
            return Some(format!("value for {} is '{}'", key, value.render()));
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Resource processing
// ---------------------------------------------------------------------------

/// Apply a resource template in the given context.
///
/// Returns the resource identifier, or `None` if a filter skipped it.
/// Failures while expanding a single property are logged and the property
/// is dropped; identity and type failures are returned.
pub fn process_resource_spec(
    name: &str,
    rs: &ResourceSpec,
    state: &mut TemplateState<'_>,
) -> MapResult<Option<Term>> {
    let mut state = state.child([(vars::RESOURCE_ID, Value::str(name))]);
    let row = state.lookup(vars::ROW).render();

    if let Some(reason) = rs.requires.as_ref().and_then(|f| requires_mismatch(f, &state)) {
        tracing::warn!(resource = %rs.name, row = %row, "skipping resource because {}", reason);
        return Ok(None);
    }
    if let Some(reason) = rs.unless.as_ref().and_then(|f| unless_match(f, &state)) {
        tracing::warn!(resource = %rs.name, row = %row, "skipping resource because {}", reason);
        return Ok(None);
    }

    if let Some(graph) = &rs.graph {
        let graph = uri_expand(graph, &mut state)?;
        state.switch_graph(graph, rs.preserve_graph);
    }

    let id_template = match rs.find_property_definition("@id") {
        None => ROW_ID,
        Some(PropTemplate::Pattern(p)) => p.as_str(),
        Some(_) => return Err(MapError::UnsupportedTemplate(format!("{}.@id", name))),
    };
    let subject = if id_template == BLANK_ID {
        state.run.next_blank()
    } else {
        Term::Iri(uri_expand(id_template, &mut state)?)
    };
    state.run.record_backlink(name, subject.clone());

    match rs.find_property_definition("@type") {
        Some(PropTemplate::Pattern(p)) => {
            let class = uri_expand(p, &mut state)?;
            state.add(Statement::new(subject.clone(), Term::iri(vocab::RDF_TYPE), Term::Iri(class)));
        }
        Some(_) => return Err(MapError::UnsupportedTemplate(format!("{}.@type", name))),
        None if state.spec().auto_declare() => {
            let class = format!("{}/def/{}", state.dataset_base(), name);
            declare_class(name, &class, rs.comment.as_deref(), &mut state);
            state.add(Statement::new(subject.clone(), Term::iri(vocab::RDF_TYPE), Term::Iri(class)));
        }
        None => {}
    }

    let mut state = state.child([(vars::PARENT_ID, Value::str(subject.as_str()))]);
    for (key, template) in &rs.properties {
        if let Err(e) = process_property_value(&subject, key, template, &mut state) {
            tracing::warn!(
                resource = %rs.name,
                property = %key,
                row = %row,
                error = %e,
                "skipping property"
            );
        }
    }
    Ok(Some(subject))
}

/// Expand one (key, template) pair of a resource and emit its statements
pub fn process_property_value(
    subject: &Term,
    key: &str,
    template: &PropTemplate,
    state: &mut TemplateState<'_>,
) -> MapResult<()> {
    if is_structural(key) {
        return Ok(());
    }

    if let PropTemplate::List(items) = template {
        for item in items {
            if let Err(e) = process_property_value(subject, key, item, state) {
                tracing::warn!(
                    property = %key,
                    row = %state.lookup(vars::ROW).render(),
                    error = %e,
                    "skipping list item"
                );
            }
        }
        return Ok(());
    }

    let (inverse, key) = match key.strip_prefix('^') {
        Some(k) => (true, k),
        None => (false, key),
    };

    let prop_spec = match key.strip_prefix(':') {
        Some(spec_name) => Some(
            state
                .spec()
                .property_specs
                .get(spec_name)
                .ok_or_else(|| MapError::UnknownPropertySpec(spec_name.to_string()))?,
        ),
        None => None,
    };

    let (prop, template) = match (prop_spec, template) {
        (Some(ps), PropTemplate::Pattern(p)) => {
            let pattern = if p.is_empty() { format!("{{{}}}", ps.name) } else { p.clone() };
            let (prop, pattern) = ps.prop_value_template(&pattern);
            (prop, PropTemplate::Pattern(pattern))
        }
        (Some(ps), other) => (ps.prop.clone(), other.clone()),
        (None, other) => (key.to_string(), other.clone()),
    };

    if let Some(class) = prop_spec.and_then(|ps| ps.class.as_deref()) {
        let class = uri_expand(class, state)?;
        state.add(Statement::new(subject.clone(), Term::iri(vocab::RDF_TYPE), Term::Iri(class)));
    }

    let predicate = uri_expand(&prop, state)?;
    let prop_name = match prop_spec {
        Some(ps) => {
            if state.spec().auto_declare() {
                declare_property(&ps.name, &predicate, ps.comment.as_deref(), state);
            }
            ps.name.clone()
        }
        None => prop.clone(),
    };

    let expansion = match &template {
        PropTemplate::Pattern(p) => {
            let pattern = if p.is_empty() { format!("{{{}}}", prop) } else { p.clone() };
            let mut value_state = state.child([(vars::PROP, Value::str(prop_name))]);
            match value_expand(&pattern, &mut value_state) {
                Err(e) if e.is_missing_value() => {
                    if is_required(prop_spec) {
                        return Err(required_error(prop_spec, &pattern));
                    }
                    tracing::debug!(property = %key, error = %e, "no value, property omitted");
                    return Ok(());
                }
                other => other?,
            }
        }
        PropTemplate::Nested(rs) => Expansion::from(process_resource_spec(&rs.name, rs, state)?),
        PropTemplate::Unsupported(_) | PropTemplate::List(_) => {
            return Err(MapError::UnsupportedTemplate(key.to_string()))
        }
    };

    let terms = expansion.into_terms();
    if terms.is_empty() {
        if is_required(prop_spec) {
            let pattern = template.as_pattern().unwrap_or_default();
            return Err(required_error(prop_spec, pattern));
        }
        return Ok(());
    }

    let predicate = Term::Iri(predicate);
    for object in terms {
        let statement = if inverse {
            if object.is_literal() {
                return Err(MapError::InvalidStatement(format!(
                    "literal {} cannot be the subject of inverse property {}",
                    object, predicate
                )));
            }
            Statement::new(object, predicate.clone(), subject.clone())
        } else {
            Statement::new(subject.clone(), predicate.clone(), object)
        };
        state.add(statement);
    }
    Ok(())
}

fn is_required(prop_spec: Option<&PropSpec>) -> bool {
    prop_spec.is_some_and(|ps| ps.required)
}

fn required_error(prop_spec: Option<&PropSpec>, pattern: &str) -> MapError {
    MapError::RequiredValue {
        name: prop_spec.map(|ps| ps.name.clone()).unwrap_or_default(),
        pattern: pattern.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Implicit declarations
// ---------------------------------------------------------------------------

fn declare(
    kind: DeclarationKind,
    name: &str,
    id: &str,
    comment: Option<&str>,
    state: &mut TemplateState<'_>,
) {
    if !state.run.mark_declared(kind, name) {
        return;
    }
    let class = match kind {
        DeclarationKind::Class => vocab::OWL_CLASS,
        DeclarationKind::Property => vocab::RDF_PROPERTY,
    };
    let subject = Term::iri(id);
    state.add(Statement::new(subject.clone(), Term::iri(vocab::RDF_TYPE), Term::iri(class)));
    state.add(Statement::new(
        subject.clone(),
        Term::iri(vocab::RDFS_LABEL),
        Literal::plain(name).into(),
    ));
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        state.add(Statement::new(
            subject,
            Term::iri(vocab::RDFS_COMMENT),
            Literal::plain(comment).into(),
        ));
    }
}

/// Emit the implicit class declaration for a resource name, once per run
pub(crate) fn declare_class(name: &str, id: &str, comment: Option<&str>, state: &mut TemplateState<'_>) {
    declare(DeclarationKind::Class, name, id, comment, state);
}

/// Emit the implicit property declaration for a property name, once per run
pub(crate) fn declare_property(
    name: &str,
    id: &str,
    comment: Option<&str>,
    state: &mut TemplateState<'_>,
) {
    declare(DeclarationKind::Property, name, id, comment, state);
}
