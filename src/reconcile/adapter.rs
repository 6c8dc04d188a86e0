//! The `reconcile` transform: resolve a key to an external identifier,
//! creating a placeholder resource when the service has no exact match.

use super::{rec, MatchResult, ReconcileError, ReconcileRequest, ReconciliationRecord};
use crate::graph::{vocab, Literal, Statement, Term};
use crate::processor::resource::process_resource_spec;
use crate::processor::TemplateState;
use crate::spec::ResourceSpec;
use crate::template::{expand_curie, vars, MapError, MapResult, Value};

/// Arguments of a `reconcile(...)` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileCall {
    /// Resource name for placeholders
    pub name: String,
    pub target_type: Option<String>,
    /// Endpoint, falling back to `$reconciliationAPI`
    pub endpoint: Option<String>,
    pub filters: Vec<(String, String)>,
    /// Fail instead of creating a placeholder when nothing matches
    pub skip_placeholders: bool,
}

fn placeholder_template(name: &str) -> ResourceSpec {
    ResourceSpec::new(
        name,
        [
            ("@id", "<hash(key,keytype)>"),
            ("@type", "<{keytype}>"),
            ("<skos:prefLabel>", "{key}"),
        ],
    )
}

/// Resolve `key` through the reconciliation service, once per (key, type) per run
pub fn reconcile(key: &str, call: &ReconcileCall, state: &mut TemplateState<'_>) -> MapResult<Term> {
    if let Some(record) = state.run.reconciled(key, call.target_type.as_deref()) {
        return Ok(record.id.clone());
    }

    let endpoint = call
        .endpoint
        .clone()
        .filter(|e| !e.is_empty())
        .or_else(|| state.get(vars::RECONCILIATION_API).and_then(|v| v.as_text()))
        .filter(|e| !e.is_empty())
        .ok_or(ReconcileError::MissingEndpoint)?;

    let spec = state.spec();
    let target_type = call.target_type.as_deref().map(|t| expand_curie(t, spec));
    let mut request = ReconcileRequest::new(key);
    request.target_type = target_type.clone();
    request.filters = call
        .filters
        .iter()
        .map(|(p, v)| (expand_curie(p, spec), expand_curie(v, spec)))
        .collect();

    let mut results = state
        .env
        .reconciler
        .reconcile(&endpoint, std::slice::from_ref(&request))?;
    if results.len() != 1 {
        return Err(ReconcileError::ResultCount {
            expected: 1,
            actual: results.len(),
        }
        .into());
    }
    let result = results.remove(0);
    let key_desc = match &target_type {
        Some(t) => format!("{}-{}", key, t),
        None => key.to_string(),
    };

    let id = match &result.matched {
        Some(entry) => {
            tracing::info!(key = %key_desc, result = %result, "reconciled");
            Term::iri(entry.id.clone())
        }
        None => {
            tracing::error!(key = %key_desc, result = %result, "reconciliation failed");
            if call.skip_placeholders {
                return Err(ReconcileError::NoMatch(key_desc).into());
            }
            create_placeholder(key, target_type.as_deref(), call, &result, state)?
        }
    };

    state.run.record_reconciliation(ReconciliationRecord {
        key: key.to_string(),
        target_type: call.target_type.clone(),
        id: id.clone(),
        result,
    });
    Ok(id)
}

/// A proxy resource labelled with the key, carrying the candidate matches
fn create_placeholder(
    key: &str,
    target_type: Option<&str>,
    call: &ReconcileCall,
    result: &MatchResult,
    state: &mut TemplateState<'_>,
) -> MapResult<Term> {
    let keytype = target_type.unwrap_or(vocab::SKOS_CONCEPT).to_string();
    let template = placeholder_template(&call.name);
    let proxy = {
        let mut proxy_state = state.child([
            ("key", Value::str(key)),
            ("keytype", Value::str(keytype)),
        ]);
        process_resource_spec(&template.name, &template, &mut proxy_state)?
    }
    .ok_or_else(|| {
        MapError::InvalidStatement(format!("could not create placeholder for {}", key))
    })?;

    for candidate in &result.candidates {
        let node = state.run.next_blank();
        state.add(Statement::new(
            node.clone(),
            Term::iri(rec::SCORE),
            Literal::typed(candidate.score.to_string(), vocab::XSD_DECIMAL).into(),
        ));
        state.add(Statement::new(
            node.clone(),
            Term::iri(rec::MATCH),
            Term::iri(candidate.id.clone()),
        ));
        state.add(Statement::new(
            node.clone(),
            Term::iri(rec::LABEL),
            Literal::plain(candidate.name.clone().unwrap_or_default()).into(),
        ));
        state.add(Statement::new(proxy.clone(), Term::iri(rec::POSSIBLE_MATCH), node));
    }
    Ok(proxy)
}
