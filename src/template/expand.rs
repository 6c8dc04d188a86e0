//! Value templates: from a pattern to zero, one, or many graph terms

use super::error::{MapError, MapResult};
use super::pattern::pattern_expand;
use super::uri::uri_expand;
use super::value::Value;
use crate::graph::{Literal, Term};
use crate::processor::TemplateState;
use regex::Regex;
use std::sync::LazyLock;

static RE_LANG_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)@([\w\-]+)$").unwrap());
static RE_TYPED_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)\^\^(<[^>]+>)$").unwrap());

/// Result of expanding a value template
#[derive(Debug, Clone, PartialEq)]
pub enum Expansion {
    /// No value, e.g. a backlink to a resource never produced
    Absent,
    One(Term),
    Many(Vec<Term>),
}

impl Expansion {
    pub fn is_absent(&self) -> bool {
        matches!(self, Expansion::Absent)
    }

    /// All terms, in order
    pub fn into_terms(self) -> Vec<Term> {
        match self {
            Expansion::Absent => Vec::new(),
            Expansion::One(t) => vec![t],
            Expansion::Many(ts) => ts,
        }
    }
}

impl From<Option<Term>> for Expansion {
    fn from(t: Option<Term>) -> Self {
        t.map(Expansion::One).unwrap_or(Expansion::Absent)
    }
}

/// Expand a value template.
///
/// `<...>` patterns (other than `lexical^^<datatype>`) are object references:
/// `<::name>` is the last identifier produced for resource `name`, anything
/// else goes through [`uri_expand`]. Other patterns are pattern-expanded and
/// converted to terms.
pub fn value_expand(pattern: &str, state: &mut TemplateState<'_>) -> MapResult<Expansion> {
    if pattern.starts_with('<') && pattern.ends_with('>') && !RE_TYPED_LITERAL.is_match(pattern) {
        if let Some(name) = pattern.strip_prefix("<::").and_then(|p| p.strip_suffix('>')) {
            return Ok(state.run.backlink(name).cloned().into());
        }
        return Ok(Expansion::One(Term::Iri(uri_expand(pattern, state)?)));
    }

    let value = pattern_expand(pattern, state)?;
    value_to_terms(value, state)
}

/// Convert a resolved value to terms; list elements that are null are dropped
pub fn value_to_terms(value: Value, state: &mut TemplateState<'_>) -> MapResult<Expansion> {
    match value {
        Value::List(items) => {
            let mut terms = Vec::with_capacity(items.len());
            for item in items {
                terms.extend(value_to_terms(item, state)?.into_terms());
            }
            Ok(Expansion::Many(terms))
        }
        other => Ok(value_to_term(other, state)?.into()),
    }
}

fn value_to_term(value: Value, state: &mut TemplateState<'_>) -> MapResult<Option<Term>> {
    Ok(Some(match value {
        Value::Null => return Ok(None),
        Value::Term(t) => t,
        Value::Str(s) => string_to_term(&s, state)?,
        Value::Int(i) => Literal::integer(i).into(),
        Value::Float(f) => Literal::double(f).into(),
        Value::Bool(b) => Literal::boolean(b).into(),
        Value::Map(_) => {
            return Err(MapError::InvalidStatement(
                "a map cannot be used as a statement value".to_string(),
            ))
        }
        Value::List(_) => {
            return Err(MapError::InvalidStatement(
                "nested lists cannot be used as statement values".to_string(),
            ))
        }
    }))
}

/// `text@lang` and `text^^<datatype>` forms, otherwise a plain literal
fn string_to_term(s: &str, state: &mut TemplateState<'_>) -> MapResult<Term> {
    if let Some(caps) = RE_LANG_STRING.captures(s) {
        return Ok(Literal::lang(&caps[1], &caps[2]).into());
    }
    if let Some(caps) = RE_TYPED_LITERAL.captures(s) {
        let datatype = uri_expand(&caps[2], state)?;
        return Ok(Literal::typed(&caps[1], datatype).into());
    }
    Ok(Literal::plain(s).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::vocab;
    use crate::processor::testing::Harness;

    #[test]
    fn language_and_datatype_suffixes() {
        let mut h = Harness::new("{}");
        let mut state = h.state([("name", Value::str("Health and Safety Executive"))]);
        assert_eq!(
            value_expand("{name}@en", &mut state).unwrap(),
            Expansion::One(Literal::lang("Health and Safety Executive", "en").into())
        );
        assert_eq!(
            value_expand("42^^<xsd:integer>", &mut state).unwrap(),
            Expansion::One(Literal::typed("42", vocab::XSD_INTEGER).into())
        );
        assert_eq!(
            value_expand("someone@example.com", &mut state).unwrap(),
            Expansion::One(Literal::plain("someone@example.com").into())
        );
    }

    #[test]
    fn typed_values_pass_through() {
        let mut h = Harness::new("{}");
        let mut state = h.state([("id", Value::str("123"))]);
        assert_eq!(
            value_expand("{id | asInt}", &mut state).unwrap(),
            Expansion::One(Literal::integer(123).into())
        );
    }

    #[test]
    fn lists_expand_to_many() {
        let mut h = Harness::new("{}");
        let mut state = h.state([("tags", Value::str("a,b"))]);
        assert_eq!(
            value_expand("{tags | splitComma}", &mut state).unwrap(),
            Expansion::Many(vec![Literal::plain("a").into(), Literal::plain("b").into()])
        );
    }

    #[test]
    fn backlinks_resolve_or_are_absent() {
        let mut h = Harness::new("{}");
        h.run.record_backlink("registration", Term::iri("http://example.com/1"));
        let mut state = h.state(Vec::<(String, Value)>::new());
        assert_eq!(
            value_expand("<::registration>", &mut state).unwrap(),
            Expansion::One(Term::iri("http://example.com/1"))
        );
        assert!(value_expand("<::never>", &mut state).unwrap().is_absent());
    }

    #[test]
    fn maps_are_not_statement_values() {
        let mut h = Harness::new("{}");
        let mut state = h.state(Vec::<(String, Value)>::new());
        assert!(value_to_terms(Value::Map(Default::default()), &mut state).is_err());
    }
}
