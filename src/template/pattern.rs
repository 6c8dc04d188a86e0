//! Variable substitution and transform chains: `{var | fn | fn(args)}`

use super::context::vars;
use super::error::{MapError, MapResult};
use super::value::Value;
use crate::functions::call::resolve_call;
use crate::processor::TemplateState;
use regex::Regex;
use std::sync::LazyLock;

static RE_POOR_URI_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\-]+").unwrap());

/// A piece of a template: literal text or a `{...}` reference body
#[derive(Debug, PartialEq)]
enum Fragment<'t> {
    Text(&'t str),
    Reference(&'t str),
}

/// Split a template into literal text and `{...}` references.
///
/// References do not nest; an unterminated `{` is literal text.
fn fragments(template: &str) -> Vec<Fragment<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        if open > 0 {
            out.push(Fragment::Text(&rest[..open]));
        }
        out.push(Fragment::Reference(&rest[open + 1..open + close]));
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        out.push(Fragment::Text(rest));
    }
    out
}

/// True if the whole template is exactly one `{...}` reference
fn whole_reference(template: &str) -> Option<&str> {
    template
        .strip_prefix('{')
        .and_then(|t| t.strip_suffix('}'))
        .filter(|inner| !inner.contains('}'))
}

/// Expand `{...}` references in a template.
///
/// A template that is exactly one reference yields that reference's value,
/// which may be typed or a list. Otherwise each reference is rendered into
/// the surrounding text; a reference with no value is kept verbatim.
pub fn pattern_expand(template: &str, state: &mut TemplateState<'_>) -> MapResult<Value> {
    if let Some(inner) = whole_reference(template) {
        return valueof_var(inner, state);
    }

    let mut out = String::with_capacity(template.len());
    for fragment in fragments(template) {
        match fragment {
            Fragment::Text(text) => out.push_str(text),
            Fragment::Reference(reference) => match valueof_var(reference, state) {
                Ok(value) if !value.render().is_empty() => out.push_str(&value.render()),
                Ok(_) => push_verbatim(&mut out, reference),
                Err(e) if e.is_missing_value() => push_verbatim(&mut out, reference),
                Err(e) => return Err(e),
            },
        }
    }
    Ok(Value::Str(out))
}

fn push_verbatim(out: &mut String, reference: &str) {
    out.push('{');
    out.push_str(reference);
    out.push('}');
}

/// Evaluate `name | fn1 | fn2(args)`.
///
/// Functions apply left to right; a list value has each function applied
/// element-wise with `$listIndex` bound. A null or empty final value is a
/// [`MapError::MissingValue`].
pub fn valueof_var(reference: &str, state: &mut TemplateState<'_>) -> MapResult<Value> {
    let mut parts = split_pipes(reference).into_iter();
    let name = parts.next().unwrap_or_default();

    let mut value = state.lookup(name).trimmed();
    for call_text in parts {
        let call = resolve_call(call_text, state)?;
        value = match value {
            Value::List(items) => {
                let mut mapped = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    let mut element = state.child([(vars::LIST_INDEX, Value::Int(i as i64))]);
                    mapped.push(call.invoke(item, &mut element)?);
                }
                Value::List(mapped)
            }
            single => call.invoke(single, state)?,
        };
    }

    if value.is_empty() {
        return Err(MapError::MissingValue(name.to_string()));
    }
    Ok(value)
}

/// Split on `|` outside quotes and brackets, trimming each part
fn split_pipes(reference: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in reference.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(ch),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.saturating_sub(1),
            (None, '|') if depth == 0 => {
                parts.push(reference[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(reference[start..].trim());
    parts
}

/// Make a string safe for use as a URI path segment
pub fn normalize(s: &str) -> String {
    let replaced = RE_POOR_URI_CHARS.replace_all(s.trim(), "_");
    let norm: &str = &replaced;
    let norm = norm.strip_suffix('_').unwrap_or(norm);
    norm.strip_prefix('_').unwrap_or(norm).to_string()
}
