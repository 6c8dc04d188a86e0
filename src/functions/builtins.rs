//! Built-in scalar transforms

use super::{arg_text, expr, input_text, FunctionRegistry};
use crate::graph::{vocab, Literal};
use crate::processor::TemplateState;
use crate::reconcile::adapter::{reconcile, ReconcileCall};
use crate::template::{hash_digest, MapError, MapResult, Value};
use regex::Regex;
use std::sync::LazyLock;

static RE_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").unwrap());

const DEFAULT_TRUE_VALUES: &[&str] = &["yes", "true", "ok", "1"];

fn as_int(value: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    let Some(text) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let text = text.trim();
    let n = match text.parse::<i64>() {
        Ok(n) => n,
        Err(_) => match text.parse::<f64>() {
            Ok(f) if f.is_finite() => f.trunc() as i64,
            _ => {
                return Err(MapError::transform(
                    "asInt",
                    format!("'{}' is not a number", text),
                ))
            }
        },
    };
    Ok(Literal::integer(n).into())
}

fn as_decimal(value: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    let Some(text) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let text = text.trim();
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() => Ok(Literal::typed(text, vocab::XSD_DECIMAL).into()),
        _ => Err(MapError::transform(
            "asDecimal",
            format!("'{}' is not a decimal", text),
        )),
    }
}

/// True if the value is one of `args` (case-insensitive), or of the default true-set
fn as_boolean(value: Value, _: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    let Some(text) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let text = text.trim().to_lowercase();
    let truthy = if args.is_empty() {
        DEFAULT_TRUE_VALUES.contains(&text.as_str())
    } else {
        args.iter()
            .filter_map(|a| a.as_text())
            .any(|a| a.to_lowercase() == text)
    };
    Ok(Literal::boolean(truthy).into())
}

fn map_text(value: Value, f: impl Fn(&str) -> String) -> Value {
    match input_text(&value) {
        Some(text) => Value::Str(f(&text)),
        None => Value::Null,
    }
}

fn split_comma(value: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    Ok(Value::List(match input_text(&value) {
        Some(text) => RE_COMMA.split(&text).map(Value::str).collect(),
        None => Vec::new(),
    }))
}

fn split(value: Value, _: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    let pattern = arg_text(args, 0)
        .ok_or_else(|| MapError::transform("split", "missing regex argument"))?;
    let re = Regex::new(&pattern).map_err(|e| MapError::transform("split", e.to_string()))?;
    Ok(Value::List(match input_text(&value) {
        Some(text) => re.split(&text).map(Value::str).collect(),
        None => Vec::new(),
    }))
}

fn now(_: Value, _: &mut TemplateState<'_>, _: &[Value]) -> MapResult<Value> {
    let stamp = chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string();
    Ok(Literal::typed(stamp, vocab::XSD_DATETIME).into())
}

/// Digest of the value followed by any extra arguments.
///
/// An absent value contributes nothing, unlike `<hash(..)>` URI patterns
/// where an absent variable hashes as `None`.
fn hash(value: Value, _: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    let parts = input_text(&value)
        .into_iter()
        .chain(args.iter().map(|a| a.render()));
    Ok(Value::Str(hash_digest(parts.collect::<Vec<_>>())))
}

fn eval_expr(value: Value, state: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    let source = arg_text(args, 0)
        .ok_or_else(|| MapError::transform("expr", "missing expression argument"))?;
    expr::evaluate(&source, value, state)
}

/// `reconcile(name, type, endpoint, filters, skipPlaceholders)`
fn reconcile_fn(value: Value, state: &mut TemplateState<'_>, args: &[Value]) -> MapResult<Value> {
    let Some(key) = input_text(&value) else {
        return Ok(Value::Null);
    };
    let name = arg_text(args, 0)
        .ok_or_else(|| MapError::transform("reconcile", "missing local resource name"))?;
    let filters = match args.get(3) {
        Some(Value::List(pairs)) => pairs
            .iter()
            .map(|pair| match pair {
                Value::List(pv) if pv.len() == 2 => Ok((pv[0].render(), pv[1].render())),
                other => Err(MapError::transform(
                    "reconcile",
                    format!("filters must be (property, value) pairs, found {:?}", other),
                )),
            })
            .collect::<MapResult<Vec<_>>>()?,
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            return Err(MapError::transform(
                "reconcile",
                format!("filters must be a list, found {:?}", other),
            ))
        }
    };
    let call = ReconcileCall {
        name,
        target_type: arg_text(args, 1),
        endpoint: arg_text(args, 2),
        filters,
        skip_placeholders: matches!(args.get(4), Some(Value::Bool(true))),
    };
    Ok(reconcile(key.trim(), &call, state)?.into())
}

pub(super) fn install(registry: &mut FunctionRegistry) {
    registry.register("asInt", as_int);
    registry.register("asDecimal", as_decimal);
    registry.register("asBoolean", as_boolean);
    registry.register("trim", |v, _, _| Ok(map_text(v, |s| s.trim().to_string())));
    registry.register("toLower", |v, _, _| Ok(map_text(v, str::to_lowercase)));
    registry.register("toUpper", |v, _, _| Ok(map_text(v, str::to_uppercase)));
    registry.register("splitComma", split_comma);
    registry.register("split", split);
    registry.register("now", now);
    registry.register("hash", hash);
    registry.register("expr", eval_expr);
    registry.register("reconcile", reconcile_fn);
    super::dates::install(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::testing::Harness;
    use crate::template::pattern_expand;

    fn expand(template: &str, bindings: Vec<(&str, Value)>) -> MapResult<Value> {
        let mut h = Harness::new("{}");
        let mut state = h.state(bindings);
        pattern_expand(template, &mut state)
    }

    #[test]
    fn numeric_coercions() {
        assert_eq!(
            expand("{id | asInt}", vec![("id", Value::str("123"))]).unwrap(),
            Value::from(Literal::integer(123))
        );
        assert_eq!(
            expand("{id | asInt}", vec![("id", Value::str("12.7"))]).unwrap(),
            Value::from(Literal::integer(12))
        );
        assert_eq!(
            expand("{d | asDecimal}", vec![("d", Value::str("3.50"))]).unwrap(),
            Value::from(Literal::typed("3.50", vocab::XSD_DECIMAL))
        );
        assert!(matches!(
            expand("{id | asInt}", vec![("id", Value::str("abc"))]),
            Err(MapError::Transform { .. })
        ));
    }

    #[test]
    fn boolean_coercion_uses_true_set() {
        assert_eq!(
            expand("{b | asBoolean}", vec![("b", Value::str("Yes"))]).unwrap(),
            Value::from(Literal::boolean(true))
        );
        assert_eq!(
            expand("{b | asBoolean}", vec![("b", Value::str("nope"))]).unwrap(),
            Value::from(Literal::boolean(false))
        );
        assert_eq!(
            expand("{b | asBoolean('Y', 'si')}", vec![("b", Value::str("SI"))]).unwrap(),
            Value::from(Literal::boolean(true))
        );
    }

    #[test]
    fn string_transforms() {
        assert_eq!(
            expand("{s | toUpper}", vec![("s", Value::str("abc"))]).unwrap(),
            Value::str("ABC")
        );
        assert_eq!(
            expand("{s | split('[;/]')}", vec![("s", Value::str("a;b/c"))]).unwrap(),
            Value::List(vec![Value::str("a"), Value::str("b"), Value::str("c")])
        );
    }

    #[test]
    fn hash_includes_extra_arguments() {
        assert_eq!(
            expand("{x | hash}", vec![("x", Value::str("label1"))]).unwrap(),
            Value::str("LQOLIG61J9UEV7BN9JOF36NUSRGICPDM")
        );
        assert_eq!(
            expand("{x | hash('bar')}", vec![("x", Value::str("foo"))]).unwrap(),
            Value::str("H11TFU942OGHRQFBN5HVUJ72G4IP6A3O")
        );
    }

    #[test]
    fn hash_skips_an_absent_value() {
        assert_eq!(
            expand("{x | hash('bar')}", vec![("x", Value::Null)]).unwrap(),
            Value::str(hash_digest(["bar"]))
        );
    }

    #[test]
    fn now_is_a_datetime() {
        let v = expand("{x | now}", vec![("x", Value::str("ignored"))]).unwrap();
        match v {
            Value::Term(crate::graph::Term::Literal(lit)) => {
                assert_eq!(lit.datatype(), vocab::XSD_DATETIME)
            }
            other => panic!("expected literal, got {:?}", other),
        }
    }
}
