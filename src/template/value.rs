//! Dynamic values flowing through context lookups and transform chains

use crate::graph::{Literal, Term};
use std::collections::BTreeMap;

/// A record or binding value.
///
/// Source data arrives as strings, numbers, nested maps, and lists; transform
/// functions may turn those into graph terms. Every conversion site matches
/// on this closed set of variants.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// An already-typed graph term (IRI, blank node, or literal)
    Term(Term),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// A flat key/value input record
pub type Record = BTreeMap<String, Value>;

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Null, the empty string, and the empty list count as "no value"
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::List(items) => items.is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form of a scalar value, `None` for null, lists, and maps.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Term(t) => Some(t.as_str().to_string()),
            Value::List(_) | Value::Map(_) => None,
        }
    }

    /// Render for embedding in a larger string.
    ///
    /// Lists render comma-separated; null renders empty.
    pub fn render(&self) -> String {
        match self {
            Value::List(items) => items
                .iter()
                .map(|v| v.render())
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.render()))
                .collect::<Vec<_>>()
                .join(","),
            other => other.as_text().unwrap_or_default(),
        }
    }

    /// Compare scalar values by their string form, so that a YAML `123` in a
    /// filter matches a CSV `"123"` in a record.
    pub fn matches(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.matches(y))
            }
            (Value::Null, Value::Null) => true,
            _ => match (self.as_text(), other.as_text()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Trim surrounding whitespace of string values
    pub fn trimmed(self) -> Self {
        match self {
            Value::Str(s) => {
                let t = s.trim();
                if t.len() == s.len() {
                    Value::Str(s)
                } else {
                    Value::Str(t.to_string())
                }
            }
            other => other,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Term> for Value {
    fn from(t: Term) -> Self {
        Value::Term(t)
    }
}

impl From<Literal> for Value {
    fn from(l: Literal) -> Self {
        Value::Term(Term::Literal(l))
    }
}

impl From<Option<Term>> for Value {
    fn from(t: Option<Term>) -> Self {
        t.map(Value::Term).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => Value::Str(s),
            serde_yaml::Value::Sequence(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (yaml_key(&k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

/// String form of a YAML mapping key
pub(crate) fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_values() {
        assert!(Value::Null.is_empty());
        assert!(Value::str("").is_empty());
        assert!(Value::List(vec![]).is_empty());
        assert!(!Value::Int(0).is_empty());
        assert!(!Value::str(" ").is_empty());
    }

    #[test]
    fn scalars_match_across_representations() {
        assert!(Value::Int(123).matches(&Value::str("123")));
        assert!(!Value::str("123").matches(&Value::str("456")));
        assert!(!Value::Null.matches(&Value::str("")));
    }

    #[test]
    fn converts_json_records() {
        let v = Value::from(serde_json::json!({"a": [1, "x"], "b": null, "c": 1.5}));
        let Value::Map(map) = v else {
            panic!("expected map");
        };
        assert_eq!(
            map.get("a"),
            Some(&Value::List(vec![Value::Int(1), Value::str("x")]))
        );
        assert_eq!(map.get("b"), Some(&Value::Null));
        assert_eq!(map.get("c"), Some(&Value::Float(1.5)));
    }

    #[test]
    fn renders_lists_comma_separated() {
        let v = Value::List(vec![Value::str("a"), Value::Int(2)]);
        assert_eq!(v.render(), "a,2");
    }
}
