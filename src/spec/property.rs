//! Reusable property specifications

use super::{field_str, SpecError, SpecResult};
use crate::template::value::yaml_key;
use serde_yaml::Value as Yaml;

/// Declared value type of a property, mapped to a coercion function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Decimal,
    Date,
    Datetime,
    DateOrDatetime,
}

impl ValueType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Int" => Some(ValueType::Int),
            "Decimal" => Some(ValueType::Decimal),
            "Date" => Some(ValueType::Date),
            "Datetime" => Some(ValueType::Datetime),
            "DateOrDatetime" => Some(ValueType::DateOrDatetime),
            _ => None,
        }
    }

    /// Name of the built-in function that coerces to this type
    pub fn coercion_fn(&self) -> &'static str {
        match self {
            ValueType::Int => "asInt",
            ValueType::Decimal => "asDecimal",
            ValueType::Date => "asDate",
            ValueType::Datetime => "asDateTime",
            ValueType::DateOrDatetime => "asDateOrDatetime",
        }
    }
}

/// Reconciliation settings attached to a property spec
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationSpec {
    pub api: Option<String>,
    pub target_type: Option<String>,
    /// (property, value) filter pairs, CURIEs allowed
    pub filters: Vec<(String, String)>,
}

impl ReconciliationSpec {
    fn is_active(&self) -> bool {
        self.target_type.is_some() || !self.filters.is_empty()
    }
}

/// A reusable property definition, referenced as `:name` from resource templates
#[derive(Debug, Clone, PartialEq)]
pub struct PropSpec {
    pub name: String,
    /// Target property pattern (URI-expanded at use)
    pub prop: String,
    pub value_type: Option<ValueType>,
    /// Class asserted on the subject whenever this property is used
    pub class: Option<String>,
    pub required: bool,
    pub comment: Option<String>,
    pub reconciliation: ReconciliationSpec,
}

impl PropSpec {
    pub fn new(name: impl Into<String>, prop: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prop: prop.into(),
            value_type: None,
            class: None,
            required: false,
            comment: None,
            reconciliation: ReconciliationSpec::default(),
        }
    }

    pub fn from_yaml(raw: &Yaml) -> SpecResult<Self> {
        let map = raw.as_mapping().ok_or_else(|| {
            SpecError::Invalid(format!(
                "property spec must be a map with at least name and prop, was {:?}",
                raw
            ))
        })?;
        let (Some(name), Some(prop)) = (field_str(map, "name"), field_str(map, "prop")) else {
            return Err(SpecError::Invalid(format!(
                "property spec must be a map with at least name and prop, was {:?}",
                raw
            )));
        };

        let value_type = match field_str(map, "type") {
            None => None,
            Some(ty) => Some(ValueType::parse(&ty).ok_or(SpecError::UnknownValueType(ty))?),
        };

        let filters = match map.get("reconciliationFilters") {
            None | Some(Yaml::Null) => Vec::new(),
            Some(Yaml::Mapping(m)) => m
                .iter()
                .map(|(k, v)| (yaml_key(k), yaml_key(v)))
                .collect(),
            Some(other) => {
                return Err(SpecError::Invalid(format!(
                    "reconciliationFilters for {} must be a map, was {:?}",
                    name, other
                )))
            }
        };

        Ok(Self {
            value_type,
            class: field_str(map, "class"),
            required: map.get("required").and_then(Yaml::as_bool).unwrap_or(false),
            comment: field_str(map, "comment"),
            reconciliation: ReconciliationSpec {
                api: field_str(map, "reconciliationAPI"),
                target_type: field_str(map, "reconciliationType"),
                filters,
            },
            name,
            prop,
        })
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Rewrite a value template according to this spec.
    ///
    /// A bare `{var}` template gets the type coercion appended, or failing
    /// that the reconciliation call. Returns the (property, template) pair.
    pub fn prop_value_template(&self, pattern: &str) -> (String, String) {
        let inner = pattern
            .strip_prefix('{')
            .and_then(|p| p.strip_suffix('}'))
            .filter(|p| !p.contains('{') && !p.contains('}'));

        let rewritten = match (inner, self.value_type) {
            (Some(inner), Some(ty)) => format!("{{{} | {}}}", inner, ty.coercion_fn()),
            (Some(inner), None) if self.reconciliation.is_active() => {
                format!("{{{} | {}}}", inner, self.reconcile_call())
            }
            _ => pattern.to_string(),
        };
        (self.prop.clone(), rewritten)
    }

    fn reconcile_call(&self) -> String {
        let rec = &self.reconciliation;
        let filters = rec
            .filters
            .iter()
            .map(|(p, v)| format!("({}, {})", quote_arg(Some(p)), quote_arg(Some(v))))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "reconcile({}, {}, {}, [{}])",
            quote_arg(Some(&self.name)),
            quote_arg(rec.target_type.as_deref()),
            quote_arg(rec.api.as_deref()),
            filters
        )
    }
}

fn quote_arg(value: Option<&str>) -> String {
    match value {
        None => "None".to_string(),
        Some(v) if v.contains('\'') => format!("\"{}\"", v),
        Some(v) => format!("'{}'", v),
    }
}
