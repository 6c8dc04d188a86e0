//! Resource templates and property value templates

use super::{field_str, SpecError, SpecResult};
use crate::template::value::{yaml_key, Value};
use serde_yaml::{Mapping, Value as Yaml};

/// The template side of a (property key, template) pair
#[derive(Debug, Clone, PartialEq)]
pub enum PropTemplate {
    /// A value or URI pattern, e.g. `"{id | asInt}"` or `"<skos:Concept>"`
    Pattern(String),
    /// Several independent expansions for the same property key
    List(Vec<PropTemplate>),
    /// An inline resource template whose generated identifier is the value
    Nested(Box<ResourceSpec>),
    /// Any other template shape (numbers, booleans, null)
    Unsupported(String),
}

impl PropTemplate {
    fn from_yaml(raw: &Yaml) -> SpecResult<Self> {
        Ok(match raw {
            Yaml::String(s) => PropTemplate::Pattern(s.clone()),
            Yaml::Sequence(items) => PropTemplate::List(
                items
                    .iter()
                    .map(PropTemplate::from_yaml)
                    .collect::<SpecResult<Vec<_>>>()?,
            ),
            Yaml::Mapping(_) => PropTemplate::Nested(Box::new(ResourceSpec::from_yaml(raw)?)),
            Yaml::Tagged(tagged) => PropTemplate::from_yaml(&tagged.value)?,
            other => PropTemplate::Unsupported(yaml_key(other)),
        })
    }

    /// The pattern text, if this is a plain pattern
    pub fn as_pattern(&self) -> Option<&str> {
        match self {
            PropTemplate::Pattern(p) => Some(p),
            _ => None,
        }
    }
}

impl From<&str> for PropTemplate {
    fn from(s: &str) -> Self {
        PropTemplate::Pattern(s.to_string())
    }
}

impl From<String> for PropTemplate {
    fn from(s: String) -> Self {
        PropTemplate::Pattern(s)
    }
}

/// A row filter: (context key, expected value) pairs.
///
/// A null expected value tests presence, a list tests membership.
pub type RowFilter = Vec<(String, Value)>;

/// A resource template
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub name: String,
    /// Ordered (key, template) pairs; keys may repeat
    pub properties: Vec<(String, PropTemplate)>,
    pub requires: Option<RowFilter>,
    pub unless: Option<RowFilter>,
    /// Graph pattern selecting the target partition
    pub graph: Option<String>,
    /// True when the graph came from `@graphAdd`
    pub preserve_graph: bool,
    pub comment: Option<String>,
}

impl ResourceSpec {
    pub fn new<K, T, I>(name: impl Into<String>, properties: I) -> Self
    where
        K: Into<String>,
        T: Into<PropTemplate>,
        I: IntoIterator<Item = (K, T)>,
    {
        Self {
            name: name.into(),
            properties: properties
                .into_iter()
                .map(|(k, t)| (k.into(), t.into()))
                .collect(),
            requires: None,
            unless: None,
            graph: None,
            preserve_graph: false,
            comment: None,
        }
    }

    pub fn with_requires(mut self, key: impl Into<String>, expected: Value) -> Self {
        self.requires
            .get_or_insert_with(Vec::new)
            .push((key.into(), expected));
        self
    }

    pub fn with_unless(mut self, key: impl Into<String>, forbidden: Value) -> Self {
        self.unless
            .get_or_insert_with(Vec::new)
            .push((key.into(), forbidden));
        self
    }

    pub fn with_graph(mut self, pattern: impl Into<String>, preserve: bool) -> Self {
        self.graph = Some(pattern.into());
        self.preserve_graph = preserve;
        self
    }

    pub fn from_yaml(raw: &Yaml) -> SpecResult<Self> {
        let invalid = || SpecError::InvalidResource(format!("{:?}", raw));
        let map = raw.as_mapping().ok_or_else(invalid)?;
        let name = field_str(map, "name").filter(|n| !n.is_empty());
        let (Some(name), Some(props)) = (name, map.get("properties")) else {
            return Err(invalid());
        };

        let graph_add = field_str(map, "@graphAdd");
        let graph = field_str(map, "@graph").or_else(|| graph_add.clone());

        Ok(Self {
            properties: flatten_properties(&name, props)?,
            requires: row_filter(map, "requires")?,
            unless: row_filter(map, "unless")?,
            preserve_graph: graph_add.is_some(),
            graph,
            comment: field_str(map, "comment"),
            name,
        })
    }

    /// First template declared for `key`, e.g. `@id` or `@type`
    pub fn find_property_definition(&self, key: &str) -> Option<&PropTemplate> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, t)| t)
    }
}

/// Normalize a map or a list of single-entry maps into ordered pairs
fn flatten_properties(name: &str, props: &Yaml) -> SpecResult<Vec<(String, PropTemplate)>> {
    let mut pairs = Vec::new();
    match props {
        Yaml::Mapping(map) => flatten_map(map, &mut pairs)?,
        Yaml::Sequence(items) => {
            for item in items {
                let map = item.as_mapping().ok_or_else(|| {
                    SpecError::Invalid(format!(
                        "properties of {} must be maps, found {:?}",
                        name, item
                    ))
                })?;
                flatten_map(map, &mut pairs)?;
            }
        }
        other => {
            return Err(SpecError::Invalid(format!(
                "expecting properties for resource {} to be a list or map but found {:?}",
                name, other
            )))
        }
    }
    Ok(pairs)
}

fn flatten_map(map: &Mapping, acc: &mut Vec<(String, PropTemplate)>) -> SpecResult<()> {
    for (key, value) in map {
        acc.push((yaml_key(key), PropTemplate::from_yaml(value)?));
    }
    Ok(())
}

fn row_filter(map: &Mapping, field: &str) -> SpecResult<Option<RowFilter>> {
    match map.get(field) {
        None | Some(Yaml::Null) => Ok(None),
        Some(Yaml::Mapping(m)) => Ok(Some(
            m.iter()
                .map(|(k, v)| (yaml_key(k), Value::from(v.clone())))
                .collect(),
        )),
        Some(other) => Err(SpecError::Invalid(format!(
            "resource spec {} must be a map, was {:?}",
            field, other
        ))),
    }
}
