//! Mapping specification model
//!
//! A [`MapperSpec`] is loaded once from a YAML (or JSON) document and is
//! read-only for the rest of the run. It holds the resource templates applied
//! to every record, one-off templates, embedded templates, reusable property
//! specs, namespace and mapping tables, and the global context defaults.
//!
//! Imports compose specs: each imported document is merged so that later
//! imports beat earlier ones and the importing spec beats all of them.

mod property;
mod resource;

pub use property::{PropSpec, ReconciliationSpec, ValueType};
pub use resource::{PropTemplate, ResourceSpec, RowFilter};

use crate::template::context::{vars, Context};
use crate::template::value::{yaml_key, Value};
use serde_yaml::{Mapping, Value as Yaml};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Default for `$baseURI` when the spec does not set one
pub const DEFAULT_BASE_URI: &str = "https://epimorphics.com/datasets/";

/// Namespaces available to every spec; project namespaces take precedence
pub const BUILTIN_NAMESPACES: &[(&str, &str)] = &[
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("skos", "http://www.w3.org/2004/02/skos/core#"),
    ("skosxl", "http://www.w3.org/2008/05/skos-xl#"),
    ("dct", "http://purl.org/dc/terms/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("geo", "http://www.w3.org/2003/01/geo/wgs84_pos#"),
    ("qb", "http://purl.org/linked-data/cube#"),
    ("vcard", "http://www.w3.org/2006/vcard/ns#"),
    ("org", "http://www.w3.org/ns/org#"),
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
];

/// Errors raised while loading a specification. Always fatal to the load.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("badly formatted mapping spec: {0}")]
    Invalid(String),

    #[error("resource spec must be a map with at least name and some properties, was {0}")]
    InvalidResource(String),

    #[error("property type not recognised, was {0}")]
    UnknownValueType(String),

    #[error("failed to find import {0}")]
    ImportNotFound(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SpecResult<T> = Result<T, SpecError>;

/// A loaded mapping specification
#[derive(Debug, Clone)]
pub struct MapperSpec {
    /// Project namespaces; built-ins are consulted after these
    pub namespaces: BTreeMap<String, String>,
    pub globals: BTreeMap<String, Value>,
    pub property_specs: BTreeMap<String, PropSpec>,
    pub resources: Vec<ResourceSpec>,
    pub one_offs: Vec<ResourceSpec>,
    pub embedded: BTreeMap<String, ResourceSpec>,
    pub mappings: BTreeMap<String, BTreeMap<String, String>>,
    /// Function library names that must be registered before processing
    pub function_imports: Vec<String>,
    auto_declare: bool,
}

impl Default for MapperSpec {
    fn default() -> Self {
        Self {
            namespaces: BTreeMap::new(),
            globals: BTreeMap::new(),
            property_specs: BTreeMap::new(),
            resources: Vec::new(),
            one_offs: Vec::new(),
            embedded: BTreeMap::new(),
            mappings: BTreeMap::new(),
            function_imports: Vec::new(),
            auto_declare: true,
        }
    }
}

impl MapperSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a spec from YAML text. Relative imports resolve against the
    /// current directory.
    pub fn from_yaml_str(text: &str) -> SpecResult<Self> {
        let raw: Yaml = serde_yaml::from_str(text)?;
        Self::from_yaml(&raw, None)
    }

    /// Load a spec document from disk
    pub fn load(path: impl AsRef<Path>) -> SpecResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let raw: Yaml = serde_yaml::from_str(&text)?;
        Self::from_yaml(&raw, path.parent())
    }

    /// Build a spec from an already-parsed document
    pub fn from_yaml(raw: &Yaml, base_dir: Option<&Path>) -> SpecResult<Self> {
        let empty = Mapping::new();
        let doc = match raw {
            Yaml::Null => &empty,
            Yaml::Mapping(m) => m,
            other => {
                return Err(SpecError::Invalid(format!(
                    "expected the spec to be a map, was {:?}",
                    other
                )))
            }
        };

        let mut spec = MapperSpec::new();

        if let Some(globals) = get_as_map(doc, "globals")? {
            spec.globals = globals
                .iter()
                .map(|(k, v)| (yaml_key(k), Value::from(v.clone())))
                .collect();
        }
        if let Some(namespaces) = get_as_map(doc, "namespaces")? {
            spec.namespaces = namespaces
                .iter()
                .map(|(k, v)| (yaml_key(k), yaml_key(v)))
                .collect();
        }
        for raw in get_as_list(doc, "one_offs")? {
            spec.one_offs.push(ResourceSpec::from_yaml(raw)?);
        }
        for raw in get_as_list(doc, "resources")? {
            spec.resources.push(ResourceSpec::from_yaml(raw)?);
        }
        for raw in get_as_list(doc, "embedded")? {
            let rs = ResourceSpec::from_yaml(raw)?;
            spec.embedded.insert(rs.name.clone(), rs);
        }
        for raw in get_as_list(doc, "properties")? {
            let ps = PropSpec::from_yaml(raw)?;
            spec.property_specs.insert(ps.name.clone(), ps);
        }
        if let Some(mappings) = get_as_map(doc, "mappings")? {
            for (name, table) in mappings {
                let table = table.as_mapping().ok_or_else(|| {
                    SpecError::Invalid(format!(
                        "expected mappings to be a map of maps, {} was {:?}",
                        yaml_key(name),
                        table
                    ))
                })?;
                spec.mappings.insert(
                    yaml_key(name),
                    table.iter().map(|(k, v)| (yaml_key(k), yaml_key(v))).collect(),
                );
            }
        }

        let imports = get_as_list(doc, "imports")?
            .iter()
            .map(yaml_key)
            .collect::<Vec<_>>();
        if imports.is_empty() {
            Ok(spec)
        } else {
            spec.resolve_imports(&imports, base_dir)
        }
    }

    fn resolve_imports(mut self, imports: &[String], base_dir: Option<&Path>) -> SpecResult<Self> {
        let mut acc = MapperSpec::new();
        for name in imports {
            if is_spec_document(name) {
                let path = find_import(name, base_dir)
                    .ok_or_else(|| SpecError::ImportNotFound(name.clone()))?;
                tracing::debug!(import = %path.display(), "loading imported spec");
                let module = MapperSpec::load(&path)?;
                acc = module.merge(&acc);
            } else {
                self.function_imports.push(name.clone());
            }
        }
        Ok(self.merge(&acc))
    }

    /// Merge `other` into a copy of this spec, this spec taking precedence.
    ///
    /// Keyed collections are unioned with our entries winning; one-offs are
    /// concatenated ours-first. Per-record resources are never imported.
    pub fn merge(&self, other: &MapperSpec) -> MapperSpec {
        fn union<V: Clone>(ours: &BTreeMap<String, V>, theirs: &BTreeMap<String, V>) -> BTreeMap<String, V> {
            let mut merged = theirs.clone();
            merged.extend(ours.iter().map(|(k, v)| (k.clone(), v.clone())));
            merged
        }

        let mut function_imports = self.function_imports.clone();
        for name in &other.function_imports {
            if !function_imports.contains(name) {
                function_imports.push(name.clone());
            }
        }

        MapperSpec {
            namespaces: union(&self.namespaces, &other.namespaces),
            globals: union(&self.globals, &other.globals),
            property_specs: union(&self.property_specs, &other.property_specs),
            resources: self.resources.clone(),
            one_offs: self
                .one_offs
                .iter()
                .chain(other.one_offs.iter())
                .cloned()
                .collect(),
            embedded: union(&self.embedded, &other.embedded),
            mappings: union(&self.mappings, &other.mappings),
            function_imports,
            auto_declare: self.auto_declare,
        }
    }

    /// Toggle implicit class and property declarations
    pub fn with_auto_declare(mut self, auto_declare: bool) -> Self {
        self.auto_declare = auto_declare;
        self
    }

    pub fn auto_declare(&self) -> bool {
        self.auto_declare
    }

    /// Override a global default, e.g. from the command line
    pub fn with_global(mut self, name: impl Into<String>, value: Value) -> Self {
        self.globals.insert(name.into(), value);
        self
    }

    pub fn with_resource(mut self, resource: ResourceSpec) -> Self {
        self.resources.push(resource);
        self
    }

    /// Resolve a namespace prefix, project namespaces first
    pub fn namespace(&self, prefix: &str) -> Option<&str> {
        self.namespaces.get(prefix).map(String::as_str).or_else(|| {
            BUILTIN_NAMESPACES
                .iter()
                .find(|(p, _)| *p == prefix)
                .map(|(_, uri)| *uri)
        })
    }

    /// Build the root evaluation context: built-in defaults, then globals,
    /// with `$datasetBase` derived when not set explicitly.
    pub fn root_context(&self) -> Context {
        let builtins = Context::from_bindings([(vars::BASE_URI, Value::str(DEFAULT_BASE_URI))]);
        let globals = builtins.child(self.globals.clone());

        let has_base = globals
            .get(vars::DATASET_BASE)
            .is_some_and(|v| !v.is_empty());
        if !has_base {
            let base_uri = globals.lookup(vars::BASE_URI).render();
            let dataset_base = match globals.get(vars::DATASET_ID) {
                Some(id) if !id.is_empty() => format!("{}{}", base_uri, id.render()),
                _ => base_uri.trim_end_matches('/').to_string(),
            };
            globals.set(vars::DATASET_BASE, Value::Str(dataset_base));
        }
        globals
    }
}

/// String value of a scalar field, `None` when absent or null
pub(crate) fn field_str(map: &Mapping, field: &str) -> Option<String> {
    match map.get(field) {
        None | Some(Yaml::Null) => None,
        Some(v) => Some(yaml_key(v)),
    }
}

fn get_as_map<'a>(doc: &'a Mapping, field: &str) -> SpecResult<Option<&'a Mapping>> {
    match doc.get(field) {
        None | Some(Yaml::Null) => Ok(None),
        Some(Yaml::Mapping(m)) => Ok(Some(m)),
        Some(other) => Err(SpecError::Invalid(format!(
            "expected {} to be a map, was {:?}",
            field, other
        ))),
    }
}

fn get_as_list<'a>(doc: &'a Mapping, field: &str) -> SpecResult<&'a [Yaml]> {
    match doc.get(field) {
        None | Some(Yaml::Null) => Ok(&[]),
        Some(Yaml::Sequence(items)) => Ok(items),
        Some(other) => Err(SpecError::Invalid(format!(
            "expected {} to be a list, was {:?}",
            field, other
        ))),
    }
}

fn is_spec_document(name: &str) -> bool {
    [".yaml", ".yml", ".json"].iter().any(|ext| name.ends_with(ext))
}

/// Locate an imported document: next to the importing document, then as
/// given, then anywhere under the current directory.
fn find_import(name: &str, base_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = base_dir {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    let direct = Path::new(name);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }

    let file_name = direct.file_name()?;
    let cwd = std::env::current_dir().ok()?;
    WalkDir::new(cwd)
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == file_name)
        .map(|e| e.into_path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_all_collections() {
        let spec = MapperSpec::from_yaml_str(
            r#"
globals:
  $datasetID: testds
namespaces:
  aglib: https://epimorphics.com/library/def/
properties:
  - name: regNo
    prop: "<aglib:RegNo>"
    type: Int
resources:
  - name: registration
    properties:
      id: ""
one_offs:
  - name: HSE
    properties:
      "@id": "<HSE>"
embedded:
  - name: crop-situation
    properties:
      crop: "{crop}"
mappings:
  testmap:
    foo: "<http://example.com/Foo>"
"#,
        )
        .unwrap();

        assert_eq!(spec.globals.get("$datasetID"), Some(&Value::str("testds")));
        assert_eq!(spec.namespace("aglib"), Some("https://epimorphics.com/library/def/"));
        assert_eq!(spec.namespace("skos"), Some("http://www.w3.org/2004/02/skos/core#"));
        assert!(spec.property_specs.contains_key("regNo"));
        assert_eq!(spec.resources.len(), 1);
        assert_eq!(spec.one_offs.len(), 1);
        assert!(spec.embedded.contains_key("crop-situation"));
        assert_eq!(
            spec.mappings["testmap"].get("foo").map(String::as_str),
            Some("<http://example.com/Foo>")
        );
        assert!(spec.auto_declare());
    }

    #[test]
    fn rejects_wrongly_shaped_collections() {
        assert!(MapperSpec::from_yaml_str("globals: [1, 2]").is_err());
        assert!(MapperSpec::from_yaml_str("resources: {a: b}").is_err());
        assert!(MapperSpec::from_yaml_str("mappings: {m: [1]}").is_err());
        assert!(matches!(
            MapperSpec::from_yaml_str("properties: [{name: a, prop: b, type: Text}]"),
            Err(SpecError::UnknownValueType(_))
        ));
    }

    #[test]
    fn project_namespaces_override_builtins() {
        let spec = MapperSpec::from_yaml_str("namespaces: {skos: 'http://example.com/skos#'}").unwrap();
        assert_eq!(spec.namespace("skos"), Some("http://example.com/skos#"));
        assert_eq!(spec.namespace("nope"), None);
    }

    #[test]
    fn root_context_derives_dataset_base() {
        let spec = MapperSpec::from_yaml_str("globals: {$datasetID: testds}").unwrap();
        let ctx = spec.root_context();
        assert_eq!(
            ctx.lookup(vars::DATASET_BASE),
            Value::str("https://epimorphics.com/datasets/testds")
        );

        let spec = MapperSpec::from_yaml_str(
            "globals: {$datasetBase: 'http://example.com/ds', $datasetID: x}",
        )
        .unwrap();
        assert_eq!(
            spec.root_context().lookup(vars::DATASET_BASE),
            Value::str("http://example.com/ds")
        );
    }

    #[test]
    fn merge_prefers_receiver_and_concatenates_one_offs() {
        let ours = MapperSpec::from_yaml_str(
            r#"
globals: {a: ours}
one_offs: [{name: first, properties: {}}]
resources: [{name: kept, properties: {}}]
"#,
        )
        .unwrap();
        let theirs = MapperSpec::from_yaml_str(
            r#"
globals: {a: theirs, b: theirs}
one_offs: [{name: second, properties: {}}]
resources: [{name: dropped, properties: {}}]
"#,
        )
        .unwrap();

        let merged = ours.merge(&theirs);
        assert_eq!(merged.globals["a"], Value::str("ours"));
        assert_eq!(merged.globals["b"], Value::str("theirs"));
        let names: Vec<_> = merged.one_offs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(merged.resources.len(), 1);
        assert_eq!(merged.resources[0].name, "kept");
    }

    #[test]
    fn imports_merge_in_order_with_importer_winning() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("one.yaml"),
            "globals: {a: one, b: one, c: one}\nproperties: [{name: p, prop: '<ex:one>'}]",
        )
        .unwrap();
        fs::write(dir.path().join("two.yaml"), "globals: {a: two, b: two}").unwrap();
        let main = dir.path().join("main.yaml");
        fs::write(
            &main,
            "imports: [one.yaml, two.yaml, my_parsers]\nglobals: {a: main}",
        )
        .unwrap();

        let spec = MapperSpec::load(&main).unwrap();
        assert_eq!(spec.globals["a"], Value::str("main"));
        assert_eq!(spec.globals["b"], Value::str("two"));
        assert_eq!(spec.globals["c"], Value::str("one"));
        assert_eq!(spec.property_specs["p"].prop, "<ex:one>");
        assert_eq!(spec.function_imports, vec!["my_parsers".to_string()]);
    }

    #[test]
    fn missing_import_fails_the_load() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("main.yaml");
        fs::write(&main, "imports: [no-such-spec-anywhere-7f3a.yaml]").unwrap();
        assert!(matches!(
            MapperSpec::load(&main),
            Err(SpecError::ImportNotFound(_))
        ));
    }
}
