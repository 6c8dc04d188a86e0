//! Layered evaluation context
//!
//! A context is a chain of scopes. Lookups walk from the innermost scope
//! outwards; writes only ever touch the innermost scope, so deriving a child
//! can never corrupt its parent.

use super::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Reserved context variable names
pub mod vars {
    pub const BASE_URI: &str = "$baseURI";
    pub const DATASET_ID: &str = "$datasetID";
    pub const DATASET_BASE: &str = "$datasetBase";
    pub const FILE: &str = "$file";
    pub const ROW: &str = "$row";
    pub const RESOURCE_ID: &str = "$resourceID";
    pub const PARENT_ID: &str = "$parentID";
    pub const PROP: &str = "$prop";
    pub const LIST_INDEX: &str = "$listIndex";
    pub const GRAPH: &str = "$graph";
    pub const RECONCILIATION_API: &str = "$reconciliationAPI";
}

#[derive(Debug, Default)]
struct Scope {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Scope>>,
}

/// Handle to the innermost scope of a scope chain.
///
/// Cloning the handle shares the same innermost scope.
#[derive(Debug, Clone, Default)]
pub struct Context {
    scope: Rc<Scope>,
}

impl Context {
    /// Create a root context with no bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root context from bindings
    pub fn from_bindings<K, I>(bindings: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            scope: Rc::new(Scope {
                vars: RefCell::new(bindings.into_iter().map(|(k, v)| (k.into(), v)).collect()),
                parent: None,
            }),
        }
    }

    /// Derive a child context with `bindings` as its innermost scope
    pub fn child<K, I>(&self, bindings: I) -> Context
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Context {
            scope: Rc::new(Scope {
                vars: RefCell::new(bindings.into_iter().map(|(k, v)| (k.into(), v)).collect()),
                parent: Some(Rc::clone(&self.scope)),
            }),
        }
    }

    /// Resolve a name through the scope chain
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = Some(&self.scope);
        while let Some(s) = scope {
            if let Some(v) = s.vars.borrow().get(name) {
                return Some(v.clone());
            }
            scope = s.parent.as_ref();
        }
        None
    }

    /// Resolve a name, treating an unbound name as null
    pub fn lookup(&self, name: &str) -> Value {
        self.get(name).unwrap_or(Value::Null)
    }

    /// True if the name is bound in any scope
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind a name in the innermost scope only
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.scope.vars.borrow_mut().insert(name.into(), value);
    }

    /// Number of scopes in the chain
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut scope = self.scope.parent.as_ref();
        while let Some(s) = scope {
            depth += 1;
            scope = s.parent.as_ref();
        }
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_shadows_parent() {
        let root = Context::from_bindings([("a", Value::str("root")), ("b", Value::Int(1))]);
        let child = root.child([("a", Value::str("child"))]);

        assert_eq!(child.get("a"), Some(Value::str("child")));
        assert_eq!(child.get("b"), Some(Value::Int(1)));
        assert_eq!(root.get("a"), Some(Value::str("root")));
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn set_writes_innermost_scope_only() {
        let root = Context::from_bindings([("a", Value::str("root"))]);
        let child = root.child(Vec::<(String, Value)>::new());
        child.set("a", Value::str("shadow"));
        child.set("c", Value::Int(3));

        assert_eq!(child.lookup("a"), Value::str("shadow"));
        assert_eq!(root.lookup("a"), Value::str("root"));
        assert!(!root.contains("c"));
    }

    #[test]
    fn parent_writes_are_visible_to_existing_children() {
        let root = Context::new();
        let child = root.child([("x", Value::Int(1))]);
        root.set("$row", Value::Int(7));
        assert_eq!(child.lookup("$row"), Value::Int(7));
    }

    #[test]
    fn unbound_lookup_is_null() {
        assert_eq!(Context::new().lookup("missing"), Value::Null);
    }
}
