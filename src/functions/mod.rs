//! Transform function registry
//!
//! Functions have the shape `(value, state, args) -> value` and are invoked
//! from template chains: `{x | fn}` or `{x | fn('arg', var)}`. A registry is
//! owned by a run; nothing here is process-global.

mod builtins;
pub mod call;
mod dates;
pub mod expr;
mod mapping;
mod vocab;

use crate::processor::TemplateState;
use crate::template::{MapResult, Value};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// A registered transform function
pub type TransformFn =
    Arc<dyn Fn(Value, &mut TemplateState<'_>, &[Value]) -> MapResult<Value> + Send + Sync>;

/// Named transform functions available to template chains
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, TransformFn>,
    libraries: BTreeSet<String>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .field("libraries", &self.libraries)
            .finish()
    }
}

impl FunctionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::install(&mut registry);
        mapping::install(&mut registry);
        vocab::install(&mut registry);
        registry
    }

    /// Register (or replace) a function
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Value, &mut TemplateState<'_>, &[Value]) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    pub fn with_function<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, &mut TemplateState<'_>, &[Value]) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.register(name, f);
        self
    }

    /// Register a named function library, satisfying a spec `imports` entry
    pub fn register_library<F>(&mut self, name: impl Into<String>, install: F)
    where
        F: FnOnce(&mut FunctionRegistry),
    {
        install(self);
        self.libraries.insert(name.into());
    }

    pub fn has_library(&self, name: &str) -> bool {
        self.libraries.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&TransformFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Sorted function names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// The text form of a transform input, `None` for null and empty strings
pub(crate) fn input_text(value: &Value) -> Option<String> {
    value.as_text().filter(|s| !s.is_empty())
}

/// Positional string argument, `None` when missing or null
pub(crate) fn arg_text(args: &[Value], index: usize) -> Option<String> {
    args.get(index).and_then(|v| v.as_text())
}
