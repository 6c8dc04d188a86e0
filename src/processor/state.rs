//! Run-wide state threaded through every expansion

use crate::functions::call::BoundCall;
use crate::functions::expr::Expr;
use crate::functions::FunctionRegistry;
use crate::graph::{Dataset, GraphName, Statement, StatementSink, Term};
use crate::reconcile::{Reconciler, ReconciliationRecord};
use crate::spec::MapperSpec;
use crate::template::context::{vars, Context};
use crate::template::value::Value;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Read-only collaborators shared by every expansion in a run
pub struct Environment {
    pub spec: MapperSpec,
    pub functions: FunctionRegistry,
    pub reconciler: Box<dyn Reconciler>,
}

/// Kind of implicit declaration, for the first-occurrence guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Class,
    Property,
}

/// Mutable state that lives for a whole run.
///
/// Backlinks are overwritten by later resources of the same name.
/// Declaration guards and vocabulary entries keep the first entry.
pub struct RunState {
    sink: Box<dyn StatementSink>,
    backlinks: HashMap<String, Term>,
    declared: HashSet<(DeclarationKind, String)>,
    vocab: HashMap<(String, String), Term>,
    schemes: HashMap<String, Term>,
    reconciled: HashMap<(String, Option<String>), ReconciliationRecord>,
    calls: HashMap<String, Rc<BoundCall>>,
    expressions: HashMap<String, Rc<Expr>>,
    literal_fallbacks: HashSet<String>,
    blank_nodes: u64,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(Box::new(Dataset::new()))
    }
}

impl RunState {
    pub fn new(sink: Box<dyn StatementSink>) -> Self {
        Self {
            sink,
            backlinks: HashMap::new(),
            declared: HashSet::new(),
            vocab: HashMap::new(),
            schemes: HashMap::new(),
            reconciled: HashMap::new(),
            calls: HashMap::new(),
            expressions: HashMap::new(),
            literal_fallbacks: HashSet::new(),
            blank_nodes: 0,
        }
    }

    pub fn sink(&self) -> &dyn StatementSink {
        self.sink.as_ref()
    }

    pub fn sink_mut(&mut self) -> &mut dyn StatementSink {
        self.sink.as_mut()
    }

    pub fn into_sink(self) -> Box<dyn StatementSink> {
        self.sink
    }

    // ---- backlinks ----

    pub fn backlink(&self, name: &str) -> Option<&Term> {
        self.backlinks.get(name)
    }

    /// Record the identifier produced for a resource name, replacing any earlier one
    pub fn record_backlink(&mut self, name: &str, id: Term) {
        self.backlinks.insert(name.to_string(), id);
    }

    // ---- implicit declarations ----

    /// Mark a declaration as emitted. Returns false if it already was.
    pub fn mark_declared(&mut self, kind: DeclarationKind, name: &str) -> bool {
        self.declared.insert((kind, name.to_string()))
    }

    // ---- controlled vocabularies ----

    pub fn vocab_entry(&self, cv_name: &str, label: &str) -> Option<&Term> {
        self.vocab.get(&(cv_name.to_string(), label.to_string()))
    }

    pub fn record_vocab_entry(&mut self, cv_name: &str, label: &str, id: Term) {
        self.vocab
            .entry((cv_name.to_string(), label.to_string()))
            .or_insert(id);
    }

    pub fn scheme(&self, cv_name: &str) -> Option<&Term> {
        self.schemes.get(cv_name)
    }

    pub fn record_scheme(&mut self, cv_name: &str, id: Term) {
        self.schemes.entry(cv_name.to_string()).or_insert(id);
    }

    // ---- reconciliation ----

    pub fn reconciled(&self, key: &str, target_type: Option<&str>) -> Option<&ReconciliationRecord> {
        self.reconciled
            .get(&(key.to_string(), target_type.map(str::to_string)))
    }

    pub fn record_reconciliation(&mut self, record: ReconciliationRecord) {
        self.reconciled
            .insert((record.key.clone(), record.target_type.clone()), record);
    }

    pub fn reconciliations(&self) -> impl Iterator<Item = &ReconciliationRecord> {
        self.reconciled.values()
    }

    // ---- memoized parses ----

    pub(crate) fn cached_call(&self, text: &str) -> Option<Rc<BoundCall>> {
        self.calls.get(text).cloned()
    }

    pub(crate) fn cache_call(&mut self, text: &str, call: Rc<BoundCall>) {
        self.calls.insert(text.to_string(), call);
    }

    pub(crate) fn cached_expression(&self, source: &str) -> Option<Rc<Expr>> {
        self.expressions.get(source).cloned()
    }

    pub(crate) fn cache_expression(&mut self, source: &str, expr: Rc<Expr>) {
        self.expressions.insert(source.to_string(), expr);
    }

    /// True the first time a bare call argument falls back to its literal text
    pub(crate) fn flag_literal_fallback(&mut self, token: &str) -> bool {
        self.literal_fallbacks.insert(token.to_string())
    }

    /// A fresh run-local blank node
    pub fn next_blank(&mut self) -> Term {
        let label = format!("b{}", self.blank_nodes);
        self.blank_nodes += 1;
        Term::Blank(label)
    }
}

/// Everything an expansion step can see: the environment, the run state,
/// and the current evaluation context.
pub struct TemplateState<'a> {
    pub env: &'a Environment,
    pub run: &'a mut RunState,
    ctx: Context,
}

impl<'a> TemplateState<'a> {
    pub fn new(env: &'a Environment, run: &'a mut RunState, ctx: Context) -> Self {
        Self { env, run, ctx }
    }

    /// A state whose context has `bindings` layered on top of this one
    pub fn child<K, I>(&mut self, bindings: I) -> TemplateState<'_>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        TemplateState {
            env: self.env,
            run: &mut *self.run,
            ctx: self.ctx.child(bindings),
        }
    }

    pub fn spec(&self) -> &'a MapperSpec {
        &self.env.spec
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.ctx.get(name)
    }

    pub fn lookup(&self, name: &str) -> Value {
        self.ctx.lookup(name)
    }

    /// Bind a name in this state's innermost scope
    pub fn set(&self, name: &str, value: Value) {
        self.ctx.set(name, value);
    }

    pub fn dataset_base(&self) -> String {
        self.ctx.lookup(vars::DATASET_BASE).render()
    }

    /// Partition new statements go to; default unless `$graph` is bound
    pub fn current_graph(&self) -> GraphName {
        match self.ctx.get(vars::GRAPH) {
            Some(g) if !g.is_empty() => GraphName::named(g.render()),
            _ => GraphName::Default,
        }
    }

    /// Direct this state's statements to `graph`, optionally flagging it preserved
    pub fn switch_graph(&mut self, graph: String, preserve: bool) {
        let name = GraphName::named(graph.clone());
        if preserve {
            self.run.sink_mut().preserve(&name);
        }
        tracing::debug!(graph = %name, preserve, "switching target graph");
        self.ctx.set(vars::GRAPH, Value::Str(graph));
    }

    pub fn add(&mut self, statement: Statement) {
        let graph = self.current_graph();
        self.run.sink_mut().add(&graph, statement);
    }
}
