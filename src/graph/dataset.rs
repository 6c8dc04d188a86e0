//! Dataset: the partitioned statement sink a run writes into

use super::statement::{GraphName, Statement};
use std::collections::{BTreeMap, BTreeSet};

/// The interface through which the processor pushes statements.
///
/// A sink is a set of graph partitions plus the set of graphs flagged as
/// preserved (incrementally updated rather than replaced on differential
/// output). The in-memory [`Dataset`] is the default implementation.
pub trait StatementSink {
    /// Add a statement to the given partition
    fn add(&mut self, graph: &GraphName, statement: Statement);

    /// Flag a named graph as preserved across differential updates
    fn preserve(&mut self, graph: &GraphName);

    /// True if the graph has been flagged as preserved
    fn is_preserved(&self, graph: &GraphName) -> bool;

    /// All partitions that hold at least one statement, default first
    fn graphs(&self) -> Vec<GraphName>;

    /// Statements in a partition, in a stable order
    fn statements(&self, graph: &GraphName) -> Vec<Statement>;

    /// Number of statements in a partition
    fn len(&self, graph: &GraphName) -> usize {
        self.statements(graph).len()
    }
}

/// In-memory dataset with set semantics per partition
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    partitions: BTreeMap<GraphName, BTreeSet<Statement>>,
    preserved: BTreeSet<GraphName>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a statement is present in a partition
    pub fn contains(&self, graph: &GraphName, statement: &Statement) -> bool {
        self.partitions
            .get(graph)
            .map(|set| set.contains(statement))
            .unwrap_or(false)
    }

    /// Total number of statements across all partitions
    pub fn total(&self) -> usize {
        self.partitions.values().map(|s| s.len()).sum()
    }

    /// Iterate statements of a partition without cloning
    pub fn iter(&self, graph: &GraphName) -> impl Iterator<Item = &Statement> {
        self.partitions.get(graph).into_iter().flat_map(|s| s.iter())
    }
}

impl StatementSink for Dataset {
    fn add(&mut self, graph: &GraphName, statement: Statement) {
        self.partitions
            .entry(graph.clone())
            .or_default()
            .insert(statement);
    }

    fn preserve(&mut self, graph: &GraphName) {
        self.preserved.insert(graph.clone());
    }

    fn is_preserved(&self, graph: &GraphName) -> bool {
        self.preserved.contains(graph)
    }

    fn graphs(&self) -> Vec<GraphName> {
        // GraphName::Default sorts first
        self.partitions
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn statements(&self, graph: &GraphName) -> Vec<Statement> {
        self.iter(graph).cloned().collect()
    }

    fn len(&self, graph: &GraphName) -> usize {
        self.partitions.get(graph).map(|s| s.len()).unwrap_or(0)
    }
}
