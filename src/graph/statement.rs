//! Statements and graph partition names

use super::term::{escape_iri, Term};
use serde::{Deserialize, Serialize};

/// Identifier of a graph partition
///
/// Serializes as a plain string; the default partition has no name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum GraphName {
    /// The unnamed partition
    #[default]
    Default,
    /// A named graph, identified by IRI
    Named(String),
}

impl GraphName {
    pub fn named(iri: impl Into<String>) -> Self {
        GraphName::Named(iri.into())
    }

    pub fn is_default(&self) -> bool {
        matches!(self, GraphName::Default)
    }
}

impl std::fmt::Display for GraphName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphName::Default => write!(f, "DEFAULT"),
            GraphName::Named(iri) => write!(f, "<{}>", escape_iri(iri)),
        }
    }
}

/// A subject-predicate-object statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// N-Triples line (without trailing newline)
    pub fn to_ntriples(&self) -> String {
        format!("{} {} {} .", self.subject, self.predicate, self.object)
    }

    /// N-Quads line for the given partition (without trailing newline)
    pub fn to_nquads(&self, graph: &GraphName) -> String {
        match graph {
            GraphName::Default => self.to_ntriples(),
            GraphName::Named(_) => format!(
                "{} {} {} {} .",
                self.subject, self.predicate, self.object, graph
            ),
        }
    }
}
