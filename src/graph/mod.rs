//! Core graph data structures

mod dataset;
mod statement;
mod term;

#[cfg(test)]
mod tests;

pub use dataset::{Dataset, StatementSink};
pub use statement::{GraphName, Statement};
pub use term::{escape_iri, vocab, Literal, Term};
