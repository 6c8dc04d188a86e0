//! Common test utilities for mapping scenarios
//!
//! Builds specs from inline YAML, runs records through a processor and
//! collects the resulting statements. [`MockReconciler`] stands in for the
//! HTTP matching service.

#![allow(dead_code)]

use mapweave::reconcile::{MatchEntry, MatchResult, ReconcileRequest, ReconcileResult, Reconciler};
use mapweave::{GraphName, MapperSpec, Record, RunOutput, Statement, TemplateProcessor, Term, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// `$datasetBase` for specs declaring `$datasetID: testds`
pub const BASE: &str = "https://epimorphics.com/datasets/testds";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub fn spec(yaml: &str) -> MapperSpec {
    MapperSpec::from_yaml_str(yaml).expect("Failed to parse test spec")
}

/// A record of string values
pub fn record(pairs: &[(&str, &str)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::str(*v)))
        .collect()
}

/// Process every record with source name "test" and finalize
pub fn run(spec: MapperSpec, records: Vec<Record>) -> RunOutput {
    run_with(TemplateProcessor::new(spec, "test"), records)
}

pub fn run_with(mut processor: TemplateProcessor, records: Vec<Record>) -> RunOutput {
    for record in records {
        processor.process_row(record).expect("Failed to process record");
    }
    processor.finalize().expect("Run failed")
}

/// Statements of the default graph
pub fn statements(output: &RunOutput) -> Vec<Statement> {
    output.sink.statements(&GraphName::Default)
}

pub fn iri(s: impl Into<String>) -> Term {
    Term::iri(s)
}

pub fn def(name: &str) -> Term {
    Term::iri(format!("{}/def/{}", BASE, name))
}

pub fn data(path: &str) -> Term {
    Term::iri(format!("{}/data/{}", BASE, path))
}

pub fn has(statements: &[Statement], s: &Term, p: &Term, o: &Term) -> bool {
    statements
        .iter()
        .any(|st| &st.subject == s && &st.predicate == p && &st.object == o)
}

/// Statements whose subject is `s`
pub fn about<'a>(statements: &'a [Statement], s: &Term) -> Vec<&'a Statement> {
    statements.iter().filter(|st| &st.subject == s).collect()
}

/// Answers from a fixed table of (query, entries) and logs every request
#[derive(Clone, Default)]
pub struct MockReconciler {
    answers: Vec<(String, Vec<MatchEntry>)>,
    pub requests: Rc<RefCell<Vec<(String, ReconcileRequest)>>>,
}

impl MockReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `query` with an exact match
    pub fn with_match(mut self, query: &str, id: &str, name: &str) -> Self {
        self.answers.push((
            query.to_string(),
            vec![MatchEntry {
                id: id.to_string(),
                name: Some(name.to_string()),
                score: 100.0,
                matched: true,
            }],
        ));
        self
    }

    /// Reply to `query` with a single non-matching candidate
    pub fn with_candidate(mut self, query: &str, id: &str, name: &str, score: f64) -> Self {
        self.answers.push((
            query.to_string(),
            vec![MatchEntry {
                id: id.to_string(),
                name: Some(name.to_string()),
                score,
                matched: false,
            }],
        ));
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Reconciler for MockReconciler {
    fn reconcile(&self, endpoint: &str, requests: &[ReconcileRequest]) -> ReconcileResult<Vec<MatchResult>> {
        let mut log = self.requests.borrow_mut();
        Ok(requests
            .iter()
            .map(|r| {
                log.push((endpoint.to_string(), r.clone()));
                let entries = self
                    .answers
                    .iter()
                    .find(|(q, _)| *q == r.query)
                    .map(|(_, e)| e.clone())
                    .unwrap_or_default();
                MatchResult::from_entries(entries)
            })
            .collect())
    }
}
