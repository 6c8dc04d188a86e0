//! Reconciliation against an OpenRefine-style matching service
//!
//! A [`Reconciler`] turns free-text queries into candidate matches. The
//! [`HttpReconciler`] talks to a real endpoint; tests substitute their own
//! implementation. [`adapter`] connects reconciliation to template expansion.

pub mod adapter;

use crate::graph::Term;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Vocabulary used to record candidate matches on placeholder resources
pub mod rec {
    pub const NS: &str = "http://epimorphics.net/vocabs/reconciliation/";
    pub const POSSIBLE_MATCH: &str = "http://epimorphics.net/vocabs/reconciliation/possibleMatch";
    pub const SCORE: &str = "http://epimorphics.net/vocabs/reconciliation/score";
    pub const MATCH: &str = "http://epimorphics.net/vocabs/reconciliation/match";
    pub const LABEL: &str = "http://epimorphics.net/vocabs/reconciliation/label";
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("no reconciliation endpoint configured")]
    MissingEndpoint,

    #[error("could not reach reconciliation service {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("reconciliation service {endpoint} returned status {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("reconciliation service returned {actual} results for {expected} queries")]
    ResultCount { expected: usize, actual: usize },

    #[error("reconciliation response has no result for query {0}")]
    MissingResult(usize),

    #[error("invalid reconciliation response: {0}")]
    InvalidResponse(String),

    #[error("no match for {0} and placeholders are disabled")]
    NoMatch(String),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// One query: free text, optional type IRI, optional (property, value) filters
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileRequest {
    pub query: String,
    pub target_type: Option<String>,
    pub filters: Vec<(String, String)>,
}

impl ReconcileRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            target_type: None,
            filters: Vec::new(),
        }
    }

    pub fn with_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn with_filter(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((property.into(), value.into()));
        self
    }
}

/// A candidate returned by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(rename = "match", default)]
    pub matched: bool,
}

/// Outcome of one query: an exact match, or the candidates to record
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchResult {
    pub matched: Option<MatchEntry>,
    pub candidates: Vec<MatchEntry>,
}

impl MatchResult {
    /// A single candidate flagged as a match is an exact match; anything
    /// else leaves every entry as a candidate.
    pub fn from_entries(mut entries: Vec<MatchEntry>) -> Self {
        if entries.len() == 1 && entries[0].matched {
            Self {
                matched: entries.pop(),
                candidates: Vec::new(),
            }
        } else {
            Self {
                matched: None,
                candidates: entries,
            }
        }
    }

    pub fn is_match(&self) -> bool {
        self.matched.is_some()
    }
}

impl std::fmt::Display for MatchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.matched {
            Some(m) => write!(f, "matched {} = {}", m.name.as_deref().unwrap_or(""), m.id),
            None if self.candidates.is_empty() => write!(f, "no match"),
            None => {
                let names: Vec<String> = self
                    .candidates
                    .iter()
                    .map(|c| format!("{} matched at {}", c.name.as_deref().unwrap_or(""), c.score))
                    .collect();
                write!(f, "possible matches [{}]", names.join(", "))
            }
        }
    }
}

/// The identifier chosen for a (key, type) pair, kept for the rest of the run
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciliationRecord {
    pub key: String,
    pub target_type: Option<String>,
    pub id: Term,
    pub result: MatchResult,
}

/// A matching service.
///
/// Given N requests, implementations return exactly N results in order.
pub trait Reconciler {
    fn reconcile(
        &self,
        endpoint: &str,
        requests: &[ReconcileRequest],
    ) -> ReconcileResult<Vec<MatchResult>>;
}

#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl ReconcilerConfig {
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Blocking HTTP client for the batch reconciliation protocol
pub struct HttpReconciler {
    agent: ureq::Agent,
}

impl HttpReconciler {
    pub fn new(config: &ReconcilerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { agent }
    }
}

impl Default for HttpReconciler {
    fn default() -> Self {
        Self::new(&ReconcilerConfig::default())
    }
}

#[derive(Serialize)]
struct WireQuery<'r> {
    query: &'r str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    target_type: Option<&'r str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    properties: Vec<WireFilter<'r>>,
}

#[derive(Serialize)]
struct WireFilter<'r> {
    pid: &'r str,
    v: &'r str,
}

#[derive(Deserialize)]
struct WireResult {
    #[serde(default)]
    result: Vec<MatchEntry>,
}

/// The `queries` form field: `{"0": {...}, "1": {...}}`
fn encode_queries(requests: &[ReconcileRequest]) -> ReconcileResult<String> {
    let batch: BTreeMap<String, WireQuery<'_>> = requests
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let query = WireQuery {
                query: &r.query,
                target_type: r.target_type.as_deref(),
                properties: r
                    .filters
                    .iter()
                    .map(|(pid, v)| WireFilter { pid, v })
                    .collect(),
            };
            (i.to_string(), query)
        })
        .collect();
    serde_json::to_string(&batch).map_err(|e| ReconcileError::InvalidResponse(e.to_string()))
}

/// Order the keyed response back into request order
fn decode_results(body: &str, expected: usize) -> ReconcileResult<Vec<MatchResult>> {
    let keyed: BTreeMap<String, WireResult> =
        serde_json::from_str(body).map_err(|e| ReconcileError::InvalidResponse(e.to_string()))?;
    if keyed.len() != expected {
        return Err(ReconcileError::ResultCount {
            expected,
            actual: keyed.len(),
        });
    }
    let mut ordered: Vec<Option<MatchResult>> = vec![None; expected];
    for (key, result) in keyed {
        let index: usize = key
            .parse()
            .map_err(|_| ReconcileError::InvalidResponse(format!("unexpected result key {}", key)))?;
        let slot = ordered
            .get_mut(index)
            .ok_or_else(|| ReconcileError::InvalidResponse(format!("result key {} out of range", key)))?;
        *slot = Some(MatchResult::from_entries(result.result));
    }
    ordered
        .into_iter()
        .enumerate()
        .map(|(i, r)| r.ok_or(ReconcileError::MissingResult(i)))
        .collect()
}

impl Reconciler for HttpReconciler {
    fn reconcile(
        &self,
        endpoint: &str,
        requests: &[ReconcileRequest],
    ) -> ReconcileResult<Vec<MatchResult>> {
        let queries = encode_queries(requests)?;
        tracing::debug!(endpoint = %endpoint, queries = requests.len(), "sending reconciliation batch");

        match self.agent.post(endpoint).send_form(&[("queries", &queries)]) {
            Ok(response) => {
                let body = response
                    .into_string()
                    .map_err(|e| ReconcileError::InvalidResponse(e.to_string()))?;
                decode_results(&body, requests.len())
            }
            Err(ureq::Error::Status(status, response)) => Err(ReconcileError::Status {
                endpoint: endpoint.to_string(),
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => Err(ReconcileError::Transport {
                endpoint: endpoint.to_string(),
                message: transport.to_string(),
            }),
        }
    }
}
