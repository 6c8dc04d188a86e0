//! A mapping run: one-offs, then every record in order, then finalize

use super::resource::process_resource_spec;
use super::state::{Environment, RunState, TemplateState};
use crate::functions::FunctionRegistry;
use crate::graph::{Dataset, GraphName, StatementSink};
use crate::reconcile::{HttpReconciler, Reconciler, ReconcilerConfig};
use crate::source::SourceError;
use crate::spec::MapperSpec;
use crate::template::{vars, Context, Record, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("{failed} of {rows} records failed, no output produced")]
    RecordsFailed { failed: usize, rows: usize },

    #[error("function library {0} is imported but not registered")]
    UnknownLibrary(String),

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ProcessResult<T> = Result<T, ProcessError>;

/// Run-level settings
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Fail the whole run at finalize if any record failed
    pub abort_on_error: bool,
    pub reconciler: ReconcilerConfig,
}

impl RunConfig {
    pub fn with_abort_on_error(mut self, abort_on_error: bool) -> Self {
        self.abort_on_error = abort_on_error;
        self
    }

    pub fn with_reconciler(mut self, reconciler: ReconcilerConfig) -> Self {
        self.reconciler = reconciler;
        self
    }
}

/// Outcome of a single record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Processed,
    /// At least one resource template failed on this record
    Failed { errors: usize },
}

/// Counts reported by [`TemplateProcessor::finalize`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rows: usize,
    pub failed_rows: usize,
    pub one_off_failures: usize,
    /// Statement count per non-empty graph
    pub statements: Vec<(GraphName, usize)>,
}

impl RunSummary {
    pub fn total_statements(&self) -> usize {
        self.statements.iter().map(|(_, n)| n).sum()
    }
}

/// What a successful run leaves behind
pub struct RunOutput {
    pub sink: Box<dyn StatementSink>,
    pub summary: RunSummary,
}

/// Drives a [`MapperSpec`] over a stream of records.
///
/// ```no_run
/// use mapweave::{MapperSpec, TemplateProcessor};
///
/// let spec = MapperSpec::load("mapping.yaml")?;
/// let mut processor = TemplateProcessor::new(spec, "registrations");
/// # let records: Vec<mapweave::Record> = Vec::new();
/// for record in records {
///     processor.process_row(record)?;
/// }
/// let output = processor.finalize()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct TemplateProcessor {
    env: Environment,
    run: RunState,
    config: RunConfig,
    base: Context,
    custom_reconciler: bool,
    started: bool,
    rows: usize,
    failed_rows: usize,
    one_off_failures: usize,
}

impl TemplateProcessor {
    pub fn new(spec: MapperSpec, source_name: impl Into<String>) -> Self {
        let base = spec
            .root_context()
            .child([(vars::FILE, Value::Str(source_name.into())), (vars::ROW, Value::Null)]);
        let config = RunConfig::default();
        Self {
            env: Environment {
                spec,
                functions: FunctionRegistry::with_builtins(),
                reconciler: Box::new(HttpReconciler::new(&config.reconciler)),
            },
            run: RunState::new(Box::new(Dataset::new())),
            config,
            base,
            custom_reconciler: false,
            started: false,
            rows: 0,
            failed_rows: 0,
            one_off_failures: 0,
        }
    }

    /// Replace the function registry
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.env.functions = functions;
        self
    }

    /// Use a specific matching service instead of the HTTP client
    pub fn with_reconciler(mut self, reconciler: impl Reconciler + 'static) -> Self {
        self.env.reconciler = Box::new(reconciler);
        self.custom_reconciler = true;
        self
    }

    /// Send statements somewhere other than the in-memory dataset
    pub fn with_sink(mut self, sink: Box<dyn StatementSink>) -> Self {
        self.run = RunState::new(sink);
        self
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        if !self.custom_reconciler {
            self.env.reconciler = Box::new(HttpReconciler::new(&config.reconciler));
        }
        self.config = config;
        self
    }

    pub fn spec(&self) -> &MapperSpec {
        &self.env.spec
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.env.functions
    }

    /// Check imported libraries and apply one-off resources.
    ///
    /// Called implicitly by the first [`process_row`](Self::process_row);
    /// later calls do nothing.
    pub fn start(&mut self) -> ProcessResult<()> {
        if self.started {
            return Ok(());
        }
        if let Some(missing) = self
            .env
            .spec
            .function_imports
            .iter()
            .find(|name| !self.env.functions.has_library(name))
        {
            return Err(ProcessError::UnknownLibrary(missing.clone()));
        }
        self.started = true;

        let mut state = TemplateState::new(&self.env, &mut self.run, self.base.clone());
        for one_off in &self.env.spec.one_offs {
            if let Err(e) = process_resource_spec(&one_off.name, one_off, &mut state) {
                tracing::error!(resource = %one_off.name, error = %e, "failed to process one-off resource");
                self.one_off_failures += 1;
            }
        }
        Ok(())
    }

    /// Apply every resource template to one record.
    ///
    /// Resource failures are logged and counted; the record still counts
    /// as processed.
    pub fn process_row(&mut self, record: Record) -> ProcessResult<RowStatus> {
        self.start()?;
        self.rows += 1;
        let row_ctx = self.base.child([(vars::ROW, Value::Int(self.rows as i64))]);
        let ctx = row_ctx.child(record);

        let mut state = TemplateState::new(&self.env, &mut self.run, ctx);
        let mut errors = 0;
        for rs in &self.env.spec.resources {
            if let Err(e) = process_resource_spec(&rs.name, rs, &mut state) {
                tracing::error!(
                    resource = %rs.name,
                    row = self.rows,
                    error = %e,
                    "failed to process resource"
                );
                errors += 1;
            }
        }

        if errors == 0 {
            Ok(RowStatus::Processed)
        } else {
            self.failed_rows += 1;
            Ok(RowStatus::Failed { errors })
        }
    }

    /// Statements produced so far
    pub fn sink(&self) -> &dyn StatementSink {
        self.run.sink()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Finish the run. In abort-on-error mode any failed record fails the
    /// whole run and the statements are discarded.
    pub fn finalize(mut self) -> ProcessResult<RunOutput> {
        self.start()?;
        let sink = self.run.into_sink();
        let summary = RunSummary {
            rows: self.rows,
            failed_rows: self.failed_rows,
            one_off_failures: self.one_off_failures,
            statements: sink
                .graphs()
                .into_iter()
                .map(|g| {
                    let n = sink.len(&g);
                    (g, n)
                })
                .collect(),
        };
        tracing::info!(
            rows = summary.rows,
            failed = summary.failed_rows,
            statements = summary.total_statements(),
            "processed {} lines",
            summary.rows
        );

        if self.config.abort_on_error && (summary.failed_rows > 0 || summary.one_off_failures > 0) {
            return Err(ProcessError::RecordsFailed {
                failed: summary.failed_rows + summary.one_off_failures,
                rows: summary.rows,
            });
        }
        Ok(RunOutput { sink, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Term;

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::str(*v)))
            .collect()
    }

    const SPEC: &str = r#"
globals: {$datasetID: testds}
one_offs:
  - name: dataset
    properties:
      "@id": "<{$datasetBase}/dataset>"
      "@type": "<http://www.w3.org/ns/dcat#Dataset>"
resources:
  - name: registration
    properties:
      "@id": "<row>"
      id: "{id | asInt}"
"#;

    #[test]
    fn rows_are_numbered_from_one() {
        let spec = MapperSpec::from_yaml_str(SPEC).unwrap();
        let mut p = TemplateProcessor::new(spec, "regs");
        p.process_row(record(&[("id", "1")])).unwrap();
        p.process_row(record(&[("id", "2")])).unwrap();
        let subjects: Vec<Term> = p
            .sink()
            .statements(&GraphName::Default)
            .into_iter()
            .map(|s| s.subject)
            .collect();
        let base = "https://epimorphics.com/datasets/testds/data/registration";
        assert!(subjects.contains(&Term::iri(format!("{}/regs-1", base))));
        assert!(subjects.contains(&Term::iri(format!("{}/regs-2", base))));
    }

    #[test]
    fn one_offs_run_once_without_a_row() {
        let spec = MapperSpec::from_yaml_str(SPEC).unwrap();
        let mut p = TemplateProcessor::new(spec, "regs");
        p.start().unwrap();
        p.start().unwrap();
        p.process_row(record(&[("id", "1")])).unwrap();
        let dataset = Term::iri("https://epimorphics.com/datasets/testds/dataset");
        let typed = p
            .sink()
            .statements(&GraphName::Default)
            .into_iter()
            .filter(|s| s.subject == dataset)
            .count();
        assert_eq!(typed, 1);
    }

    #[test]
    fn unregistered_libraries_stop_the_run() {
        let spec = MapperSpec::from_yaml_str(&format!("imports: [crop_parser]\n{}", SPEC)).unwrap();
        let mut p = TemplateProcessor::new(spec, "regs");
        assert!(matches!(p.start(), Err(ProcessError::UnknownLibrary(name)) if name == "crop_parser"));

        let spec = MapperSpec::from_yaml_str(&format!("imports: [crop_parser]\n{}", SPEC)).unwrap();
        let mut p = TemplateProcessor::new(spec, "regs");
        p.functions_mut().register_library("crop_parser", |_| {});
        assert!(p.start().is_ok());
    }

    #[test]
    fn abort_mode_fails_finalize_after_processing_everything() {
        let spec = MapperSpec::from_yaml_str(
            r#"
resources:
  - name: broken
    properties:
      "@id": "<{missing}>"
"#,
        )
        .unwrap();
        let mut p = TemplateProcessor::new(spec, "regs")
            .with_config(RunConfig::default().with_abort_on_error(true));
        assert_eq!(
            p.process_row(record(&[("id", "1")])).unwrap(),
            RowStatus::Failed { errors: 1 }
        );
        assert_eq!(
            p.process_row(record(&[("id", "2")])).unwrap(),
            RowStatus::Failed { errors: 1 }
        );
        assert!(matches!(
            p.finalize(),
            Err(ProcessError::RecordsFailed { failed: 2, rows: 2 })
        ));
    }

    #[test]
    fn summary_counts_rows_and_statements() {
        let spec = MapperSpec::from_yaml_str(SPEC).unwrap().with_auto_declare(false);
        let mut p = TemplateProcessor::new(spec, "regs");
        p.process_row(record(&[("id", "1")])).unwrap();
        let output = p.finalize().unwrap();
        assert_eq!(output.summary.rows, 1);
        assert_eq!(output.summary.failed_rows, 0);
        // one-off type + registration id (no implicit declarations)
        assert_eq!(output.summary.total_statements(), 2);
    }
}
