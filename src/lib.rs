//! Mapweave: Template-Driven Record-to-RDF Mapping
//!
//! Converts streams of flat or nested records (CSV rows, JSON lines) into
//! RDF statements, driven by a declarative YAML mapping specification.
//!
//! # Core Concepts
//!
//! - **Specs**: resource templates, property specs, namespaces and mapping tables
//! - **Templates**: `{var | fn}` patterns expanded against a scoped context
//! - **Sinks**: partitioned statement sets, serialized as N-Quads or as a
//!   differential SPARQL update
//!
//! # Example
//!
//! ```
//! use mapweave::{MapperSpec, Record, TemplateProcessor, Value};
//!
//! let spec = MapperSpec::from_yaml_str(
//!     "resources:\n  - name: farm\n    properties:\n      '<rdfs:label>': '{name}'\n",
//! )
//! .unwrap();
//! let mut processor = TemplateProcessor::new(spec, "farms");
//! let record: Record = [("name".to_string(), Value::str("Low Farm"))].into_iter().collect();
//! processor.process_row(record).unwrap();
//! assert!(processor.finalize().unwrap().summary.total_statements() > 0);
//! ```

pub mod functions;
pub mod graph;
pub mod output;
pub mod processor;
pub mod reconcile;
pub mod source;
pub mod spec;
pub mod template;

pub use functions::FunctionRegistry;
pub use graph::{Dataset, GraphName, Literal, Statement, StatementSink, Term};
pub use output::{OutputFormat, write_output};
pub use processor::{ProcessError, ProcessResult, RowStatus, RunConfig, RunOutput, RunSummary, TemplateProcessor};
pub use reconcile::{HttpReconciler, ReconcileError, Reconciler, ReconcilerConfig};
pub use spec::{MapperSpec, SpecError, SpecResult};
pub use template::{MapError, MapResult, Record, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
