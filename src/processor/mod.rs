//! Template processing: applying resource templates to records
//!
//! [`TemplateProcessor`] owns a run. Each record is bound into a fresh
//! context scope and every resource template of the spec is applied to it;
//! statements accumulate in the run's [`StatementSink`](crate::graph::StatementSink).

pub mod resource;
pub mod run;
pub mod state;

pub use resource::{process_property_value, process_resource_spec};
pub use run::{ProcessError, ProcessResult, RowStatus, RunConfig, RunOutput, RunSummary, TemplateProcessor};
pub use state::{DeclarationKind, Environment, RunState, TemplateState};
