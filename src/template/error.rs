//! Errors raised while expanding templates and building statements

use crate::reconcile::ReconcileError;
use thiserror::Error;

/// Errors from expansion and resource/property processing.
///
/// All of these are recoverable at the property boundary; the processor
/// decides whether a failure skips a property, a resource, or a record.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("could not find value for '{0}'")]
    MissingValue(String),

    #[error("could not find function {0}")]
    UnknownFunction(String),

    #[error("could not find property specification {0}")]
    UnknownPropertySpec(String),

    #[error("could not find embedded template called {0}")]
    UnknownEmbedded(String),

    #[error("could not find mapping called {0}")]
    UnknownMapping(String),

    #[error("could not find mapping for {value} in {mapping}")]
    UnmappedValue { mapping: String, value: String },

    #[error("value missing for required property {name}, pattern: {pattern}")]
    RequiredValue { name: String, pattern: String },

    #[error("could not expand uri reference {0}")]
    UriExpansion(String),

    #[error("{function}: {message}")]
    Transform { function: String, message: String },

    #[error("malformed function call '{call}': {message}")]
    CallSyntax { call: String, message: String },

    #[error("expression '{expr}': {message}")]
    Expression { expr: String, message: String },

    #[error("unsupported template for property {0}")]
    UnsupportedTemplate(String),

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl MapError {
    pub(crate) fn transform(function: &str, message: impl Into<String>) -> Self {
        MapError::Transform {
            function: function.to_string(),
            message: message.into(),
        }
    }

    /// True when the error only means "this reference produced no value"
    pub fn is_missing_value(&self) -> bool {
        matches!(self, MapError::MissingValue(_))
    }
}

/// Result type for expansion and processing
pub type MapResult<T> = Result<T, MapError>;
