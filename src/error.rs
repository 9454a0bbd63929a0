//! Fatal error type for pipeline runs and the delimited-text codec.
//!
//! Row rejections are not errors: they are tracked outcomes recorded in a
//! [`LoadStatistic`](crate::LoadStatistic). The halt signal is not an error
//! either; see [`Flow`](crate::Flow). Everything here aborts the current run.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Underlying cause carried by the wrapping variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum EtlError {
    /// A step's transform failed. `line` is the source line number, or the
    /// rendered row when the row did not come from a numbered source.
    #[error("Line {line}: Error encountered in step {pipeline}.{step}")]
    Step {
        pipeline: String,
        step: String,
        line: String,
        #[source]
        source: BoxError,
    },

    #[error("Could not process header {line}: {text}")]
    Header {
        line: usize,
        text: String,
        #[source]
        source: BoxError,
    },

    #[error("Could not parse line {line}: {text}")]
    Parse {
        line: usize,
        text: String,
        #[source]
        source: BoxError,
    },

    #[error("completion callback of pipeline {pipeline} failed")]
    Callback {
        pipeline: String,
        #[source]
        source: BoxError,
    },

    #[error("column `{column}` is missing ({context})")]
    MissingColumn { column: String, context: String },

    #[error("pipeline `{0}` has already completed and cannot be restarted")]
    Completed(String),

    #[error("pipeline `{0}` was re-entered while processing a row")]
    Reentrant(String),

    #[error("pipeline `{0}` was dropped while a chained pipeline still referred to it")]
    Detached(String),

    #[error("invalid separator {0:?}")]
    Separator(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtlError {
    pub fn missing_column(column: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            context: context.into(),
        }
    }

    /// True when the failure originated inside a step's transform.
    pub fn is_step_failure(&self) -> bool {
        matches!(self, Self::Step { .. })
    }
}
