//! Error taxonomy for the aggregation and comparison pipeline
//!
//! Every stage validates its own preconditions and fails fast with one of
//! these variants. Messages carry the group, trial, column or metric that
//! caused the failure so the caller can report it verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid setup: missing input folder, empty group, duplicate name,
    /// wrong number of groups for a comparison, invalid configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Input data does not have the expected shape
    #[error("Data error in {source_name}: {message}")]
    Data {
        source_name: String,
        message: String,
    },

    /// A statistical test cannot run on the given samples
    #[error("Statistical error for metric '{metric}': {message}")]
    Statistical { metric: String, message: String },

    /// Lookup by name failed
    #[error("Group not found: {0}")]
    NotFound(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn data(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Data {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn statistical(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Statistical {
            metric: metric.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
