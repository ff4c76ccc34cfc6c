//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::validation::ValidationReport;

/// Errors that abort a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A record (or the corpus document) has a shape the pipeline cannot classify.
    ///
    /// Fatal: the run aborts before any artifact is written.
    #[error(
        "configuration shape error in trait '{trait_id}': `{field}` expected {expected}, got {actual}"
    )]
    ConfigurationShape {
        trait_id: String,
        field: String,
        expected: String,
        actual: String,
    },

    /// The pipeline configuration is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The source corpus could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The source corpus is not valid JSON.
    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An artifact could not be staged or committed.
    #[error("cannot write artifact {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An artifact could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// One or more validation checks failed; nothing was written.
    #[error("validation failed with {} error(s)", .0.failures().len())]
    Validation(ValidationReport),
}

impl PipelineError {
    pub(crate) fn shape(
        trait_id: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ConfigurationShape {
            trait_id: trait_id.into(),
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether the error came from the validation gate rather than the input.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
