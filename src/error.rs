//! Error types for the prediction pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while training or serving predictions.
///
/// Missing features and zero denominators are deliberately absent: both are
/// recovered from inside the pipeline and never surface as errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Request payload is not valid JSON or not a JSON object
    #[error("{0}")]
    InvalidInput(String),

    /// A persisted model, scaler, metadata or feature-list file could not be used
    #[error("{path}: {reason}")]
    ArtifactLoad {
        /// Artifact that failed to load
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Training table problem (duplicate columns, missing target, bad CSV)
    #[error("data error: {0}")]
    Data(String),

    /// Model fitting failed
    #[error("training error: {0}")]
    Training(String),

    /// Feature vector does not match a fitted model or scaler
    #[error("inference error: {0}")]
    Inference(String),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::ArtifactLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from loading persisted artifacts.
    pub fn is_artifact_load(&self) -> bool {
        matches!(self, PipelineError::ArtifactLoad { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_error_display() {
        let err = PipelineError::artifact("models/metadata.json", "No such file or directory");
        assert!(err.is_artifact_load());
        assert_eq!(
            err.to_string(),
            "models/metadata.json: No such file or directory"
        );
    }

    #[test]
    fn test_invalid_input_is_not_artifact_error() {
        let err = PipelineError::InvalidInput("Invalid JSON: expected value".to_string());
        assert!(!err.is_artifact_load());
        assert_eq!(err.to_string(), "Invalid JSON: expected value");
    }
}
