//! Analyst error types.
//!
//! Every failure mode has a named variant. No stringly-typed errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalystError {
    /// Input does not match any supported schema, is empty, or carries
    /// inconsistent row semantics. Fatal: aborts the run.
    #[error("Data validation failed: {0}")]
    DataValidation(String),

    /// Splitting, merging, or aggregating the working table failed.
    /// Fatal: no partial feature bundle is returned.
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// A single check's internal computation failed. Caught by the engine;
    /// the remaining checks still run.
    #[error("Check '{check}' failed: {reason}")]
    CheckExecution { check: String, reason: String },

    /// Unsupported industry or a missing context key.
    #[error("Context error: {0}")]
    Context(String),
}

/// Result type alias for analyst operations.
pub type AnalystResult<T> = Result<T, AnalystError>;
