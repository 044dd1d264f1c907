//! Error types for the evaluation pipeline.
//!
//! All fatal conditions abort the run before any metric is produced; a
//! per-query "no valid match" is a recorded skip, not an error (see
//! `ranking`).

use thiserror::Error;

/// Result type for evaluation operations.
pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    /// A zero-norm embedding row cannot be L2-normalized; substituting a
    /// default would corrupt similarity semantics, so the run aborts.
    #[error("degenerate embedding at row {index}: norm = {norm}")]
    DegenerateEmbedding { index: usize, norm: f64 },

    /// After duplicate exclusion no query has any valid gallery match.
    #[error("no query appears in the gallery")]
    NoValidQuery,

    /// Parallel arrays disagree on length or dimensionality.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
