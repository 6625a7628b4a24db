use thiserror::Error;

use crate::types::RetrievalPath;

/// Failure taxonomy of the retrieval pipeline.
///
/// Backend implementations report `anyhow` errors; the retrieval adapters
/// convert them into `Backend` before they reach the pipeline, and only the
/// pipeline decides between degradation and a caller-visible failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{path} retrieval failed: {message}")]
    Backend { path: RetrievalPath, message: String },

    #[error("Both retrieval paths failed (vector: {vector}; lexical: {lexical})")]
    FusionUnavailable { vector: String, lexical: String },

    #[error("Result cache unavailable: {0}")]
    Cache(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    pub fn backend(path: RetrievalPath, err: impl std::fmt::Display) -> Self {
        Self::Backend { path, message: err.to_string() }
    }

    /// Service-unavailable conditions a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FusionUnavailable { .. } | Self::Backend { .. })
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
