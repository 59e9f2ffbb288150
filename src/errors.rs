//! Error types for the agroadvisor pipeline
//!
//! Configuration and generation errors propagate unmodified to the caller;
//! empty retrieval or signal results are never errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discriminant for generation backend failures.
///
/// Replaces string-coded error text ("quota_exceeded" etc.) with a
/// tagged kind that callers can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    /// Backend rejected the request because the quota is exhausted
    QuotaExceeded,

    /// Backend rejected the request because the account has no credit
    InsufficientCredit,

    /// Any other backend-side failure
    Backend,
}

impl std::fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::InsufficientCredit => "insufficient_credit",
            Self::Backend => "backend",
        };
        f.write_str(s)
    }
}

/// Main error type for the advisor pipeline
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Wiring errors, e.g. a remote vector provider selected without a client
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generation adapter failures; never caught inside the pipeline
    #[error("Generation error ({kind}): {message}")]
    Generation {
        kind: GenerationErrorKind,
        message: String,
    },

    /// Invalid chunking parameters and similar caller mistakes
    #[error("Validation error: {0}")]
    Validation(String),

    /// No current value for a requested entity
    #[error("Not found: {0}")]
    NotFound(String),

    /// Streaming transport errors
    #[error("Streaming error: {0}")]
    Streaming(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdvisorError {
    /// Shorthand for a tagged generation error.
    pub fn generation(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self::Generation {
            kind,
            message: message.into(),
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AdvisorError>;
