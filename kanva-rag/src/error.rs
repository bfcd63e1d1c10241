//! Error types for the `kanva-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while chunking, embedding or indexing.
#[derive(Debug, Error)]
pub enum RagError {
    /// The text handed to an embedding provider was empty or whitespace-only.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// An embedding provider failed.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding provider did not answer within its time budget.
    #[error("Embedding timed out ({provider}) after {after:?}")]
    Timeout {
        /// The embedding provider that timed out.
        provider: String,
        /// The configured budget.
        after: Duration,
    },

    /// Both the selected embedding strategy and its fallback failed.
    #[error("Embedding unavailable: primary failed ({primary}); fallback failed ({fallback})")]
    EmbeddingUnavailable {
        /// Redacted description of the primary failure.
        primary: String,
        /// Redacted description of the fallback failure, or why none ran.
        fallback: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    /// Build an [`RagError::EmbeddingError`] for `provider`.
    pub fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingError { provider: provider.into(), message: message.into() }
    }

    /// `true` for caller mistakes that no fallback can fix.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::ConfigError(_))
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
