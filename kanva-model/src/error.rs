//! Error types for the `kanva-model` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by LLM backends and the structured generator.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The backend rejected the request or could not be reached.
    #[error("Model error ({model}): {message}")]
    Provider {
        /// The model the request was addressed to.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// The backend did not answer within the per-call budget.
    #[error("Model {model} timed out after {after:?}")]
    Timeout { model: String, after: Duration },

    /// The response could not be parsed as the expected JSON object.
    #[error("Malformed model output: {0}")]
    MalformedOutput(String),

    /// Every model in the fallback list failed.
    #[error("All models failed (tried: {}); last error: {last_error}", models.join(", "))]
    FallbackExhausted {
        /// Models attempted, in order.
        models: Vec<String>,
        /// Redacted description of the final failure.
        last_error: String,
    },

    /// Invalid client or request configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ModelError {
    /// Build a [`ModelError::Provider`] for `model`.
    pub fn provider(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider { model: model.into(), message: message.into() }
    }
}

/// A convenience result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
