//! Error types for the `kanva-advisor` crate.

use kanva_model::ModelError;
use kanva_rag::RagError;
use thiserror::Error;

/// Errors surfaced by plan analysis and chat.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// The plan document violates a geometry or range invariant.
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Chunking, embedding or indexing failed.
    #[error(transparent)]
    Rag(#[from] RagError),

    /// Generation failed on every attempted model.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A convenience result type for advisor operations.
pub type Result<T> = std::result::Result<T, AdvisorError>;
