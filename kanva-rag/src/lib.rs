//! # kanva-rag
//!
//! Chunking, embedding and in-memory similarity retrieval over renovation
//! regulations.
//!
//! ## Overview
//!
//! Rules and law articles are rendered to text, split into overlapping
//! character windows, embedded, and kept in a request-scoped [`RagIndex`].
//! Queries are ranked by cosine similarity.
//!
//! Embedding backends:
//!
//! - [`GeminiEmbeddingProvider`] - Gemini `embedContent` REST API (feature `gemini`, default)
//! - [`LocalEmbeddingProvider`] - locally loaded sentence encoder behind a [`ModelCache`]
//!   (`fastembed` loader with feature `local`)
//! - [`FallbackEmbeddingProvider`] - remote first, local on failure
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kanva_rag::{FallbackEmbeddingProvider, GeminiEmbeddingProvider, RagConfig, build_rag_index};
//!
//! let embedder = FallbackEmbeddingProvider::new(
//!     Arc::new(GeminiEmbeddingProvider::new(api_key)?),
//!     None,
//! );
//! let index = build_rag_index(&rules, &articles, &RagConfig::default(), &embedder).await?;
//! let query = embedder.embed("перепланировка кухни").await?;
//! for text in index.retrieve(&query, 5) {
//!     println!("{text}");
//! }
//! ```
//!
//! ## Invariants
//!
//! Vectors are only comparable when produced by the same provider and model.
//! The index does not check this.

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod index;
pub mod local;
pub mod similarity;

pub use chunking::{FixedSizeChunker, chunk_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{ArticleRecord, Chunk, RuleRecord, SearchResult, SourceKind};
pub use embedding::{EmbeddingProvider, FallbackEmbeddingProvider, ensure_embeddable};
pub use error::{RagError, Result};
#[cfg(feature = "gemini")]
pub use gemini::GeminiEmbeddingProvider;
pub use index::{IndexEntry, RagIndex, build_rag_index, retrieve_relevant_chunks};
#[cfg(feature = "local")]
pub use local::FastEmbedLoader;
pub use local::{
    DEFAULT_LOCAL_MODEL, EncoderLoader, LocalEmbeddingProvider, ModelCache, SentenceEncoder,
};
pub use similarity::{cosine_similarity, rank};
