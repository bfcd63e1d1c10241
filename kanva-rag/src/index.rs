//! Request-scoped in-memory retrieval index.
//!
//! A [`RagIndex`] is built from rule and article records, queried, and
//! dropped with the request that built it. It is never mutated after build.
//!
//! # Example
//!
//! ```rust,ignore
//! use kanva_rag::{RagConfig, build_rag_index, retrieve_relevant_chunks};
//!
//! let index = build_rag_index(&rules, &articles, &RagConfig::default(), &embedder).await?;
//! let query = embedder.embed("снос несущей стены").await?;
//! let chunks = retrieve_relevant_chunks(&query, &index, 5);
//! ```

use std::collections::HashMap;

use tracing::{debug, error, info, instrument};

use crate::chunking::FixedSizeChunker;
use crate::config::RagConfig;
use crate::document::{ArticleRecord, Chunk, RuleRecord, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::similarity::rank;

/// A chunk together with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// An ordered collection of embedded chunks.
///
/// Insertion order is rules first, then articles, each in input order.
#[derive(Debug, Clone, Default)]
pub struct RagIndex {
    entries: Vec<IndexEntry>,
}

impl RagIndex {
    /// Build an index by rendering, chunking and embedding every record.
    ///
    /// Records that render to empty text contribute no chunks, and
    /// whitespace-only windows are skipped. Chunks are embedded one record at
    /// a time, in order.
    ///
    /// # Errors
    ///
    /// Fails on the first embedding error; no partial index is returned.
    #[instrument(skip_all, fields(rules = rules.len(), articles = articles.len(), provider = embedder.name()))]
    pub async fn build(
        rules: &[RuleRecord],
        articles: &[ArticleRecord],
        chunker: &FixedSizeChunker,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        let mut index = Self::default();

        for rule in rules {
            index.add_record(&rule.render(), rule.metadata(), chunker, embedder).await?;
        }
        for article in articles {
            index.add_record(&article.render(), article.metadata(), chunker, embedder).await?;
        }

        info!(chunk_count = index.len(), "built RAG index");
        Ok(index)
    }

    async fn add_record(
        &mut self,
        text: &str,
        metadata: HashMap<String, String>,
        chunker: &FixedSizeChunker,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<()> {
        // Windows cut from trailing whitespace carry nothing to embed.
        let pieces: Vec<String> = chunker.chunk(text).into_iter().filter(|c| !c.trim().is_empty()).collect();
        if pieces.is_empty() {
            debug!(source = ?metadata.get("type"), "record rendered empty, skipping");
            return Ok(());
        }

        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let embeddings = embedder.embed_batch(&refs).await.map_err(|e| {
            error!(provider = embedder.name(), error = %e, "failed to embed chunks");
            e
        })?;

        for (chunk_index, (text, embedding)) in pieces.into_iter().zip(embeddings).enumerate() {
            let mut metadata = metadata.clone();
            metadata.insert("chunk_index".to_string(), chunk_index.to_string());
            self.entries.push(IndexEntry { chunk: Chunk { text, metadata }, embedding });
        }
        Ok(())
    }

    /// Return up to `top_k` chunks ranked by similarity to `query`.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchResult> {
        let candidates = self.entries.iter().map(|e| (&e.chunk, e.embedding.as_slice()));
        rank(query, candidates, top_k)
            .into_iter()
            .map(|(chunk, score)| SearchResult { chunk: chunk.clone(), score })
            .collect()
    }

    /// Return the texts of up to `top_k` chunks ranked by similarity to `query`.
    ///
    /// An empty index yields an empty result.
    pub fn retrieve(&self, query: &[f32], top_k: usize) -> Vec<String> {
        let candidates = self.entries.iter().map(|e| (&e.chunk.text, e.embedding.as_slice()));
        rank(query, candidates, top_k).into_iter().map(|(text, _)| text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Build a [`RagIndex`] using the chunking parameters from `config`.
pub async fn build_rag_index(
    rules: &[RuleRecord],
    articles: &[ArticleRecord],
    config: &RagConfig,
    embedder: &dyn EmbeddingProvider,
) -> Result<RagIndex> {
    let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?;
    RagIndex::build(rules, articles, &chunker, embedder).await
}

/// Return the texts of the `top_k` chunks of `index` most similar to `query`.
pub fn retrieve_relevant_chunks(query: &[f32], index: &RagIndex, top_k: usize) -> Vec<String> {
    index.retrieve(query, top_k)
}
