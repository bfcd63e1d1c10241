//! Embedding provider trait and the remote-with-local-fallback strategy.

use std::sync::Arc;

use async_trait::async_trait;
use kanva_telemetry::redact_sensitive;
use tracing::{debug, warn};

use crate::error::{RagError, Result};

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends (Gemini, a local
/// sentence-transformer, ...) behind a unified async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) implementation calls
/// [`embed`](EmbeddingProvider::embed) sequentially.
///
/// Implementations must reject empty or whitespace-only text with
/// [`RagError::EmptyInput`] and bound every external call with a timeout.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name used in logs and errors.
    fn name(&self) -> &str;

    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs, in order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Reject text that cannot be embedded.
pub fn ensure_embeddable(text: &str) -> Result<()> {
    if text.trim().is_empty() { Err(RagError::EmptyInput) } else { Ok(()) }
}

/// Tries `primary` first and, on any provider failure, `fallback`.
///
/// Input errors are returned immediately without consulting the fallback.
/// The primary failure is logged after credential redaction. Note that the two
/// strategies normally produce vectors of different dimensionality: an index
/// built while the primary was flapping may mix them.
pub struct FallbackEmbeddingProvider {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Option<Arc<dyn EmbeddingProvider>>,
}

impl FallbackEmbeddingProvider {
    /// Wrap `primary` with an optional `fallback`.
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        fallback: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl EmbeddingProvider for FallbackEmbeddingProvider {
    fn name(&self) -> &str {
        self.primary.name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_embeddable(text)?;

        let primary_err = match self.primary.embed(text).await {
            Ok(embedding) => return Ok(embedding),
            Err(e) if e.is_input_error() => return Err(e),
            Err(e) => redact_sensitive(&e.to_string()).into_owned(),
        };

        let Some(fallback) = &self.fallback else {
            warn!(provider = self.primary.name(), error = %primary_err, "embedding failed, no fallback configured");
            return Err(RagError::EmbeddingUnavailable {
                primary: primary_err,
                fallback: "no fallback configured".to_string(),
            });
        };

        warn!(
            provider = self.primary.name(),
            fallback = fallback.name(),
            error = %primary_err,
            "embedding failed, using fallback provider"
        );

        match fallback.embed(text).await {
            Ok(embedding) => {
                debug!(provider = fallback.name(), "fallback embedding succeeded");
                Ok(embedding)
            }
            Err(e) => Err(RagError::EmbeddingUnavailable {
                primary: primary_err,
                fallback: redact_sensitive(&e.to_string()).into_owned(),
            }),
        }
    }

    fn dimensions(&self) -> usize {
        self.primary.dimensions()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Fixed {
        name: &'static str,
        result: std::result::Result<Vec<f32>, &'static str>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn ok(name: &'static str, v: Vec<f32>) -> Arc<Self> {
            Arc::new(Self { name, result: Ok(v), calls: AtomicUsize::new(0) })
        }

        fn failing(name: &'static str, message: &'static str) -> Arc<Self> {
            Arc::new(Self { name, result: Err(message), calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for Fixed {
        fn name(&self) -> &str {
            self.name
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            ensure_embeddable(text)?;
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().map_err(|m| RagError::embedding(self.name, m))
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn primary_success_skips_fallback() {
        let local = Fixed::ok("local", vec![0.0, 1.0]);
        let provider =
            FallbackEmbeddingProvider::new(Fixed::ok("remote", vec![1.0, 0.0]), Some(local.clone()));
        assert_eq!(provider.embed("стена").await.unwrap(), vec![1.0, 0.0]);
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn primary_failure_uses_fallback() {
        let provider = FallbackEmbeddingProvider::new(
            Fixed::failing("remote", "connection reset"),
            Some(Fixed::ok("local", vec![0.0, 1.0])),
        );
        assert_eq!(provider.embed("стена").await.unwrap(), vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn both_failing_is_unavailable_and_redacted() {
        let provider = FallbackEmbeddingProvider::new(
            Fixed::failing("remote", "API key not valid"),
            Some(Fixed::failing("local", "model file missing")),
        );
        let err = provider.embed("стена").await.unwrap_err();
        match err {
            RagError::EmbeddingUnavailable { primary, fallback } => {
                assert_eq!(primary, kanva_telemetry::REDACTED_NOTICE);
                assert!(fallback.contains("model file missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_input_is_not_retried() {
        let remote = Fixed::ok("remote", vec![1.0, 0.0]);
        let local = Fixed::ok("local", vec![0.0, 1.0]);
        let provider = FallbackEmbeddingProvider::new(remote.clone(), Some(local.clone()));
        assert!(matches!(provider.embed("   ").await, Err(RagError::EmptyInput)));
        assert_eq!(remote.calls.load(Ordering::SeqCst) + local.calls.load(Ordering::SeqCst), 0);
    }
}
