//! Local sentence-encoder embeddings with a shared model cache.
//!
//! Loading a sentence-transformer model is expensive, so [`ModelCache`] keeps
//! every loaded encoder keyed by model name. Loading and encoding both run on
//! tokio's blocking pool.
//!
//! The `fastembed` backed [`FastEmbedLoader`] is available with the `local`
//! feature. Tests and alternative runtimes plug in their own
//! [`EncoderLoader`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::embedding::{EmbeddingProvider, ensure_embeddable};
use crate::error::{RagError, Result};

/// Default local model, as named by sentence-transformers.
pub const DEFAULT_LOCAL_MODEL: &str = "all-MiniLM-L6-v2";

const DEFAULT_DIMENSIONS: usize = 384;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const PROVIDER: &str = "local";

/// A loaded model that turns texts into vectors. Calls are CPU-bound and
/// may block.
pub trait SentenceEncoder: Send + Sync {
    /// Encode `texts`, returning one vector per input in the same order.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of produced vectors.
    fn dimensions(&self) -> usize;
}

/// Loads a [`SentenceEncoder`] by model name. Called on the blocking pool.
pub trait EncoderLoader: Send + Sync {
    fn load(&self, model_name: &str) -> Result<Arc<dyn SentenceEncoder>>;
}

/// Process-wide cache of loaded encoders, keyed by model name.
///
/// Concurrent first use may load the same model more than once; the first
/// load to finish is stored and every caller receives that instance. Entries
/// are never replaced or removed.
pub struct ModelCache {
    loader: Arc<dyn EncoderLoader>,
    models: RwLock<HashMap<String, Arc<dyn SentenceEncoder>>>,
}

impl ModelCache {
    pub fn new(loader: Arc<dyn EncoderLoader>) -> Self {
        Self { loader, models: RwLock::new(HashMap::new()) }
    }

    /// Return the cached encoder for `model_name`, loading it on first use.
    pub async fn get_or_load(&self, model_name: &str) -> Result<Arc<dyn SentenceEncoder>> {
        if let Some(encoder) = self.models.read().await.get(model_name) {
            return Ok(encoder.clone());
        }

        info!(model = model_name, "loading local embedding model");
        let loader = self.loader.clone();
        let name = model_name.to_string();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&name))
            .await
            .map_err(|e| RagError::embedding(PROVIDER, format!("model loading task failed: {e}")))??;

        let mut models = self.models.write().await;
        let encoder = models.entry(model_name.to_string()).or_insert(loaded);
        Ok(encoder.clone())
    }

    /// Whether `model_name` has been loaded.
    pub async fn contains(&self, model_name: &str) -> bool {
        self.models.read().await.contains_key(model_name)
    }

    /// Number of distinct models loaded so far.
    pub async fn len(&self) -> usize {
        self.models.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.models.read().await.is_empty()
    }
}

/// An [`EmbeddingProvider`] that encodes text with a locally loaded model.
pub struct LocalEmbeddingProvider {
    cache: Arc<ModelCache>,
    model_name: String,
    dimensions: usize,
    timeout: Duration,
}

impl LocalEmbeddingProvider {
    /// Create a provider for `model_name` backed by `cache`.
    ///
    /// Several providers may share one cache.
    pub fn new(cache: Arc<ModelCache>, model_name: impl Into<String>) -> Self {
        Self {
            cache,
            model_name: model_name.into(),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the dimensionality reported before the model is loaded.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Bound each load-and-encode call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn encode(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let work = async {
            let encoder = self.cache.get_or_load(&self.model_name).await?;
            tokio::task::spawn_blocking(move || encoder.encode(&texts))
                .await
                .map_err(|e| RagError::embedding(PROVIDER, format!("encoding task failed: {e}")))?
        };

        let vectors = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| RagError::Timeout { provider: PROVIDER.into(), after: self.timeout })??;

        if vectors.len() != expected {
            return Err(RagError::embedding(
                PROVIDER,
                format!("encoder returned {} vectors for {expected} inputs", vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_embeddable(text)?;
        debug!(model = %self.model_name, text_len = text.len(), "local embedding");
        let mut vectors = self.encode(vec![text.to_string()]).await?;
        vectors.pop().ok_or_else(|| RagError::embedding(PROVIDER, "encoder returned no vectors"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for text in texts {
            ensure_embeddable(text)?;
        }
        self.encode(texts.iter().map(|t| t.to_string()).collect()).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(feature = "local")]
pub use fastembed_loader::FastEmbedLoader;

#[cfg(feature = "local")]
mod fastembed_loader {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::{EncoderLoader, PROVIDER, SentenceEncoder};
    use crate::error::{RagError, Result};

    /// Map sentence-transformers model names onto fastembed models.
    fn resolve(model_name: &str) -> Option<(EmbeddingModel, usize)> {
        let name = model_name.trim_start_matches("sentence-transformers/");
        match name.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" => Some((EmbeddingModel::AllMiniLML6V2, 384)),
            "all-minilm-l12-v2" => Some((EmbeddingModel::AllMiniLML12V2, 384)),
            "paraphrase-multilingual-minilm-l12-v2" => {
                Some((EmbeddingModel::ParaphraseMLMiniLML12V2, 384))
            }
            "bge-small-en-v1.5" | "baai/bge-small-en-v1.5" => {
                Some((EmbeddingModel::BGESmallENV15, 384))
            }
            "multilingual-e5-small" | "intfloat/multilingual-e5-small" => {
                Some((EmbeddingModel::MultilingualE5Small, 384))
            }
            _ => None,
        }
    }

    /// Loads models through `fastembed` (ONNX runtime).
    #[derive(Debug, Clone, Default)]
    pub struct FastEmbedLoader {
        cache_dir: Option<PathBuf>,
    }

    impl FastEmbedLoader {
        pub fn new() -> Self {
            Self::default()
        }

        /// Directory where downloaded model files are kept.
        pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
            self.cache_dir = Some(dir.into());
            self
        }
    }

    impl EncoderLoader for FastEmbedLoader {
        fn load(&self, model_name: &str) -> Result<Arc<dyn SentenceEncoder>> {
            let (model, dimensions) = resolve(model_name).ok_or_else(|| {
                RagError::ConfigError(format!("unsupported local embedding model: {model_name}"))
            })?;

            let mut options = InitOptions::new(model).with_show_download_progress(false);
            if let Some(dir) = &self.cache_dir {
                options = options.with_cache_dir(dir.clone());
            }
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| RagError::embedding(PROVIDER, format!("failed to load {model_name}: {e}")))?;

            Ok(Arc::new(FastEmbedEncoder { inner: Mutex::new(embedding), dimensions }))
        }
    }

    /// `TextEmbedding::embed` takes `&mut self`, hence the mutex.
    struct FastEmbedEncoder {
        inner: Mutex<TextEmbedding>,
        dimensions: usize,
    }

    impl SentenceEncoder for FastEmbedEncoder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut model = self
                .inner
                .lock()
                .map_err(|_| RagError::embedding(PROVIDER, "encoder lock poisoned"))?;
            model
                .embed(texts.to_vec(), None)
                .map_err(|e| RagError::embedding(PROVIDER, format!("encoding failed: {e}")))
        }

        fn dimensions(&self) -> usize {
            self.dimensions
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sentence_transformer_names_resolve() {
            assert!(resolve("all-MiniLM-L6-v2").is_some());
            assert!(resolve("sentence-transformers/all-MiniLM-L6-v2").is_some());
            assert!(resolve("no-such-model").is_none());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct LengthEncoder;

    impl SentenceEncoder for LengthEncoder {
        fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![t.chars().count() as f32, 1.0]).collect())
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
    }

    impl EncoderLoader for CountingLoader {
        fn load(&self, model_name: &str) -> Result<Arc<dyn SentenceEncoder>> {
            if model_name == "missing" {
                return Err(RagError::embedding(PROVIDER, "model not found"));
            }
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(LengthEncoder))
        }
    }

    #[tokio::test]
    async fn model_is_loaded_once() {
        let loader = Arc::new(CountingLoader::default());
        let cache = Arc::new(ModelCache::new(loader.clone()));
        let provider = LocalEmbeddingProvider::new(cache.clone(), DEFAULT_LOCAL_MODEL);

        assert_eq!(provider.embed("окно").await.unwrap(), vec![4.0, 1.0]);
        assert_eq!(provider.embed("дверь").await.unwrap(), vec![5.0, 1.0]);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert!(cache.contains(DEFAULT_LOCAL_MODEL).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_keeps_a_single_entry() {
        let cache = Arc::new(ModelCache::new(Arc::new(CountingLoader::default())));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get_or_load("m").await.map(|_| ()) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cache.len().await, 1);
        let first = cache.get_or_load("m").await.unwrap();
        let second = cache.get_or_load("m").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn load_failure_is_not_cached() {
        let cache = Arc::new(ModelCache::new(Arc::new(CountingLoader::default())));
        let provider = LocalEmbeddingProvider::new(cache.clone(), "missing");
        assert!(matches!(provider.embed("стена").await, Err(RagError::EmbeddingError { .. })));
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let cache = Arc::new(ModelCache::new(Arc::new(CountingLoader::default())));
        let provider = LocalEmbeddingProvider::new(cache, "m");
        let vectors = provider.embed_batch(&["a", "abc", "ab"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 1.0], vec![3.0, 1.0], vec![2.0, 1.0]]);
        assert!(matches!(provider.embed_batch(&["a", ""]).await, Err(RagError::EmptyInput)));
    }
}
