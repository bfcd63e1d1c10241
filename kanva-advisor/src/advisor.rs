//! The [`Advisor`] context object.

use std::sync::Arc;

use kanva_model::{GeminiModel, Llm, StructuredGenerator};
use kanva_rag::{
    EmbeddingProvider, FallbackEmbeddingProvider, GeminiEmbeddingProvider, LocalEmbeddingProvider,
    ModelCache,
};
use tracing::info;

use crate::config::{AdvisorConfig, EmbeddingStrategy};
use crate::error::{AdvisorError, Result};

/// Plan analysis and chat over one configuration, embedder and generation
/// backend.
///
/// The same embedder instance embeds rule chunks, plan views and chat
/// messages, so every vector in one request lives in the same space unless
/// the remote provider falls back mid-request.
#[derive(Clone)]
pub struct Advisor {
    pub(crate) config: AdvisorConfig,
    pub(crate) embedder: Arc<dyn EmbeddingProvider>,
    pub(crate) generator: StructuredGenerator,
}

impl Advisor {
    /// Assemble an advisor from explicit parts.
    ///
    /// Generation calls are bounded by `config.request_timeout_secs`.
    pub fn new(
        config: AdvisorConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn Llm>,
    ) -> Self {
        let generator = StructuredGenerator::new(llm).with_timeout(config.request_timeout());
        Self { config, embedder, generator }
    }

    /// Build Gemini-backed generation and the embedder selected by
    /// `config.embedding_strategy`.
    ///
    /// With the `local` feature a fastembed model cache is created for the
    /// local strategy and for the remote strategy's fallback.
    ///
    /// # Errors
    ///
    /// Fails when the API key is missing or the local strategy is requested
    /// without the `local` feature.
    pub fn from_config(config: AdvisorConfig) -> Result<Self> {
        #[cfg(feature = "local")]
        let cache = Some(Arc::new(ModelCache::new(Arc::new(kanva_rag::FastEmbedLoader::new()))));
        #[cfg(not(feature = "local"))]
        let cache = None;
        Self::from_config_with_cache(config, cache)
    }

    /// Like [`Advisor::from_config`], loading local models through `cache`.
    ///
    /// Share one cache between advisors to load each local model only once
    /// per process.
    pub fn from_config_with_cache(config: AdvisorConfig, cache: Option<Arc<ModelCache>>) -> Result<Self> {
        config.validate()?;
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| AdvisorError::Config("GEMINI_API_KEY is not set".into()))?;
        let timeout = config.request_timeout();

        let local: Option<Arc<dyn EmbeddingProvider>> = cache.map(|cache| {
            Arc::new(
                LocalEmbeddingProvider::new(cache, config.local_embedding_model.clone()).with_timeout(timeout),
            ) as Arc<dyn EmbeddingProvider>
        });

        let embedder: Arc<dyn EmbeddingProvider> = match config.embedding_strategy {
            EmbeddingStrategy::Remote => {
                let remote = GeminiEmbeddingProvider::new(api_key.clone())?
                    .with_model(config.remote_embedding_model.clone())
                    .with_timeout(timeout);
                Arc::new(FallbackEmbeddingProvider::new(Arc::new(remote), local))
            }
            EmbeddingStrategy::Local => local.ok_or_else(|| {
                AdvisorError::Config(
                    "local embedding strategy requires the `local` feature or a model cache".into(),
                )
            })?,
        };

        let llm = Arc::new(GeminiModel::new(api_key, config.gemini_model.clone())?);
        info!(
            strategy = ?config.embedding_strategy,
            embedder = embedder.name(),
            chat_model = %config.gemini_model,
            "advisor configured"
        );
        Ok(Self::new(config, embedder, llm))
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn generator(&self) -> &StructuredGenerator {
        &self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = Advisor::from_config_with_cache(AdvisorConfig::default(), None).err().unwrap();
        assert!(matches!(err, AdvisorError::Config(msg) if msg.contains("GEMINI_API_KEY")));
    }

    #[test]
    fn local_strategy_needs_a_cache() {
        let config = AdvisorConfig {
            gemini_api_key: Some("test-key".into()),
            embedding_strategy: EmbeddingStrategy::Local,
            ..Default::default()
        };
        let err = Advisor::from_config_with_cache(config, None).err().unwrap();
        assert!(matches!(err, AdvisorError::Config(_)));
    }

    #[test]
    fn remote_strategy_builds_with_a_key() {
        let config = AdvisorConfig { gemini_api_key: Some("test-key".into()), ..Default::default() };
        let advisor = Advisor::from_config_with_cache(config, None).unwrap();
        assert_eq!(advisor.generator().timeout(), std::time::Duration::from_secs(60));
    }
}
