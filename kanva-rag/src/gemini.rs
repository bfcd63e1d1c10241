//! Gemini embedding provider using the Generative Language REST API.
//!
//! This module is only available when the `gemini` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use kanva_telemetry::redact_sensitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, ensure_embeddable};
use crate::error::{RagError, Result};

/// The default Generative Language API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// The default embedding model.
const DEFAULT_MODEL: &str = "text-embedding-004";

/// The dimensionality of `text-embedding-004`.
const DEFAULT_DIMENSIONS: usize = 768;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "Gemini";

/// An [`EmbeddingProvider`] backed by the Gemini `embedContent` endpoint.
///
/// The API key travels in the `x-goog-api-key` header so it never appears in
/// request URLs (and therefore never in `reqwest` error messages).
///
/// # Example
///
/// ```rust,ignore
/// use kanva_rag::gemini::GeminiEmbeddingProvider;
///
/// let provider = GeminiEmbeddingProvider::new("your-api-key")?;
/// let embedding = provider.embed("несущая стена").await?;
/// ```
pub struct GeminiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    timeout: Duration,
}

impl GeminiEmbeddingProvider {
    /// Create a new provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("Gemini API key must not be empty".into()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: GEMINI_API_BASE.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Set the model name (with or without the `models/` prefix).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the dimensionality reported by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Point the provider at a different API base (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model_path();
        let url = format!("{}/{model}:embedContent", self.base_url.trim_end_matches('/'));
        let body = EmbedContentRequest {
            model: &model,
            content: RequestContent { parts: vec![RequestPart { text }] },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = redact_sensitive(&e.to_string()).into_owned();
                error!(provider = PROVIDER, error = %message, "request failed");
                RagError::embedding(PROVIDER, format!("request failed: {message}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            let message = redact_sensitive(&format!("API returned {status}: {detail}")).into_owned();

            error!(provider = PROVIDER, %status, "API error");
            return Err(RagError::embedding(PROVIDER, message));
        }

        let parsed: EmbedContentResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            RagError::embedding(PROVIDER, format!("failed to parse response: {e}"))
        })?;

        if parsed.embedding.values.is_empty() {
            return Err(RagError::embedding(PROVIDER, "API returned an empty embedding"));
        }
        Ok(parsed.embedding.values)
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: RequestContent<'a>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for GeminiEmbeddingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        ensure_embeddable(text)?;
        debug!(provider = PROVIDER, model = %self.model, text_len = text.len(), "embedding text");

        tokio::time::timeout(self.timeout, self.request(text))
            .await
            .map_err(|_| RagError::Timeout { provider: PROVIDER.into(), after: self.timeout })?
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
