//! Gemini backend over the Generative Language REST API.
//!
//! # Example
//!
//! ```rust,no_run
//! use kanva_model::{Content, GeminiModel, Llm, LlmRequest};
//!
//! # async fn run() -> kanva_model::Result<()> {
//! let model = GeminiModel::new("your-api-key", "gemini-2.0-flash")?;
//! let response = model
//!     .generate_content(LlmRequest::new("gemini-2.0-flash", vec![Content::user("Привет")]))
//!     .await?;
//! println!("{}", response.text);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use kanva_telemetry::redact_sensitive;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{ModelError, Result};
use crate::llm::{Content, GenerateContentConfig, Llm, LlmRequest, LlmResponse, Role};

/// The default Generative Language API base URL.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini client. The API key is sent in the `x-goog-api-key` header.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiModel {
    /// Create a client whose default model is `model`.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelError::Config("Gemini API key must not be empty".into()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: GEMINI_API_BASE.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/models/{model}:generateContent", self.base_url.trim_end_matches('/'))
    }
}

// ── Gemini API request/response types ──────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent<'a>>,
    contents: Vec<ApiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig<'a>>,
}

#[derive(Serialize)]
struct ApiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(request: &'a LlmRequest) -> Self {
        let contents = request
            .contents
            .iter()
            .map(|c: &Content| ApiContent {
                role: Some(match c.role {
                    Role::User => "user",
                    Role::Model => "model",
                }),
                parts: vec![ApiPart { text: &c.text }],
            })
            .collect();

        Self {
            system_instruction: request
                .system_instruction
                .as_deref()
                .map(|text| ApiContent { role: None, parts: vec![ApiPart { text }] }),
            contents,
            generation_config: request.config.as_ref().map(|c: &GenerateContentConfig| {
                ApiGenerationConfig {
                    temperature: c.temperature,
                    top_p: c.top_p,
                    max_output_tokens: c.max_output_tokens,
                    response_mime_type: c.response_mime_type.as_deref(),
                }
            }),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl GenerateContentResponse {
    fn into_text(self, model: &str) -> Result<(String, Option<String>)> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::provider(model, format!("prompt blocked: {reason}")));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::provider(model, "response contained no candidates"))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ModelError::provider(model, "response contained no text"));
        }
        Ok((text, candidate.finish_reason))
    }
}

// ── Llm implementation ─────────────────────────────────────────────

#[async_trait]
impl Llm for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate_content(&self, request: LlmRequest) -> Result<LlmResponse> {
        let model = if request.model.is_empty() { self.model.clone() } else { request.model.clone() };
        let body = GenerateContentRequest::from_request(&request);
        debug!(model = %model, contents = request.contents.len(), "sending generateContent");

        let response = self
            .client
            .post(self.endpoint(&model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = redact_sensitive(&e.to_string()).into_owned();
                error!(model = %model, error = %message, "request failed");
                ModelError::provider(&model, format!("request failed: {message}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            error!(model = %model, %status, "API error");
            return Err(ModelError::provider(
                &model,
                redact_sensitive(&format!("API returned {status}: {detail}")).into_owned(),
            ));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::provider(&model, format!("failed to parse response: {e}")))?;
        let (text, finish_reason) = parsed.into_text(&model)?;

        Ok(LlmResponse { model, text, finish_reason })
    }
}
