//! Backend-neutral request and response types and the [`Llm`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Who authored a piece of conversation content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A single turn of text content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub role: Role,
    pub text: String,
}

impl Content {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

/// Sampling and output-format settings for one generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentConfig {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_output_tokens: Option<u32>,
    /// `application/json` requests JSON-only output.
    pub response_mime_type: Option<String>,
}

/// A generation request addressed to one model.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub config: Option<GenerateContentConfig>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self { model: model.into(), system_instruction: None, contents, config: None }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_config(mut self, config: GenerateContentConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// The text a model produced for an [`LlmRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    /// Model that produced the response.
    pub model: String,
    pub text: String,
    pub finish_reason: Option<String>,
}

/// A text-generation backend.
///
/// One backend may serve several models; [`LlmRequest::model`] selects the
/// model for each call.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Run a single, non-streaming generation call.
    async fn generate_content(&self, request: LlmRequest) -> Result<LlmResponse>;
}
