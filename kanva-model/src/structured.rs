//! Schema-guided JSON generation with an ordered model fallback.
//!
//! [`StructuredGenerator::generate_json`] is one attempt against one model.
//! [`StructuredGenerator::generate_json_with_fallback`] repeats that attempt
//! over a model list, highest quality first, and stops at the first success.
//! Models are never tried concurrently.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use kanva_telemetry::redact_sensitive;
use serde::Serialize;
use serde_json::Value;
use serde_json::ser::Formatter;
use tracing::{debug, info, instrument, warn};

use crate::error::{ModelError, Result};
use crate::llm::{Content, GenerateContentConfig, Llm, LlmRequest};

/// Fallback order used when the caller does not supply a model list.
pub const DEFAULT_FALLBACK_MODELS: &[&str] = &[
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const JSON_MIME_TYPE: &str = "application/json";

/// Parameters of a schema-constrained generation call.
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub prompt: String,
    /// JSON schema the response must follow. Forwarded verbatim.
    pub schema: Value,
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
}

impl JsonRequest {
    pub fn new(prompt: impl Into<String>, schema: Value) -> Self {
        Self { prompt: prompt.into(), schema, system_prompt: None, temperature: 0.3, top_p: 0.8 }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// The prompt with the schema instruction appended on the same line.
    fn full_prompt(&self) -> String {
        format!(
            "{}\n\nВерни ответ строго в формате JSON согласно следующей схеме: {}",
            self.prompt,
            inline_json(&self.schema)
        )
    }
}

/// Single-line JSON with a space after every `,` and `:`.
struct InlineFormatter;

impl Formatter for InlineFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

fn inline_json(value: &Value) -> String {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, InlineFormatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}

/// Strip a surrounding code fence and parse the remainder as a JSON object.
///
/// Both `` ```json `` and bare `` ``` `` opening fences are accepted.
///
/// ```rust
/// use kanva_model::extract_json;
///
/// let value = extract_json("```json\n{\"summary\": \"ok\"}\n```").unwrap();
/// assert_eq!(value["summary"], "ok");
/// assert!(extract_json("[1, 2]").is_err());
/// ```
pub fn extract_json(text: &str) -> Result<Value> {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }

    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| ModelError::MalformedOutput(format!("invalid JSON: {e}")))?;
    if !value.is_object() {
        return Err(ModelError::MalformedOutput("expected a JSON object".into()));
    }
    Ok(value)
}

/// Drives an [`Llm`] backend for free-text and schema-guided JSON output.
///
/// Every backend call is bounded by the configured timeout; a timeout counts
/// as that model's failure.
#[derive(Clone)]
pub struct StructuredGenerator {
    llm: Arc<dyn Llm>,
    timeout: Duration,
}

impl StructuredGenerator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm, timeout: DEFAULT_TIMEOUT }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(&self, request: LlmRequest) -> Result<String> {
        let model = request.model.clone();
        let response = tokio::time::timeout(self.timeout, self.llm.generate_content(request))
            .await
            .map_err(|_| ModelError::Timeout { model, after: self.timeout })??;
        Ok(response.text)
    }

    /// Generate free text from `prompt` with `model`.
    pub async fn generate_text(
        &self,
        model: &str,
        prompt: &str,
        system_prompt: Option<&str>,
        temperature: f32,
        top_p: f32,
    ) -> Result<String> {
        let mut request = LlmRequest::new(model, vec![Content::user(prompt)]).with_config(
            GenerateContentConfig {
                temperature: Some(temperature),
                top_p: Some(top_p),
                ..Default::default()
            },
        );
        if let Some(system) = system_prompt {
            request = request.with_system_instruction(system);
        }

        debug!(model, prompt_len = prompt.len(), "generating text");
        let text = self.call(request).await?;
        Ok(text.trim().to_string())
    }

    /// One schema-guided attempt against `model`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MalformedOutput`] when the response is not a JSON
    /// object, and provider or timeout errors from the backend.
    pub async fn generate_json(&self, request: &JsonRequest, model: &str) -> Result<Value> {
        let mut llm_request = LlmRequest::new(model, vec![Content::user(request.full_prompt())])
            .with_config(GenerateContentConfig {
                temperature: Some(request.temperature),
                top_p: Some(request.top_p),
                response_mime_type: Some(JSON_MIME_TYPE.to_string()),
                ..Default::default()
            });
        if let Some(system) = &request.system_prompt {
            llm_request = llm_request.with_system_instruction(system.clone());
        }

        debug!(model, "generating structured output");
        let text = self.call(llm_request).await?;
        extract_json(&text)
    }

    /// Try each model in `models` in order until one returns valid JSON.
    ///
    /// `None` uses [`DEFAULT_FALLBACK_MODELS`].
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FallbackExhausted`] naming every attempted model
    /// and the last (redacted) failure, or [`ModelError::Config`] for an empty
    /// list.
    #[instrument(skip_all, fields(models = tracing::field::Empty))]
    pub async fn generate_json_with_fallback(
        &self,
        request: &JsonRequest,
        models: Option<&[String]>,
    ) -> Result<Value> {
        let models: Vec<String> = match models {
            Some(list) => list.to_vec(),
            None => DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
        };
        if models.is_empty() {
            return Err(ModelError::Config("model list is empty".into()));
        }
        tracing::Span::current().record("models", models.join(",").as_str());

        let mut last_error = String::new();
        for (attempt, model) in models.iter().enumerate() {
            match self.generate_json(request, model).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(model = %model, attempt = attempt + 1, "fallback model succeeded");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    last_error = redact_sensitive(&e.to_string()).into_owned();
                    warn!(model = %model, attempt = attempt + 1, error = %last_error, "model failed, trying next");
                }
            }
        }

        Err(ModelError::FallbackExhausted { models, last_error })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn fences_are_stripped() {
        assert_eq!(extract_json("```json\n{\"a\":1}\n```").unwrap(), json!({"a": 1}));
        assert_eq!(extract_json("```\n{\"a\":1}```").unwrap(), json!({"a": 1}));
        assert_eq!(extract_json("  {\"a\":1}  ").unwrap(), json!({"a": 1}));
    }

    #[test]
    fn non_objects_are_malformed() {
        assert!(matches!(extract_json("not json"), Err(ModelError::MalformedOutput(_))));
        assert!(matches!(extract_json("\"text\""), Err(ModelError::MalformedOutput(_))));
    }

    #[test]
    fn schema_instruction_is_appended() {
        let request = JsonRequest::new("Проанализируй план", json!({"type": "object"}));
        assert_eq!(
            request.full_prompt(),
            "Проанализируй план\n\nВерни ответ строго в формате JSON согласно следующей схеме: {\"type\": \"object\"}"
        );
    }

    #[test]
    fn schema_is_inlined_on_one_line() {
        let schema = json!({
            "type": "object",
            "properties": {"risks": {"type": "array", "items": {"enum": ["a", "б"]}}},
            "required": ["summary", "risks"]
        });
        assert_eq!(
            inline_json(&schema),
            r#"{"type": "object", "properties": {"risks": {"type": "array", "items": {"enum": ["a", "б"]}}}, "required": ["summary", "risks"]}"#
        );
        assert!(!JsonRequest::new("p", schema).full_prompt().contains("схеме:\n"));
    }

    #[test]
    fn exhausted_error_names_models() {
        let err = ModelError::FallbackExhausted {
            models: vec!["a".into(), "b".into()],
            last_error: "boom".into(),
        };
        assert_eq!(err.to_string(), "All models failed (tried: a, b); last error: boom");
    }
}
