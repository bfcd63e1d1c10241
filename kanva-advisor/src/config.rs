//! Advisor configuration.
//!
//! Values come from defaults, a deserialized document, or environment
//! variables via [`AdvisorConfig::from_env`]. The configuration is passed into
//! [`Advisor`](crate::Advisor) explicitly.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use kanva_model::DEFAULT_FALLBACK_MODELS;
use kanva_rag::{DEFAULT_LOCAL_MODEL, RagConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AdvisorError, Result};

/// Which embedding backend an advisor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingStrategy {
    /// Gemini embeddings, with the local model as fallback when available.
    #[default]
    Remote,
    /// Local sentence encoder only.
    Local,
}

impl FromStr for EmbeddingStrategy {
    type Err = AdvisorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" | "gemini" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(AdvisorError::Config(format!("unknown embedding strategy: {other}"))),
        }
    }
}

/// Settings for analysis, chat and the embedding and generation backends.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisorConfig {
    /// Credential for Gemini generation and embeddings.
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    /// Model used for chat replies.
    pub gemini_model: String,
    /// Fallback order for plan analysis, highest quality first.
    pub model_list: Vec<String>,
    pub embedding_strategy: EmbeddingStrategy,
    pub remote_embedding_model: String,
    pub local_embedding_model: String,
    pub rag: RagConfig,
    pub chat_temperature: f32,
    pub chat_top_p: f32,
    /// Number of most recent history messages included in a chat prompt.
    pub chat_max_history: usize,
    pub analysis_temperature: f32,
    pub analysis_top_p: f32,
    /// Number of chunks retrieved for plan analysis.
    pub analysis_top_k: usize,
    /// Upper bound for each embedding or generation call.
    pub request_timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            model_list: DEFAULT_FALLBACK_MODELS.iter().map(|m| m.to_string()).collect(),
            embedding_strategy: EmbeddingStrategy::default(),
            remote_embedding_model: "text-embedding-004".to_string(),
            local_embedding_model: DEFAULT_LOCAL_MODEL.to_string(),
            rag: RagConfig::default(),
            chat_temperature: 0.7,
            chat_top_p: 0.9,
            chat_max_history: 10,
            analysis_temperature: 0.3,
            analysis_top_p: 0.8,
            analysis_top_k: 10,
            request_timeout_secs: 60,
        }
    }
}

impl fmt::Debug for AdvisorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdvisorConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_model", &self.gemini_model)
            .field("model_list", &self.model_list)
            .field("embedding_strategy", &self.embedding_strategy)
            .field("remote_embedding_model", &self.remote_embedding_model)
            .field("local_embedding_model", &self.local_embedding_model)
            .field("rag", &self.rag)
            .field("chat_temperature", &self.chat_temperature)
            .field("chat_top_p", &self.chat_top_p)
            .field("chat_max_history", &self.chat_max_history)
            .field("analysis_temperature", &self.analysis_temperature)
            .field("analysis_top_p", &self.analysis_top_p)
            .field("analysis_top_k", &self.analysis_top_k)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|e| AdvisorError::Config(format!("{name}={value:?}: {e}"))),
    }
}

impl AdvisorConfig {
    /// Load from process environment variables on top of the defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source on top of the defaults.
    ///
    /// Absent or blank variables keep their default; malformed numbers are an
    /// error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        config.gemini_api_key = var("GEMINI_API_KEY").or_else(|| var("GOOGLE_API_KEY"));
        if let Some(model) = var("GEMINI_MODEL") {
            config.gemini_model = model.trim().to_string();
        }
        if let Some(list) = var("GEMINI_MODEL_LIST") {
            config.model_list = list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(strategy) = parse_var("EMBEDDING_STRATEGY", var("EMBEDDING_STRATEGY"))? {
            config.embedding_strategy = strategy;
        }
        if let Some(model) = var("REMOTE_EMBEDDING_MODEL") {
            config.remote_embedding_model = model.trim().to_string();
        }
        if let Some(model) = var("LOCAL_EMBEDDING_MODEL") {
            config.local_embedding_model = model.trim().to_string();
        }
        if let Some(v) = parse_var("RAG_CHUNK_SIZE", var("RAG_CHUNK_SIZE"))? {
            config.rag.chunk_size = v;
        }
        if let Some(v) = parse_var("RAG_CHUNK_OVERLAP", var("RAG_CHUNK_OVERLAP"))? {
            config.rag.chunk_overlap = v;
        }
        if let Some(v) = parse_var("RAG_TOP_K", var("RAG_TOP_K"))? {
            config.rag.top_k = v;
        }
        if let Some(v) = parse_var("CHAT_TEMPERATURE", var("CHAT_TEMPERATURE"))? {
            config.chat_temperature = v;
        }
        if let Some(v) = parse_var("CHAT_MAX_HISTORY", var("CHAT_MAX_HISTORY"))? {
            config.chat_max_history = v;
        }
        if let Some(v) = parse_var("ANALYSIS_TEMPERATURE", var("ANALYSIS_TEMPERATURE"))? {
            config.analysis_temperature = v;
        }
        if let Some(v) = parse_var("ANALYSIS_TOP_K", var("ANALYSIS_TOP_K"))? {
            config.analysis_top_k = v;
        }
        if let Some(v) = parse_var("REQUEST_TIMEOUT_SECS", var("REQUEST_TIMEOUT_SECS"))? {
            config.request_timeout_secs = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        self.rag.validate()?;
        if self.model_list.is_empty() {
            return Err(AdvisorError::Config("model_list must not be empty".into()));
        }
        if self.analysis_top_k == 0 {
            return Err(AdvisorError::Config("analysis_top_k must be greater than zero".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(AdvisorError::Config("request_timeout_secs must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = AdvisorConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.model_list[0], "gemini-2.5-pro");
        assert_eq!(config.rag.chunk_size, 1000);
        assert_eq!(config.rag.chunk_overlap, 200);
        assert_eq!(config.rag.top_k, 5);
        assert_eq!(config.analysis_top_k, 10);
        assert_eq!(config.chat_max_history, 10);
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn env_values_override_defaults() {
        let config = AdvisorConfig::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "secret"),
            ("GEMINI_MODEL_LIST", "a, b ,,c"),
            ("EMBEDDING_STRATEGY", "Remote"),
            ("RAG_TOP_K", "3"),
            ("CHAT_TEMPERATURE", "0.2"),
        ]))
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.model_list, vec!["a", "b", "c"]);
        assert_eq!(config.embedding_strategy, EmbeddingStrategy::Remote);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.chat_temperature, 0.2);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = AdvisorConfig::from_lookup(lookup(&[("RAG_CHUNK_SIZE", "big")])).unwrap_err();
        assert!(err.to_string().contains("RAG_CHUNK_SIZE"));
    }

    #[test]
    fn inconsistent_chunking_is_rejected() {
        let vars = [("RAG_CHUNK_SIZE", "100"), ("RAG_CHUNK_OVERLAP", "100")];
        assert!(AdvisorConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn debug_hides_api_key() {
        let config = AdvisorConfig { gemini_api_key: Some("AIzaSecret".into()), ..Default::default() };
        assert!(!format!("{config:?}").contains("AIzaSecret"));
    }
}
