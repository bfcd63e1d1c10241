//! # kanva-model
//!
//! LLM backends and schema-guided generation for the Kanva advisor.
//!
//! ## Overview
//!
//! - [`Llm`] - backend trait, one non-streaming call per request
//! - [`GeminiModel`] - Gemini `generateContent` REST backend (feature `gemini`, default)
//! - [`MockLlm`] - scripted backend for tests
//! - [`StructuredGenerator`] - free-text generation, JSON generation and JSON
//!   generation over an ordered model fallback list
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kanva_model::{GeminiModel, JsonRequest, StructuredGenerator};
//! use serde_json::json;
//!
//! # async fn run() -> kanva_model::Result<()> {
//! let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
//! let generator = StructuredGenerator::new(Arc::new(GeminiModel::new(api_key, "gemini-2.0-flash")?));
//! let request = JsonRequest::new("Оцени риски", json!({"type": "object"}));
//! let value = generator.generate_json_with_fallback(&request, None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Default fallback order
//!
//! | Model | Description |
//! |-------|-------------|
//! | `gemini-2.5-pro` | Most capable |
//! | `gemini-2.5-flash` | Balanced speed/capability |
//! | `gemini-2.5-flash-lite` | Cheapest 2.5 model |
//! | `gemini-2.0-flash` | Previous generation |
//! | `gemini-2.0-flash-lite` | Last resort |

pub mod error;
#[cfg(feature = "gemini")]
pub mod gemini;
pub mod llm;
pub mod mock;
pub mod structured;

pub use error::{ModelError, Result};
#[cfg(feature = "gemini")]
pub use gemini::GeminiModel;
pub use llm::{Content, GenerateContentConfig, Llm, LlmRequest, LlmResponse, Role};
pub use mock::MockLlm;
pub use structured::{DEFAULT_FALLBACK_MODELS, JsonRequest, StructuredGenerator, extract_json};
