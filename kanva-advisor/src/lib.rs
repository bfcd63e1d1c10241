//! # kanva-advisor
//!
//! Floor-plan risk analysis and a chat assistant grounded in renovation
//! rules and law articles.
//!
//! ## Overview
//!
//! An [`Advisor`] holds an [`AdvisorConfig`], one embedding provider and a
//! structured generator. Each call builds its own request-scoped RAG index:
//!
//! 1. rules and articles are chunked and embedded,
//! 2. the plan (or chat message) is embedded and the closest chunks retrieved,
//! 3. a grounded prompt is sent to the model fallback chain,
//! 4. the returned risks are decoded by [`normalize_risks`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kanva_advisor::{Advisor, AdvisorConfig, OrderContext};
//!
//! let advisor = Advisor::from_config(AdvisorConfig::from_env()?)?;
//! let result = advisor
//!     .analyze_plan(&plan, &OrderContext::new(), &rules, &articles, None)
//!     .await;
//! println!("{}", result.summary);
//! for risk in &result.risks {
//!     println!("[{}] {}", risk.risk_type, risk.description);
//! }
//! ```
//!
//! ## Features
//!
//! - `local` - local sentence-encoder embeddings through `fastembed`, used
//!   for the `local` strategy and as the remote strategy's fallback

pub mod advisor;
pub mod analysis;
pub mod chat;
pub mod config;
pub mod error;
pub mod format;
pub mod plan;
pub mod profile;
pub mod risk;
pub mod schema;

pub use advisor::Advisor;
pub use analysis::{AnalysisResult, OrderContext};
pub use chat::{ChatMessage, ChatResponse, ChatRole};
pub use config::{AdvisorConfig, EmbeddingStrategy};
pub use error::{AdvisorError, Result};
pub use format::{format_for_analysis, format_for_embedding, format_selected_elements, polygon_area};
pub use plan::{
    ElementKind, ElementRole, Geometry, Object3D, ObjectType, Opening, OpeningType, PlanDocument, PlanElement,
    PlanMeta, PlanVersion, VersionType,
};
pub use profile::{ChildInfo, MaritalStatus, UserProfile};
pub use risk::{RiskRecord, RiskType, RiskValidationError, SeverityLevel, normalize_risk, normalize_risks};
pub use schema::risk_schema;

pub use kanva_rag::{ArticleRecord, RuleRecord};
