//! Personalised chat grounded in rules, articles and the current plan.

use chrono::{DateTime, Utc};
use kanva_rag::{ArticleRecord, RuleRecord, build_rag_index};
use kanva_telemetry::redact_sensitive;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::advisor::Advisor;
use crate::analysis::{OrderContext, chunk_lines, context_lines};
use crate::error::Result;
use crate::format::{format_for_analysis, format_selected_elements};
use crate::plan::PlanDocument;
use crate::profile::UserProfile;
use crate::risk::RiskRecord;

const CHAT_CHUNK_PREVIEW: usize = 200;
const MAX_PROMPT_RISKS: usize = 5;
const MAX_SOURCES: usize = 3;
const CHAT_CONFIDENCE: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    /// Any role other than `user` is treated as the assistant.
    #[serde(other)]
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(ChatRole::Assistant, content)
    }

    fn with_role(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            message_id: Some(Uuid::new_v4().to_string()),
        }
    }
}

/// Assistant reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    /// Leading retrieved chunks the reply was grounded on.
    pub sources: Option<Vec<String>>,
    /// 0.0 for error replies.
    pub confidence: Option<f32>,
}

impl ChatResponse {
    fn new(content: String, sources: Option<Vec<String>>, confidence: f32) -> Self {
        Self {
            content,
            message_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            sources,
            confidence: Some(confidence),
        }
    }
}

fn build_system_prompt(
    plan: Option<&PlanDocument>,
    context: &OrderContext,
    chunks: &[String],
    profile: Option<&UserProfile>,
    risks: &[RiskRecord],
) -> String {
    let mut parts = vec![
        "Вы - AI-ассистент, помогающий пользователям с вопросами по планировке помещений и нормативным требованиям."
            .to_string(),
        "Ваша задача - отвечать на вопросы пользователя, используя предоставленную информацию о правилах и статьях."
            .to_string(),
        "Учитывайте профиль пользователя для персонализированных рекомендаций.".to_string(),
        String::new(),
        "Контекст заказа:".to_string(),
    ];
    parts.extend(context_lines(context));

    if let Some(profile) = profile {
        parts.push(String::new());
        parts.push("Информация о пользователе (используйте для персонализированных рекомендаций):".to_string());
        let lines = profile.prompt_lines();
        if lines.is_empty() {
            parts.push("Профиль пользователя не указан".to_string());
        } else {
            parts.extend(lines);
        }
    }

    parts.push(String::new());
    parts.push("Релевантная информация из правил и статей:".to_string());
    parts.extend(chunk_lines(chunks, CHAT_CHUNK_PREVIEW));

    if let Some(plan) = plan {
        parts.push(String::new());
        parts.push("Информация о текущем плане:".to_string());
        parts.push(format!("- Количество элементов: {}", plan.elements.len()));
        if !plan.objects3d.is_empty() {
            parts.push(format!("- Количество 3D объектов: {}", plan.objects3d.len()));
        }
        let selected = format_selected_elements(plan);
        if !selected.is_empty() {
            parts.push(selected);
        }
        parts.push(String::new());
        parts.push("Детальная информация о планировке:".to_string());
        parts.push(format_for_analysis(plan));
    }

    if !risks.is_empty() {
        parts.push(String::new());
        parts.push("Выявленные проблемы в планировке:".to_string());
        for (i, risk) in risks.iter().take(MAX_PROMPT_RISKS).enumerate() {
            parts.push(format!(
                "{}. [{}] {} (серьезность: {})",
                i + 1,
                risk.risk_type,
                risk.description,
                risk.severity_label()
            ));
        }
    }

    parts.push(String::new());
    parts.push(
        "Отвечайте на вопросы пользователя четко и информативно, ссылаясь на релевантные правила и статьи."
            .to_string(),
    );
    if profile.is_some() {
        parts.push(
            "Учитывайте профиль пользователя при даче рекомендаций, чтобы предложения были персонализированными."
                .to_string(),
        );
    }
    if plan.is_some_and(|p| !p.selected_ids().is_empty()) {
        parts.push(
            "ОБЯЗАТЕЛЬНО учитывайте выделенные пользователем элементы и работайте с ними в приоритете.".to_string(),
        );
    }
    parts.join("\n")
}

/// Transcript of the last `max_history` messages followed by the current one
/// and an open assistant turn.
fn build_history_prompt(history: &[ChatMessage], message: &ChatMessage, max_history: usize) -> String {
    let start = history.len().saturating_sub(max_history);
    let mut parts: Vec<String> = history[start..]
        .iter()
        .map(|m| {
            let label = match m.role {
                ChatRole::User => "Пользователь",
                ChatRole::Assistant => "Ассистент",
            };
            format!("{label}: {}", m.content)
        })
        .collect();
    parts.push(format!("Пользователь: {}", message.content));
    parts.push("Ассистент:".to_string());
    parts.join("\n")
}

impl Advisor {
    /// Answer `message` using retrieved rules and articles, the plan and its
    /// risks, the profile and the recent history.
    ///
    /// Never fails: errors produce an apologetic reply with confidence 0.0.
    /// A failed plan analysis is logged and the reply is produced without
    /// risks.
    #[instrument(skip_all, fields(history = history.len(), has_plan = plan.is_some()))]
    #[allow(clippy::too_many_arguments)]
    pub async fn process_chat_message(
        &self,
        message: &ChatMessage,
        plan: Option<&PlanDocument>,
        context: &OrderContext,
        history: &[ChatMessage],
        rules: &[RuleRecord],
        articles: &[ArticleRecord],
        profile: Option<&UserProfile>,
    ) -> ChatResponse {
        match self.try_process_chat_message(message, plan, context, history, rules, articles, profile).await {
            Ok(response) => response,
            Err(e) => {
                let message = redact_sensitive(&e.to_string()).into_owned();
                error!(error = %message, "chat message failed");
                ChatResponse::new(
                    format!("Извините, произошла ошибка при обработке вашего запроса: {message}"),
                    None,
                    0.0,
                )
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn try_process_chat_message(
        &self,
        message: &ChatMessage,
        plan: Option<&PlanDocument>,
        context: &OrderContext,
        history: &[ChatMessage],
        rules: &[RuleRecord],
        articles: &[ArticleRecord],
        profile: Option<&UserProfile>,
    ) -> Result<ChatResponse> {
        let query = self.embedder.embed(&message.content).await?;
        let index = build_rag_index(rules, articles, &self.config.rag, self.embedder.as_ref()).await?;
        let chunks = index.retrieve(&query, self.config.rag.top_k);

        let mut risks = Vec::new();
        if let Some(plan) = plan {
            match self.analyze_with_index(plan, context, &index, profile).await {
                Ok(analysis) => {
                    info!(risks = analysis.risks.len(), "plan analysed for chat");
                    risks = analysis.risks;
                }
                Err(e) => warn!(error = %redact_sensitive(&e.to_string()), "could not analyse plan for chat"),
            }
        }

        let system = build_system_prompt(plan, context, &chunks, profile, &risks);
        let prompt = build_history_prompt(history, message, self.config.chat_max_history);
        let content = self
            .generator
            .generate_text(
                &self.config.gemini_model,
                &prompt,
                Some(system.as_str()),
                self.config.chat_temperature,
                self.config.chat_top_p,
            )
            .await?;

        let sources = (!chunks.is_empty()).then(|| chunks.into_iter().take(MAX_SOURCES).collect());
        Ok(ChatResponse::new(content, sources, CHAT_CONFIDENCE))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::risk::normalize_risk;

    #[test]
    fn unknown_roles_deserialize_as_assistant() {
        let message: ChatMessage = serde_json::from_value(json!({"role": "system", "content": "hi"})).unwrap();
        assert_eq!(message.role, ChatRole::Assistant);
        assert!(message.message_id.is_none());
    }

    #[test]
    fn history_is_truncated_to_most_recent() {
        let history: Vec<_> = (0..4)
            .map(|i| if i % 2 == 0 { ChatMessage::user(format!("q{i}")) } else { ChatMessage::assistant(format!("a{i}")) })
            .collect();
        let prompt = build_history_prompt(&history, &ChatMessage::user("now"), 2);
        assert_eq!(prompt, "Пользователь: q2\nАссистент: a3\nПользователь: now\nАссистент:");
    }

    #[test]
    fn risks_are_capped_and_labelled() {
        let risks: Vec<_> = (0..7)
            .map(|i| normalize_risk(&json!({"type": "LEGAL", "description": format!("r{i}"), "severity": 2})).unwrap())
            .collect();
        let prompt = build_system_prompt(None, &OrderContext::new(), &[], None, &risks);
        assert!(prompt.contains("1. [LEGAL] r0 (серьезность: 2)"));
        assert!(prompt.contains("5. [LEGAL] r4"));
        assert!(!prompt.contains("r5"));
        assert!(!prompt.contains("Информация о текущем плане"));
    }

    #[test]
    fn empty_profile_gets_placeholder() {
        let prompt = build_system_prompt(None, &OrderContext::new(), &[], Some(&UserProfile::default()), &[]);
        assert!(prompt.contains("Профиль пользователя не указан"));
        assert!(prompt.ends_with("чтобы предложения были персонализированными."));
    }
}
