//! Regulation-grounded plan analysis.

use kanva_model::JsonRequest;
use kanva_rag::{ArticleRecord, RagIndex, RuleRecord, build_rag_index};
use kanva_telemetry::redact_sensitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};

use crate::advisor::Advisor;
use crate::error::Result;
use crate::format::{format_for_analysis, format_for_embedding};
use crate::plan::PlanDocument;
use crate::profile::UserProfile;
use crate::risk::{RiskRecord, normalize_risks};
use crate::schema::risk_schema;

/// Free-form order attributes (`address`, `user_request`, ...).
pub type OrderContext = Map<String, Value>;

const DEFAULT_SUMMARY: &str = "Анализ завершен.";
const ANALYSIS_CHUNK_PREVIEW: usize = 300;

/// Outcome of a plan analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub risks: Vec<RiskRecord>,
}

/// `- key: value` lines for an order context, or the placeholder line.
pub(crate) fn context_lines(context: &OrderContext) -> Vec<String> {
    if context.is_empty() {
        return vec!["- Контекст не предоставлен".to_string()];
    }
    context
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("- {key}: {s}"),
            other => format!("- {key}: {other}"),
        })
        .collect()
}

/// Numbered chunk previews cut to `max_chars` characters.
pub(crate) fn chunk_lines(chunks: &[String], max_chars: usize) -> Vec<String> {
    if chunks.is_empty() {
        return vec!["- Релевантная информация не найдена".to_string()];
    }
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let preview: String = chunk.chars().take(max_chars).collect();
            format!("{}. {preview}...", i + 1)
        })
        .collect()
}

fn build_system_prompt(context: &OrderContext, chunks: &[String], profile: Option<&UserProfile>) -> String {
    let mut parts = vec![
        "Вы - эксперт по анализу планировок помещений и проверке соответствия нормативным требованиям."
            .to_string(),
        "Ваша задача - проанализировать предоставленную планировку и выявить риски несоответствия законам и нормам."
            .to_string(),
        String::new(),
        "Контекст заказа:".to_string(),
    ];
    parts.extend(context_lines(context));

    if let Some(profile) = profile {
        parts.push(String::new());
        parts.push("Информация о пользователе:".to_string());
        parts.extend(profile.prompt_lines());
    }

    parts.push(String::new());
    parts.push("Релевантные правила и статьи:".to_string());
    parts.extend(chunk_lines(chunks, ANALYSIS_CHUNK_PREVIEW));

    parts.push(String::new());
    parts.push(
        "Проанализируйте планировку и верните JSON с полем 'summary' (краткое резюме анализа) \
         и полем 'risks' (список рисков). Каждый риск должен содержать: \
         type, description, severity (1-5), zone (опционально), \
         regulation_reference (опционально), recommendation (опционально), \
         affected_elements (опционально, список ID), \
         alts (опционально, массив из 3-5 альтернативных вариантов планировки с геометрией элементов)."
            .to_string(),
    );
    parts.push(String::new());
    parts.push(
        "ВАЖНО: Для каждого риска, если он требует изменения планировки, сгенерируйте в поле 'alts' \
         от 3 до 5 альтернативных вариантов планировки. Каждый вариант должен содержать геометрию \
         измененных элементов плана в формате, соответствующем структуре OrderPlanVersion.plan.elements."
            .to_string(),
    );
    parts.join("\n")
}

fn build_analysis_prompt(plan_description: &str, context: &OrderContext) -> String {
    let mut parts = vec![
        "Проанализируйте следующую планировку помещения:".to_string(),
        String::new(),
        plan_description.to_string(),
        String::new(),
    ];

    if let Some(request) = context.get("user_request") {
        let request = match request {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        parts.push("ВАЖНО: Пользователь запросил следующие изменения:".to_string());
        parts.push(format!("  {request}"));
        parts.push(String::new());
        parts.push(
            "При генерации альтернативных вариантов планировки ОБЯЗАТЕЛЬНО учитывайте этот запрос.".to_string(),
        );
        parts.push(String::new());
    }

    parts.extend(
        [
            "На основе предоставленных правил и статей определите:",
            "1. Соответствие планировки нормативным требованиям",
            "2. Выявленные риски и их серьезность",
            "3. Рекомендации по устранению рисков",
            "",
            "Для каждого риска, который требует изменения планировки, сгенерируйте в поле 'alts' от 3 до 5 альтернативных вариантов планировки.",
            "Каждый вариант должен содержать геометрию измененных элементов плана в формате, соответствующем структуре OrderPlanVersion.plan.elements.",
            "",
            "Верните результат в формате JSON с полями 'summary' и 'risks'.",
        ]
        .map(str::to_string),
    );
    parts.join("\n")
}

impl Advisor {
    /// Analyze `plan` against the given rules and articles.
    ///
    /// Never fails: on any error the summary describes the (redacted) failure
    /// and the risk list is empty. Use [`Advisor::try_analyze_plan`] to get
    /// the error instead.
    #[instrument(skip_all, fields(elements = plan.elements.len(), rules = rules.len(), articles = articles.len()))]
    pub async fn analyze_plan(
        &self,
        plan: &PlanDocument,
        context: &OrderContext,
        rules: &[RuleRecord],
        articles: &[ArticleRecord],
        profile: Option<&UserProfile>,
    ) -> AnalysisResult {
        match self.try_analyze_plan(plan, context, rules, articles, profile).await {
            Ok(result) => result,
            Err(e) => {
                let message = redact_sensitive(&e.to_string()).into_owned();
                error!(error = %message, "plan analysis failed");
                AnalysisResult { summary: format!("Ошибка при анализе: {message}"), risks: Vec::new() }
            }
        }
    }

    /// Analyze `plan`, propagating validation, embedding and generation errors.
    pub async fn try_analyze_plan(
        &self,
        plan: &PlanDocument,
        context: &OrderContext,
        rules: &[RuleRecord],
        articles: &[ArticleRecord],
        profile: Option<&UserProfile>,
    ) -> Result<AnalysisResult> {
        plan.validate()?;
        let index = build_rag_index(rules, articles, &self.config.rag, self.embedder.as_ref()).await?;
        self.analyze_with_index(plan, context, &index, profile).await
    }

    /// Analysis over an already built index.
    pub(crate) async fn analyze_with_index(
        &self,
        plan: &PlanDocument,
        context: &OrderContext,
        index: &RagIndex,
        profile: Option<&UserProfile>,
    ) -> Result<AnalysisResult> {
        plan.validate()?;

        let plan_vector = self.embedder.embed(&format_for_embedding(plan)).await?;
        let chunks = index.retrieve(&plan_vector, self.config.analysis_top_k);

        let request = JsonRequest::new(build_analysis_prompt(&format_for_analysis(plan), context), risk_schema())
            .with_system_prompt(build_system_prompt(context, &chunks, profile))
            .with_temperature(self.config.analysis_temperature)
            .with_top_p(self.config.analysis_top_p);
        let output = self.generator.generate_json_with_fallback(&request, Some(self.config.model_list.as_slice())).await?;

        let summary = output.get("summary").and_then(Value::as_str).unwrap_or(DEFAULT_SUMMARY).to_string();
        let raw_risks = output.get("risks").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
        let risks = normalize_risks(raw_risks);

        info!(
            chunks = chunks.len(),
            risks = risks.len(),
            dropped = raw_risks.len() - risks.len(),
            "plan analysis complete"
        );
        Ok(AnalysisResult { summary, risks })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn context(value: Value) -> OrderContext {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn system_prompt_lists_context_profile_and_chunks() {
        let profile = UserProfile { age: Some(30), ..Default::default() };
        let chunks = vec!["а".repeat(400), "short".to_string()];
        let prompt = build_system_prompt(&context(json!({"address": "Москва", "rooms": 2})), &chunks, Some(&profile));

        assert!(prompt.contains("Контекст заказа:\n- address: Москва\n- rooms: 2"));
        assert!(prompt.contains("Информация о пользователе:\n- Возраст: 30 лет"));
        assert!(prompt.contains(&format!("1. {}...", "а".repeat(300))));
        assert!(!prompt.contains(&"а".repeat(301)));
        assert!(prompt.contains("2. short..."));
    }

    #[test]
    fn system_prompt_placeholders() {
        let prompt = build_system_prompt(&OrderContext::new(), &[], None);
        assert!(prompt.contains("- Контекст не предоставлен"));
        assert!(prompt.contains("- Релевантная информация не найдена"));
        assert!(!prompt.contains("Информация о пользователе"));
    }

    #[test]
    fn user_request_is_highlighted() {
        let prompt = build_analysis_prompt("PLAN", &context(json!({"user_request": "объединить кухню"})));
        assert!(prompt.starts_with("Проанализируйте следующую планировку помещения:\n\nPLAN\n"));
        assert!(prompt.contains("ВАЖНО: Пользователь запросил следующие изменения:\n  объединить кухню"));

        let plain = build_analysis_prompt("PLAN", &OrderContext::new());
        assert!(!plain.contains("ВАЖНО"));
        assert!(plain.ends_with("Верните результат в формате JSON с полями 'summary' и 'risks'."));
    }
}
