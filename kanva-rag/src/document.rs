//! Data types for source records, chunks, and search results.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Which kind of source record a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// An internal compliance rule.
    Rule,
    /// An article of a law.
    Article,
}

impl SourceKind {
    /// The metadata value stored under the `type` key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rule => "rule",
            SourceKind::Article => "article",
        }
    }

    /// The metadata key holding the source record id.
    pub fn id_key(&self) -> &'static str {
        match self {
            SourceKind::Rule => "rule_id",
            SourceKind::Article => "article_id",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compliance rule as supplied by the order service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuleRecord {
    /// Record identifier (string or number on the wire).
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    /// Cross-reference to the governing regulation.
    #[serde(default)]
    pub regulation_reference: Option<String>,
}

/// An article of a law as supplied by the order service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleRecord {
    /// Record identifier (string or number on the wire).
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub article_number: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub law_name: Option<String>,
    #[serde(default)]
    pub chapter: Option<String>,
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Append `label: value` when `value` is present and non-empty.
fn push_field(parts: &mut Vec<String>, label: &str, value: Option<&String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        parts.push(format!("{label}: {value}"));
    }
}

impl RuleRecord {
    /// Render the record as the canonical text block that gets chunked.
    ///
    /// Field order is fixed: title, description, content, regulation reference.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        push_field(&mut parts, "Название правила", self.title.as_ref());
        push_field(&mut parts, "Описание", self.description.as_ref());
        push_field(&mut parts, "Содержание", self.content.as_ref());
        push_field(&mut parts, "Ссылка на нормативный документ", self.regulation_reference.as_ref());
        parts.join("\n")
    }

    /// Metadata attached to every chunk cut from this rule.
    pub fn metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), SourceKind::Rule.as_str().to_string());
        insert_opt(&mut metadata, SourceKind::Rule.id_key(), &self.id);
        insert_opt(&mut metadata, "title", &self.title);
        insert_opt(&mut metadata, "regulation_reference", &self.regulation_reference);
        metadata
    }
}

impl ArticleRecord {
    /// Render the record as the canonical text block that gets chunked.
    ///
    /// Field order is fixed: title, article number, content, law name, chapter.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        push_field(&mut parts, "Название статьи", self.title.as_ref());
        push_field(&mut parts, "Номер статьи", self.article_number.as_ref());
        push_field(&mut parts, "Содержание", self.content.as_ref());
        push_field(&mut parts, "Название закона", self.law_name.as_ref());
        push_field(&mut parts, "Глава", self.chapter.as_ref());
        parts.join("\n")
    }

    /// Metadata attached to every chunk cut from this article.
    pub fn metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert("type".to_string(), SourceKind::Article.as_str().to_string());
        insert_opt(&mut metadata, SourceKind::Article.id_key(), &self.id);
        insert_opt(&mut metadata, "article_number", &self.article_number);
        insert_opt(&mut metadata, "title", &self.title);
        insert_opt(&mut metadata, "law_name", &self.law_name);
        metadata
    }
}

fn insert_opt(metadata: &mut HashMap<String, String>, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        metadata.insert(key.to_string(), value.clone());
    }
}

/// A bounded text fragment cut from a source record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// The text content of the chunk.
    pub text: String,
    /// Source kind, source id and descriptive fields of the parent record,
    /// plus the `chunk_index` within that record.
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// The kind of record this chunk came from, if recorded.
    pub fn source_kind(&self) -> Option<SourceKind> {
        match self.metadata.get("type").map(String::as_str) {
            Some("rule") => Some(SourceKind::Rule),
            Some("article") => Some(SourceKind::Article),
            _ => None,
        }
    }
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
