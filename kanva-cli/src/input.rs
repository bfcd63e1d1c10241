//! Reading advisor inputs from JSON files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use kanva_advisor::{ArticleRecord, ChatMessage, OrderContext, PlanDocument, RuleRecord, UserProfile};
use serde::de::DeserializeOwned;
use serde_json::Value;

fn read_value(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn parse<T: DeserializeOwned>(path: &Path, value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).with_context(|| format!("{} is not a valid {what}", path.display()))
}

/// A plan file holds either a bare plan or a plan version wrapping one under
/// `plan`.
pub fn plan(path: &Path) -> Result<PlanDocument> {
    let mut value = read_value(path)?;
    if let Some(inner) = value.get_mut("plan").map(Value::take) {
        value = inner;
    }
    parse(path, value, "plan document")
}

pub fn rules(path: &Path) -> Result<Vec<RuleRecord>> {
    parse(path, read_value(path)?, "rule list")
}

pub fn articles(path: &Path) -> Result<Vec<ArticleRecord>> {
    parse(path, read_value(path)?, "article list")
}

pub fn context(path: Option<&Path>) -> Result<OrderContext> {
    let Some(path) = path else {
        return Ok(OrderContext::new());
    };
    match read_value(path)? {
        Value::Object(map) => Ok(map),
        _ => bail!("{} must contain a JSON object", path.display()),
    }
}

pub fn profile(path: Option<&Path>) -> Result<Option<UserProfile>> {
    path.map(|path| parse(path, read_value(path)?, "user profile")).transpose()
}

pub fn history(path: Option<&Path>) -> Result<Vec<ChatMessage>> {
    match path {
        Some(path) => parse(path, read_value(path)?, "chat history"),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn plan_version_is_unwrapped() {
        let f = file(r#"{"id": "v1", "plan": {"meta": {"width": 10, "height": 10}, "elements": []}}"#);
        let plan = plan(f.path()).unwrap();
        assert_eq!(plan.meta.width, 10.0);
    }

    #[test]
    fn bare_plan_is_accepted() {
        let f = file(r#"{"meta": {"width": 5, "height": 4}}"#);
        assert!(plan(f.path()).unwrap().elements.is_empty());
    }

    #[test]
    fn context_must_be_an_object() {
        let f = file("[1, 2]");
        assert!(context(Some(f.path())).is_err());
        assert!(context(None).unwrap().is_empty());
    }

    #[test]
    fn numeric_rule_ids_are_accepted() {
        let f = file(r#"[{"id": 7, "title": "Несущие стены"}]"#);
        let rules = rules(f.path()).unwrap();
        assert_eq!(rules[0].id.as_deref(), Some("7"));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = rules(Path::new("/nonexistent/rules.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rules.json"));
    }
}
