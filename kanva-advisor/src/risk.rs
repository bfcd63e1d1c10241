//! Risk records and the tolerant decoder for model output.
//!
//! The generator is asked for output matching [`risk_schema`](crate::schema::risk_schema),
//! but nothing forces it to comply. [`normalize_risks`] decodes each raw item
//! independently: required fields are `type` and `description`, everything
//! else is best effort. An item that fails validation is dropped with a
//! warning and the rest are kept in their original order.

use std::fmt;
use std::str::FromStr;

use kanva_telemetry::redact_sensitive;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

const MAX_ALTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskType {
    Technical,
    Legal,
    Financial,
    Operational,
}

impl RiskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskType::Technical => "TECHNICAL",
            RiskType::Legal => "LEGAL",
            RiskType::Financial => "FINANCIAL",
            RiskType::Operational => "OPERATIONAL",
        }
    }
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TECHNICAL" => Ok(RiskType::Technical),
            "LEGAL" => Ok(RiskType::Legal),
            "FINANCIAL" => Ok(RiskType::Financial),
            "OPERATIONAL" => Ok(RiskType::Operational),
            _ => Err(()),
        }
    }
}

/// Textual severity, used when the model does not give a 1–5 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Low => "low",
            SeverityLevel::Medium => "medium",
            SeverityLevel::High => "high",
            SeverityLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeverityLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(SeverityLevel::Low),
            "medium" => Ok(SeverityLevel::Medium),
            "high" => Ok(SeverityLevel::High),
            "critical" => Ok(SeverityLevel::Critical),
            _ => Err(()),
        }
    }
}

/// A validated risk found in a plan.
///
/// At most one of `severity` and `severity_str` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    #[serde(rename = "type")]
    pub risk_type: RiskType,
    pub description: String,
    /// Score on a 1–5 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity_str: Option<SeverityLevel>,
    /// Id of the plan element the risk is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulation_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_elements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_suggestion: Option<String>,
    /// Alternative layouts, each carrying changed plan elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alts: Option<Vec<Map<String, Value>>>,
}

impl RiskRecord {
    /// Severity as shown to users: the score, the level, or `не указана`.
    pub fn severity_label(&self) -> String {
        match (self.severity, self.severity_str) {
            (Some(score), _) => score.to_string(),
            (None, Some(level)) => level.to_string(),
            (None, None) => "не указана".to_string(),
        }
    }
}

/// Why a raw risk item was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskValidationError {
    #[error("risk item is not a JSON object")]
    NotAnObject,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType { field: &'static str, expected: &'static str },

    #[error("field '{field}' has unsupported value '{value}'")]
    InvalidEnum { field: &'static str, value: String },

    #[error("severity {0} is outside 1..=5")]
    OutOfRange(String),

    #[error("alts has {0} entries, at most {max} allowed", max = MAX_ALTS)]
    TooManyAlts(usize),
}

type Validation<T> = std::result::Result<T, RiskValidationError>;

/// Look up the first present, non-null key among `names`.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().filter_map(|name| obj.get(*name)).find(|v| !v.is_null())
}

fn opt_string(obj: &Map<String, Value>, names: &[&'static str]) -> Validation<Option<String>> {
    match field(obj, names) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(RiskValidationError::WrongType { field: names[0], expected: "a string" }),
    }
}

/// Integral scores must lie in 1..=5. Fractional or non-numeric scores carry
/// no usable rating and are dropped without rejecting the item.
fn severity_score(value: &Value) -> Validation<Option<u8>> {
    let score = match (value.as_i64(), value.as_f64()) {
        (Some(n), _) => n as f64,
        (None, Some(f)) if f.fract() == 0.0 => f,
        _ => {
            debug!(severity = %value, "ignoring non-integer severity");
            return Ok(None);
        }
    };
    if (1.0..=5.0).contains(&score) {
        Ok(Some(score as u8))
    } else {
        Err(RiskValidationError::OutOfRange(value.to_string()))
    }
}

fn severity_level(field: &'static str, raw: &str) -> Validation<SeverityLevel> {
    raw.parse()
        .map_err(|_| RiskValidationError::InvalidEnum { field, value: raw.to_string() })
}

/// Decode one raw item into a [`RiskRecord`].
///
/// Field rules:
/// - `type` must be one of the four risk types (any letter case).
/// - `description` must be a non-empty string.
/// - `severity` as an integer in 1–5 sets `severity`; as a string it sets
///   `severity_str`. A fractional score is ignored. An explicit
///   `severity_str` is used only when no numeric score was kept.
/// - Other fields are copied when present; `null` counts as absent and
///   camelCase spellings are accepted.
pub fn normalize_risk(raw: &Value) -> Validation<RiskRecord> {
    let obj = raw.as_object().ok_or(RiskValidationError::NotAnObject)?;

    let risk_type = match field(obj, &["type"]) {
        None => return Err(RiskValidationError::MissingField("type")),
        Some(Value::String(s)) => s
            .parse::<RiskType>()
            .map_err(|_| RiskValidationError::InvalidEnum { field: "type", value: s.clone() })?,
        Some(_) => return Err(RiskValidationError::WrongType { field: "type", expected: "a string" }),
    };

    let description = match field(obj, &["description"]) {
        None => return Err(RiskValidationError::MissingField("description")),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(RiskValidationError::MissingField("description"));
        }
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(RiskValidationError::WrongType { field: "description", expected: "a string" });
        }
    };

    let (mut severity, mut severity_str) = (None, None);
    match field(obj, &["severity"]) {
        None => {}
        Some(Value::String(s)) => severity_str = Some(severity_level("severity", s)?),
        Some(value) => severity = severity_score(value)?,
    }
    match field(obj, &["severity_str", "severityStr"]) {
        None => {}
        Some(Value::String(s)) => {
            let level = severity_level("severity_str", s)?;
            if severity.is_none() {
                severity_str = Some(level);
            }
        }
        Some(_) => {
            return Err(RiskValidationError::WrongType { field: "severity_str", expected: "a string" });
        }
    }

    let affected_elements = match field(obj, &["affected_elements", "affectedElements"]) {
        None => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or(RiskValidationError::WrongType {
                    field: "affected_elements",
                    expected: "an array of strings",
                })?,
        ),
        Some(_) => {
            return Err(RiskValidationError::WrongType {
                field: "affected_elements",
                expected: "an array of strings",
            });
        }
    };

    let alts = match field(obj, &["alts"]) {
        None => None,
        Some(Value::Array(items)) => {
            if items.len() > MAX_ALTS {
                return Err(RiskValidationError::TooManyAlts(items.len()));
            }
            Some(
                items
                    .iter()
                    .map(|item| item.as_object().cloned())
                    .collect::<Option<Vec<_>>>()
                    .ok_or(RiskValidationError::WrongType {
                        field: "alts",
                        expected: "an array of objects",
                    })?,
            )
        }
        Some(_) => {
            return Err(RiskValidationError::WrongType { field: "alts", expected: "an array of objects" });
        }
    };

    Ok(RiskRecord {
        risk_type,
        description,
        severity,
        severity_str,
        zone: opt_string(obj, &["zone"])?,
        risk_id: opt_string(obj, &["risk_id", "riskId"])?,
        title: opt_string(obj, &["title"])?,
        regulation_reference: opt_string(obj, &["regulation_reference", "regulationReference"])?,
        recommendation: opt_string(obj, &["recommendation"])?,
        affected_elements,
        alternative_suggestion: opt_string(obj, &["alternative_suggestion", "alternativeSuggestion"])?,
        alts,
    })
}

/// Decode every raw item, dropping the ones that fail validation.
///
/// Output order follows input order.
pub fn normalize_risks(raw: &[Value]) -> Vec<RiskRecord> {
    raw.iter()
        .enumerate()
        .filter_map(|(index, item)| match normalize_risk(item) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(index, error = %redact_sensitive(&e.to_string()), "dropping invalid risk item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn string_severity_becomes_severity_str() {
        let risk = normalize_risk(&json!({"type": "LEGAL", "description": "x", "severity": "high"})).unwrap();
        assert_eq!(risk.severity_str, Some(SeverityLevel::High));
        assert_eq!(risk.severity, None);
    }

    #[test]
    fn integer_severity_is_kept() {
        let risk = normalize_risk(&json!({"type": "LEGAL", "description": "x", "severity": 3})).unwrap();
        assert_eq!(risk.severity, Some(3));
        assert_eq!(risk.severity_str, None);
    }

    #[test]
    fn numeric_severity_wins_over_explicit_level() {
        let risk = normalize_risk(&json!({
            "type": "TECHNICAL", "description": "x", "severity": 4, "severity_str": "low"
        }))
        .unwrap();
        assert_eq!(risk.severity, Some(4));
        assert_eq!(risk.severity_str, None);
    }

    #[test]
    fn integral_float_severity_is_accepted() {
        let risk = normalize_risk(&json!({"type": "legal", "description": "x", "severity": 2.0})).unwrap();
        assert_eq!(risk.risk_type, RiskType::Legal);
        assert_eq!(risk.severity, Some(2));
    }

    #[test]
    fn fractional_severity_keeps_the_item_unscored() {
        let risk = normalize_risk(&json!({"type": "TECHNICAL", "description": "x", "severity": 2.5})).unwrap();
        assert_eq!(risk.description, "x");
        assert_eq!(risk.severity, None);
        assert_eq!(risk.severity_str, None);

        let risk = normalize_risk(&json!({
            "type": "TECHNICAL", "description": "x", "severity": 3.7, "severity_str": "high"
        }))
        .unwrap();
        assert_eq!(risk.severity, None);
        assert_eq!(risk.severity_str, Some(SeverityLevel::High));
    }

    #[test]
    fn invalid_items_are_rejected() {
        let cases = [
            (json!("text"), RiskValidationError::NotAnObject),
            (json!({"type": "LEGAL"}), RiskValidationError::MissingField("description")),
            (json!({"type": "LEGAL", "description": null}), RiskValidationError::MissingField("description")),
            (json!({"description": "x"}), RiskValidationError::MissingField("type")),
            (
                json!({"type": "SOCIAL", "description": "x"}),
                RiskValidationError::InvalidEnum { field: "type", value: "SOCIAL".into() },
            ),
            (
                json!({"type": "LEGAL", "description": "x", "severity": 9}),
                RiskValidationError::OutOfRange("9".into()),
            ),
            (
                json!({"type": "LEGAL", "description": "x", "severity": "extreme"}),
                RiskValidationError::InvalidEnum { field: "severity", value: "extreme".into() },
            ),
        ];
        for (raw, expected) in cases {
            assert_eq!(normalize_risk(&raw).unwrap_err(), expected, "{raw}");
        }
    }

    #[test]
    fn optional_fields_and_aliases_are_copied() {
        let risk = normalize_risk(&json!({
            "type": "OPERATIONAL",
            "description": "Узкий проход",
            "zone": "wall_12",
            "regulationReference": "СП 54.13330",
            "affected_elements": ["wall_12", "zone_1"],
            "alts": [{"description": "v1", "elements": []}],
            "recommendation": null
        }))
        .unwrap();
        assert_eq!(risk.zone.as_deref(), Some("wall_12"));
        assert_eq!(risk.regulation_reference.as_deref(), Some("СП 54.13330"));
        assert_eq!(risk.affected_elements.unwrap(), vec!["wall_12", "zone_1"]);
        assert_eq!(risk.alts.unwrap().len(), 1);
        assert!(risk.recommendation.is_none());
    }

    #[test]
    fn alts_are_bounded() {
        let alts: Vec<Value> = (0..6).map(|i| json!({"description": i.to_string()})).collect();
        let err = normalize_risk(&json!({"type": "LEGAL", "description": "x", "alts": alts})).unwrap_err();
        assert_eq!(err, RiskValidationError::TooManyAlts(6));
    }

    #[test]
    fn batch_drops_invalid_items_and_keeps_order() {
        let raw = vec![
            json!({"type": "LEGAL", "description": "first"}),
            json!({"type": "LEGAL"}),
            json!({"type": "FINANCIAL", "description": "third", "severity": 0}),
            json!({"type": "TECHNICAL", "description": "fourth"}),
        ];
        let risks = normalize_risks(&raw);
        let descriptions: Vec<_> = risks.iter().map(|r| r.description.as_str()).collect();
        assert_eq!(descriptions, ["first", "fourth"]);
    }

    #[test]
    fn serialization_omits_absent_fields() {
        let risk = normalize_risk(&json!({"type": "LEGAL", "description": "x", "severity": "medium"})).unwrap();
        assert_eq!(
            serde_json::to_value(&risk).unwrap(),
            json!({"type": "LEGAL", "description": "x", "severity_str": "medium"})
        );
        assert_eq!(risk.severity_label(), "medium");
    }
}
