//! JSON schema sent with every plan-analysis request.
//!
//! The provider interprets this document, so field names, enum values and the
//! `minItems`/`maxItems` bounds on `alts` must stay exactly as written.

use serde_json::{Value, json};

/// Schema of the `{summary, risks}` object returned by plan analysis.
pub fn risk_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": {
                "type": "string",
                "description": "Краткое резюме анализа планировки"
            },
            "risks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "type": {
                            "type": "string",
                            "enum": ["TECHNICAL", "LEGAL", "FINANCIAL", "OPERATIONAL"],
                            "description": "Тип риска"
                        },
                        "description": {
                            "type": "string",
                            "description": "Текстовое описание риска",
                            "minLength": 1
                        },
                        "severity": {
                            "type": "integer",
                            "description": "Серьёзность риска по шкале 1–5",
                            "minimum": 1,
                            "maximum": 5
                        },
                        "zone": {
                            "type": "string",
                            "description": "ID элемента на плане (например, wall_12, zone_1)"
                        },
                        "risk_id": {"type": "string"},
                        "severity_str": {
                            "type": "string",
                            "enum": ["low", "medium", "high", "critical"]
                        },
                        "title": {"type": "string"},
                        "regulation_reference": {"type": "string"},
                        "recommendation": {"type": "string"},
                        "affected_elements": {
                            "type": "array",
                            "items": {"type": "string"}
                        },
                        "alternative_suggestion": {"type": "string"},
                        "alts": {
                            "type": "array",
                            "description": "Массив альтернативных вариантов планировки с геометрией (минимум 3, максимум 5)",
                            "minItems": 3,
                            "maxItems": 5,
                            "items": {
                                "type": "object",
                                "description": "Альтернативный вариант планировки с геометрией элементов",
                                "additionalProperties": true,
                                "properties": {
                                    "description": {
                                        "type": "string",
                                        "description": "Описание варианта"
                                    },
                                    "elements": {
                                        "type": "array",
                                        "description": "Элементы плана с геометрией",
                                        "items": {
                                            "type": "object",
                                            "additionalProperties": true
                                        }
                                    }
                                }
                            }
                        }
                    },
                    "required": ["type", "description"]
                }
            }
        },
        "required": ["summary", "risks"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alts_bounds_and_required_fields() {
        let schema = risk_schema();
        let item = &schema["properties"]["risks"]["items"];
        assert_eq!(item["required"], json!(["type", "description"]));
        assert_eq!(item["properties"]["alts"]["minItems"], 3);
        assert_eq!(item["properties"]["alts"]["maxItems"], 5);
        assert_eq!(schema["required"], json!(["summary", "risks"]));
    }

    #[test]
    fn key_order_is_preserved() {
        let schema = risk_schema();
        let keys: Vec<_> =
            schema["properties"]["risks"]["items"]["properties"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys[..4], ["type", "description", "severity", "zone"]);
    }
}
