//! Declarative description of the JSON object the model is asked for.
//!
//! One [`ExtractionSchema`] drives both sides of the exchange: it renders
//! the format block and rules that go into the prompt, and it checks the
//! parsed reply afterwards. The model is only ever *asked* to follow it;
//! what happens to a reply that doesn't is decided by
//! [`crate::config::SchemaEnforcement`].

use serde_json::{json, Value};
use std::fmt;

/// Shape of a single item inside a list field.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemShape {
    Text,
    Object(Vec<ObjectKey>),
}

/// A key of an object item.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectKey {
    pub name: &'static str,
    pub required: bool,
    /// Allowed values, when the key is an enumeration.
    pub one_of: Option<&'static [&'static str]>,
}

impl ObjectKey {
    fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            one_of: None,
        }
    }

    fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
            one_of: None,
        }
    }

    fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = Some(values);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    Text,
    OneOf(&'static [&'static str]),
    List {
        item: ItemShape,
        min: Option<usize>,
        max: Option<usize>,
    },
}

/// One top-level field of the requested object.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: &'static str,
    pub shape: FieldShape,
    pub required: bool,
    /// Example value shown in the prompt. `None` shows the topic itself.
    pub example: Option<Value>,
    /// Rule line for the prompt; `{topic}` is replaced with the topic.
    pub rule: Option<&'static str>,
}

/// A way in which a reply departs from the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub problem: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionSchema {
    pub fields: Vec<SchemaField>,
}

pub const ENTITY_TYPES: &[&str] = &["company", "product", "person", "organization"];
pub const SENTIMENTS: &[&str] = &["positive", "negative", "neutral", "mixed"];

impl ExtractionSchema {
    /// Topic, 3-5 key findings, typed entities, overall sentiment, and an
    /// optional timeline.
    pub fn tech_news() -> Self {
        Self {
            fields: vec![
                SchemaField {
                    name: "topic",
                    shape: FieldShape::Text,
                    required: true,
                    example: None,
                    rule: None,
                },
                SchemaField {
                    name: "keyFindings",
                    shape: FieldShape::List {
                        item: ItemShape::Text,
                        min: Some(3),
                        max: Some(5),
                    },
                    required: true,
                    example: Some(json!(["finding 1", "finding 2", "finding 3"])),
                    rule: Some("List 3-5 key takeaways from the articles related to the topic \"{topic}\""),
                },
                SchemaField {
                    name: "entities",
                    shape: FieldShape::List {
                        item: ItemShape::Object(vec![
                            ObjectKey::required("name"),
                            ObjectKey::required("type").one_of(ENTITY_TYPES),
                            ObjectKey::required("relevance"),
                        ]),
                        min: None,
                        max: None,
                    },
                    required: true,
                    example: Some(json!([{
                        "name": "Entity Name",
                        "type": ENTITY_TYPES.join("|"),
                        "relevance": "why this entity matters"
                    }])),
                    rule: Some("List important companies, products, or people mentioned"),
                },
                SchemaField {
                    name: "sentiment",
                    shape: FieldShape::OneOf(SENTIMENTS),
                    required: true,
                    example: Some(json!(SENTIMENTS.join("|"))),
                    rule: Some("Overall market/news sentiment about the topic; exactly one of positive, negative, neutral, mixed"),
                },
                SchemaField {
                    name: "timeline",
                    shape: FieldShape::List {
                        item: ItemShape::Object(vec![
                            ObjectKey::optional("date"),
                            ObjectKey::optional("event"),
                        ]),
                        min: None,
                        max: None,
                    },
                    required: false,
                    example: Some(json!([{
                        "date": "YYYY-MM-DD or description",
                        "event": "what happened"
                    }])),
                    rule: Some("Key events or announcements with dates if available"),
                },
            ],
        }
    }

    /// The JSON skeleton shown to the model, one field per line in schema
    /// order.
    pub fn render_template(&self, topic: &str) -> String {
        let lines = self
            .fields
            .iter()
            .map(|field| {
                let example = field
                    .example
                    .clone()
                    .unwrap_or_else(|| Value::String(topic.to_string()));
                format!("  \"{}\": {}", field.name, example)
            })
            .collect::<Vec<_>>();
        format!("{{\n{}\n}}", lines.join(",\n"))
    }

    /// Rule lines, `- name: rule`, for fields that carry one.
    pub fn render_rules(&self, topic: &str) -> String {
        self.fields
            .iter()
            .filter_map(|field| {
                field
                    .rule
                    .map(|rule| format!("- {}: {}", field.name, rule.replace("{topic}", topic)))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every way `value` departs from the schema. Empty means it conforms.
    pub fn validate(&self, value: &Value) -> Vec<Violation> {
        let mut violations = Vec::new();
        let Some(object) = value.as_object() else {
            violations.push(violation("$", "reply is not a JSON object"));
            return violations;
        };

        for field in &self.fields {
            match object.get(field.name) {
                None | Some(Value::Null) => {
                    if field.required {
                        violations.push(violation(field.name, "missing required field"));
                    }
                }
                Some(found) => check_field(field, found, &mut violations),
            }
        }
        violations
    }
}

fn violation(field: impl Into<String>, problem: impl Into<String>) -> Violation {
    Violation {
        field: field.into(),
        problem: problem.into(),
    }
}

fn check_field(field: &SchemaField, found: &Value, out: &mut Vec<Violation>) {
    match &field.shape {
        FieldShape::Text => {
            if !found.is_string() {
                out.push(violation(field.name, "expected a string"));
            }
        }
        FieldShape::OneOf(allowed) => match found.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => out.push(violation(
                field.name,
                format!("\"{s}\" is not one of {}", allowed.join(", ")),
            )),
            None => out.push(violation(field.name, "expected a string")),
        },
        FieldShape::List { item, min, max } => {
            let Some(items) = found.as_array() else {
                out.push(violation(field.name, "expected an array"));
                return;
            };
            if let Some(min) = min.filter(|min| items.len() < *min) {
                out.push(violation(
                    field.name,
                    format!("expected at least {min} entries, got {}", items.len()),
                ));
            }
            if let Some(max) = max.filter(|max| items.len() > *max) {
                out.push(violation(
                    field.name,
                    format!("expected at most {max} entries, got {}", items.len()),
                ));
            }
            for (i, entry) in items.iter().enumerate() {
                check_item(&format!("{}[{i}]", field.name), item, entry, out);
            }
        }
    }
}

fn check_item(path: &str, shape: &ItemShape, entry: &Value, out: &mut Vec<Violation>) {
    match shape {
        ItemShape::Text => {
            if !entry.is_string() {
                out.push(violation(path, "expected a string"));
            }
        }
        ItemShape::Object(keys) => {
            let Some(object) = entry.as_object() else {
                out.push(violation(path, "expected an object"));
                return;
            };
            for key in keys {
                let key_path = format!("{path}.{}", key.name);
                match object.get(key.name) {
                    None | Some(Value::Null) if key.required => {
                        out.push(violation(key_path, "missing required key"));
                    }
                    None | Some(Value::Null) => {}
                    Some(Value::String(s)) => match key.one_of {
                        Some(allowed) if !allowed.contains(&s.as_str()) => out.push(violation(
                            key_path,
                            format!("\"{s}\" is not one of {}", allowed.join(", ")),
                        )),
                        _ => {}
                    },
                    Some(_) => out.push(violation(key_path, "expected a string")),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conforming() -> Value {
        json!({
            "topic": "AI chips",
            "keyFindings": ["a", "b", "c"],
            "entities": [{"name": "NVIDIA", "type": "company", "relevance": "leader"}],
            "sentiment": "positive",
            "timeline": [{"date": "2026-01-14", "event": "launch"}]
        })
    }

    #[test]
    fn test_conforming_reply_has_no_violations() {
        assert!(ExtractionSchema::tech_news().validate(&conforming()).is_empty());
    }

    #[test]
    fn test_timeline_is_optional() {
        let mut value = conforming();
        value.as_object_mut().unwrap().remove("timeline");
        assert!(ExtractionSchema::tech_news().validate(&value).is_empty());
    }

    #[test]
    fn test_reports_each_departure() {
        let value = json!({
            "keyFindings": ["only one"],
            "entities": [{"name": "Acme", "type": "startup"}],
            "sentiment": "bullish"
        });
        let fields: Vec<String> = ExtractionSchema::tech_news()
            .validate(&value)
            .into_iter()
            .map(|v| v.field)
            .collect();
        assert_eq!(
            fields,
            [
                "topic",
                "keyFindings",
                "entities[0].type",
                "entities[0].relevance",
                "sentiment"
            ]
        );
    }

    #[test]
    fn test_too_many_findings_and_wrong_types() {
        let value = json!({
            "topic": 7,
            "keyFindings": ["1", "2", "3", "4", "5", 6],
            "entities": {},
            "sentiment": "neutral"
        });
        let violations = ExtractionSchema::tech_news().validate(&value);
        let shown: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
        assert_eq!(
            shown,
            [
                "topic: expected a string",
                "keyFindings: expected at most 5 entries, got 6",
                "keyFindings[5]: expected a string",
                "entities: expected an array"
            ]
        );
    }

    #[test]
    fn test_non_object_reply() {
        let violations = ExtractionSchema::tech_news().validate(&json!(["x"]));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "$");
    }

    #[test]
    fn test_template_lists_fields_in_order_with_topic() {
        let template = ExtractionSchema::tech_news().render_template("Quantum");
        let lines: Vec<&str> = template.lines().collect();
        assert_eq!(lines[0], "{");
        assert_eq!(lines[1], r#"  "topic": "Quantum","#);
        assert!(lines[2].starts_with(r#"  "keyFindings": ["finding 1","#));
        assert!(template.contains("company|product|person|organization"));
        assert!(template.contains(r#""sentiment": "positive|negative|neutral|mixed""#));
        assert_eq!(*lines.last().unwrap(), "}");
    }

    #[test]
    fn test_rules_substitute_topic() {
        let rules = ExtractionSchema::tech_news().render_rules("Quantum");
        assert_eq!(rules.lines().count(), 4);
        assert!(rules.starts_with(
            "- keyFindings: List 3-5 key takeaways from the articles related to the topic \"Quantum\""
        ));
        assert!(rules.contains(
            "- sentiment: Overall market/news sentiment about the topic; exactly one of positive, negative, neutral, mixed"
        ));
    }
}
