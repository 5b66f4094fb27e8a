//! Turning a crawl batch into one structured analysis with a single model
//! call.
//!
//! # Flow
//!
//! 1. Take the prompt view of the batch (first few documents, each cut short)
//! 2. Render the prompt: articles, the JSON skeleton, and per-field rules
//! 3. Ask for a JSON object
//! 4. Parse the reply; anything that is not a JSON object is rejected
//! 5. Check the object against the schema and apply the enforcement policy
//!
//! The prompt is a pure function of the batch, the topic, and the schema, so
//! identical inputs always produce the same request.

use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::client::{ChatRequest, Message, ModelClient};
use super::schema::{ExtractionSchema, Violation};
use crate::config::{CrawlConfig, SchemaEnforcement};
use crate::error::{Error, Result};
use crate::models::{CrawlBatch, PromptDocument, StructuredResult};
use crate::utils::{looks_truncated, truncate_for_log};

pub const SYSTEM_PROMPT: &str = "You are an expert news analyst. Extract structured insights from the provided news content. respond with valid JSON matching the schema.";

const PREVIEW_CHARS: usize = 300;

pub struct StructuredExtractor {
    client: Arc<dyn ModelClient>,
    model: String,
    schema: ExtractionSchema,
    enforcement: SchemaEnforcement,
    max_documents: usize,
    max_chars: usize,
}

impl StructuredExtractor {
    pub fn new(client: Arc<dyn ModelClient>, model: impl Into<String>) -> Self {
        let limits = CrawlConfig::default();
        Self {
            client,
            model: model.into(),
            schema: ExtractionSchema::tech_news(),
            enforcement: SchemaEnforcement::default(),
            max_documents: limits.max_prompt_documents,
            max_chars: limits.max_prompt_chars,
        }
    }

    pub fn with_schema(mut self, schema: ExtractionSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_enforcement(mut self, enforcement: SchemaEnforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    /// How much of the batch goes into the prompt.
    pub fn with_prompt_limits(mut self, max_documents: usize, max_chars: usize) -> Self {
        self.max_documents = max_documents;
        self.max_chars = max_chars;
        self
    }

    /// The full user prompt for `batch` and `topic`.
    pub fn render_prompt(&self, batch: &CrawlBatch, topic: &str) -> String {
        let articles = render_articles(&batch.prompt_view(self.max_documents, self.max_chars));
        format!(
            "You are a tech news analyst. Analyze the following articles about \"{topic}\" and provide structured insights.\n\
             \n\
             ARTICLES:\n\
             {articles}\n\
             \n\
             You MUST respond with a JSON object in EXACTLY this format (no other format is acceptable):\n\
             {template}\n\
             \n\
             IMPORTANT RULES:\n\
             {rules}\n\
             \n\
             Respond ONLY with the JSON object, no other text.",
            template = self.schema.render_template(topic),
            rules = self.schema.render_rules(topic),
        )
    }

    pub fn build_request(&self, batch: &CrawlBatch, topic: &str) -> ChatRequest {
        ChatRequest::new(self.model.clone())
            .message(Message::system(SYSTEM_PROMPT))
            .message(Message::user(self.render_prompt(batch, topic)))
            .json_object()
    }

    /// Ask the model for an analysis of `batch` and return the object it
    /// replied with.
    ///
    /// Issues exactly one request. A failed call surfaces as
    /// [`Error::ModelCall`]; an empty, non-JSON, or non-object reply as
    /// [`Error::ModelParse`]. Schema departures are logged, and only fail the
    /// call under [`SchemaEnforcement::Strict`].
    #[instrument(level = "info", skip_all, fields(topic = %topic, documents = batch.len()))]
    pub async fn extract(&self, batch: &CrawlBatch, topic: &str) -> Result<StructuredResult> {
        let t0 = Instant::now();
        let request = self.build_request(batch, topic);
        debug!(
            prompt_chars = request.messages.last().map(|m| m.content.len()).unwrap_or(0),
            model = %self.model,
            "Sending extraction request"
        );

        let reply = self.client.chat_completion(&request).await?;
        let value = parse_reply(&reply)?;

        let violations = self.schema.validate(&value);
        if !violations.is_empty() {
            let listed = violations.iter().map(Violation::to_string).collect::<Vec<_>>();
            match self.enforcement {
                SchemaEnforcement::Advisory => {
                    warn!(violations = ?listed, "Reply does not match the schema; keeping it as is");
                }
                SchemaEnforcement::Strict => {
                    warn!(violations = ?listed, "Reply does not match the schema; rejecting it");
                    return Err(Error::ModelParse {
                        reason: format!("schema violations: {}", listed.join("; ")),
                        preview: truncate_for_log(&reply, PREVIEW_CHARS),
                    });
                }
            }
        }

        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            violations = violations.len(),
            "Structured extraction finished"
        );
        Ok(StructuredResult(value))
    }
}

impl std::fmt::Debug for StructuredExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredExtractor")
            .field("model", &self.model)
            .field("enforcement", &self.enforcement)
            .field("max_documents", &self.max_documents)
            .field("max_chars", &self.max_chars)
            .finish_non_exhaustive()
    }
}

/// `[n] title (source):\nexcerpt...` per document, blank line between.
fn render_articles(view: &[PromptDocument<'_>]) -> String {
    view.iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {} ({}):\n{}...", i + 1, doc.title, doc.source, doc.excerpt))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn parse_reply(reply: &str) -> Result<Value> {
    let preview = || truncate_for_log(reply, PREVIEW_CHARS);

    if reply.trim().is_empty() {
        return Err(Error::ModelParse {
            reason: "empty reply".into(),
            preview: String::new(),
        });
    }

    let value: Value = serde_json::from_str(reply).map_err(|e| {
        let reason = if looks_truncated(&e) {
            format!("reply looks truncated: {e}")
        } else {
            format!("reply is not JSON: {e}")
        };
        warn!(error = %e, response_preview = %preview(), "Model returned non-JSON");
        Error::ModelParse {
            reason,
            preview: preview(),
        }
    })?;

    if !value.is_object() {
        return Err(Error::ModelParse {
            reason: "reply is JSON but not an object".into(),
            preview: preview(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::testing::ScriptedModel;
    use crate::llm::client::ResponseFormat;
    use crate::models::{NormalizedDocument, Source};
    use serde_json::json;

    fn doc(title: &str, source: Source, content: &str) -> NormalizedDocument {
        NormalizedDocument {
            title: title.to_string(),
            url: format!("https://example.com/{}", title.replace(' ', "-")),
            content: content.to_string(),
            source,
            published_at: None,
        }
    }

    fn batch() -> CrawlBatch {
        CrawlBatch::from(vec![
            doc("Chip launch", Source::TechCrunch, "A new accelerator ships."),
            doc("Data center demand", Source::Nvidia, "Orders keep growing."),
        ])
    }

    fn extractor(model: Arc<ScriptedModel>) -> StructuredExtractor {
        StructuredExtractor::new(model, "test-model")
    }

    const CONFORMING: &str = r#"{"topic":"AI","keyFindings":["a","b","c"],"entities":[{"name":"NVIDIA","type":"company","relevance":"r"}],"sentiment":"positive"}"#;

    #[tokio::test]
    async fn test_returns_parsed_object_verbatim() {
        let model = Arc::new(ScriptedModel::replying(CONFORMING));
        let result = extractor(model.clone()).extract(&batch(), "AI").await.unwrap();

        assert_eq!(result.as_value(), &serde_json::from_str::<Value>(CONFORMING).unwrap());
        assert_eq!(result.key_findings(), ["a", "b", "c"]);
        assert_eq!(model.call_count(), 1);

        let request = &model.requests.lock().unwrap()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.response_format, Some(ResponseFormat::JsonObject));
        assert_eq!(request.messages[0], Message::system(SYSTEM_PROMPT));
        assert_eq!(request.messages[1].role, "user");
    }

    #[tokio::test]
    async fn test_minimal_reply_conforms_under_strict() {
        let reply = r#"{"topic":"X","keyFindings":["a","b","c"],"entities":[],"sentiment":"neutral"}"#;
        let model = Arc::new(ScriptedModel::replying(reply));

        let result = extractor(model)
            .with_enforcement(SchemaEnforcement::Strict)
            .extract(&batch(), "X")
            .await
            .unwrap();

        assert_eq!(
            result.as_value(),
            &json!({"topic": "X", "keyFindings": ["a", "b", "c"], "entities": [], "sentiment": "neutral"})
        );
    }

    #[tokio::test]
    async fn test_non_json_reply_is_a_parse_error() {
        let model = Arc::new(ScriptedModel::replying("Sure! Here are the findings: ..."));
        let err = extractor(model).extract(&batch(), "AI").await.unwrap_err();

        match err {
            Error::ModelParse { preview, .. } => assert!(preview.starts_with("Sure!")),
            other => panic!("expected ModelParse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_and_non_object_replies_are_rejected() {
        for reply in ["", "   ", "[1,2,3]", "\"text\""] {
            let model = Arc::new(ScriptedModel::replying(reply));
            let err = extractor(model).extract(&batch(), "AI").await.unwrap_err();
            assert!(matches!(err, Error::ModelParse { .. }), "reply {reply:?}");
        }
    }

    #[tokio::test]
    async fn test_truncated_reply_is_reported_as_such() {
        let model = Arc::new(ScriptedModel::replying(r#"{"topic":"AI","keyFindings":["a""#));
        let err = extractor(model).extract(&batch(), "AI").await.unwrap_err();
        match err {
            Error::ModelParse { reason, .. } => assert!(reason.contains("truncated")),
            other => panic!("expected ModelParse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_call_failure_propagates() {
        let model = Arc::new(ScriptedModel::new([Err(Error::ModelCall("connection refused".into()))]));
        let err = extractor(model).extract(&batch(), "AI").await.unwrap_err();
        assert!(matches!(err, Error::ModelCall(_)));
    }

    #[tokio::test]
    async fn test_advisory_keeps_nonconforming_object() {
        let reply = r#"{"topic":"AI","keyFindings":["only"],"sentiment":"bullish"}"#;
        let model = Arc::new(ScriptedModel::replying(reply));

        let result = extractor(model).extract(&batch(), "AI").await.unwrap();

        assert_eq!(result.as_value()["sentiment"], json!("bullish"));
    }

    #[tokio::test]
    async fn test_strict_rejects_nonconforming_object() {
        let reply = r#"{"topic":"AI","keyFindings":["only"],"sentiment":"bullish"}"#;
        let model = Arc::new(ScriptedModel::replying(reply));

        let err = extractor(model)
            .with_enforcement(SchemaEnforcement::Strict)
            .extract(&batch(), "AI")
            .await
            .unwrap_err();

        match err {
            Error::ModelParse { reason, .. } => {
                assert!(reason.contains("keyFindings"));
                assert!(reason.contains("entities"));
                assert!(reason.contains("sentiment"));
            }
            other => panic!("expected ModelParse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_strict_accepts_conforming_object() {
        let model = Arc::new(ScriptedModel::replying(CONFORMING));
        let result = extractor(model)
            .with_enforcement(SchemaEnforcement::Strict)
            .extract(&batch(), "AI")
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_prompt_layout() {
        let model = Arc::new(ScriptedModel::default());
        let prompt = extractor(model).render_prompt(&batch(), "AI chips");

        assert!(prompt.starts_with(
            "You are a tech news analyst. Analyze the following articles about \"AI chips\""
        ));
        assert!(prompt.contains(
            "ARTICLES:\n[1] Chip launch (techcrunch):\nA new accelerator ships....\n\n[2] Data center demand (nvidia):\nOrders keep growing...."
        ));
        assert!(prompt.contains("  \"topic\": \"AI chips\","));
        assert!(prompt.contains("IMPORTANT RULES:\n- keyFindings:"));
        assert!(prompt.ends_with("Respond ONLY with the JSON object, no other text."));
    }

    #[test]
    fn test_prompt_uses_only_the_truncated_view() {
        let docs: Vec<NormalizedDocument> = (0..12)
            .map(|i| doc(&format!("Story {i}"), Source::Yahoo, &"x".repeat(800)))
            .collect();
        let batch = CrawlBatch::from(docs);
        let model = Arc::new(ScriptedModel::default());
        let prompt = extractor(model).render_prompt(&batch, "AI");

        assert!(prompt.contains("[10] Story 9 (yahoo)"));
        assert!(!prompt.contains("[11]"));
        assert!(prompt.contains(&format!("\n{}...", "x".repeat(500))));
        assert!(!prompt.contains(&"x".repeat(501)));
        // The batch itself is untouched.
        assert_eq!(batch.documents()[0].content.len(), 800);
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let model = Arc::new(ScriptedModel::default());
        let extractor = extractor(model);
        assert_eq!(
            extractor.build_request(&batch(), "AI"),
            extractor.build_request(&batch(), "AI")
        );
    }
}
