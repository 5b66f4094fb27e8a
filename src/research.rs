//! One research cycle: crawl every source, then ask the model for a
//! structured analysis of what came back.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument};

use crate::config::{CrawlConfig, ProviderConfig, SchemaEnforcement, Settings};
use crate::crawl;
use crate::error::{Error, Result};
use crate::fetch::{FetchProvider, WebFetchProvider};
use crate::llm::{ModelClient, OpenAiClient, RetryingClient, StructuredExtractor};
use crate::models::{CrawlBatch, ResearchReport, StructuredResult};
use crate::scrapers::{extractors_for, SourceExtractor};

/// Everything a cycle needs besides the topic.
///
/// [`ResearchContext::from_settings`] wires up the real network; tests build
/// one by hand with stub fetchers and models.
#[derive(Clone)]
pub struct ResearchContext {
    pub extractors: Vec<Arc<dyn SourceExtractor>>,
    pub fetch_provider: Arc<dyn FetchProvider>,
    pub model: Arc<dyn ModelClient>,
    pub provider: ProviderConfig,
    pub crawl: CrawlConfig,
    pub schema_enforcement: SchemaEnforcement,
}

impl ResearchContext {
    /// Real fetchers and an OpenAI-compatible client for `settings`.
    ///
    /// Model calls are retried up to `max_retries` times on transient
    /// failures; zero means a single attempt.
    pub fn from_settings(settings: &Settings, max_retries: usize) -> Result<Self> {
        settings.provider.validate()?;
        let fetch_provider = WebFetchProvider::new(&settings.crawl)
            .map_err(|e| Error::Config(e.to_string()))?;
        let client = OpenAiClient::new(&settings.provider)?;
        let model = RetryingClient::new(client, max_retries, Duration::from_secs(1));

        Ok(Self {
            extractors: extractors_for(&settings.crawl.sources),
            fetch_provider: Arc::new(fetch_provider),
            model: Arc::new(model),
            provider: settings.provider.clone(),
            crawl: settings.crawl.clone(),
            schema_enforcement: settings.schema_enforcement,
        })
    }

    fn extractor(&self) -> StructuredExtractor {
        StructuredExtractor::new(Arc::clone(&self.model), self.provider.model_name.clone())
            .with_enforcement(self.schema_enforcement)
            .with_prompt_limits(self.crawl.max_prompt_documents, self.crawl.max_prompt_chars)
    }
}

impl std::fmt::Debug for ResearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchContext")
            .field(
                "sources",
                &self.extractors.iter().map(|e| e.source()).collect::<Vec<_>>(),
            )
            .field("provider", &self.provider)
            .field("crawl", &self.crawl)
            .field("schema_enforcement", &self.schema_enforcement)
            .finish_non_exhaustive()
    }
}

/// What a successful cycle produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchOutcome {
    pub topic: String,
    pub documents: CrawlBatch,
    pub result: StructuredResult,
}

impl ResearchOutcome {
    /// `Analysis of N articles regarding TOPIC. Key findings: a; b; c`
    pub fn summary(&self) -> String {
        self.result.summary(self.documents.len(), &self.topic)
    }

    pub fn into_report(self) -> ResearchReport {
        ResearchReport {
            summary: self.summary(),
            generated_at: chrono::Utc::now(),
            article_count: self.documents.len(),
            topic: self.topic,
            documents: self.documents,
            result: self.result,
        }
    }
}

/// Crawl all sources for `topic` and extract a structured analysis.
///
/// Source failures never fail the cycle. If no source produced a document
/// the cycle stops with [`Error::AllSourcesEmpty`] and the model is not
/// called. Model failures propagate unchanged.
#[instrument(level = "info", skip(context), fields(sources = context.extractors.len()))]
pub async fn run_research_cycle(topic: &str, context: &ResearchContext) -> Result<ResearchOutcome> {
    let t0 = Instant::now();
    info!("Research cycle starting");

    let documents = crawl::run_all(
        &context.extractors,
        Arc::clone(&context.fetch_provider),
        &context.crawl,
    )
    .await;

    if documents.is_empty() {
        error!("No source produced any documents; skipping extraction");
        return Err(Error::AllSourcesEmpty);
    }
    info!(count = documents.len(), "Crawl produced documents");

    let result = context.extractor().extract(&documents, topic).await?;

    let outcome = ResearchOutcome {
        topic: topic.to_string(),
        documents,
        result,
    };
    info!(
        elapsed_ms = t0.elapsed().as_millis() as u64,
        summary = %outcome.summary(),
        "Research cycle complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{Canned, StubFetcher, StubProvider};
    use crate::llm::client::testing::ScriptedModel;
    use crate::models::Source;
    use crate::scrapers::techcrunch::{self, TechCrunchScraper};

    const REPLY: &str = r#"{"topic":"X","keyFindings":["a","b","c"],"entities":[],"sentiment":"neutral"}"#;

    fn context(fetcher: StubFetcher, model: Arc<ScriptedModel>) -> ResearchContext {
        ResearchContext {
            extractors: vec![Arc::new(TechCrunchScraper::new())],
            fetch_provider: Arc::new(StubProvider::new(fetcher)),
            model,
            provider: ProviderConfig::default(),
            crawl: CrawlConfig::default(),
            schema_enforcement: SchemaEnforcement::Advisory,
        }
    }

    #[tokio::test]
    async fn test_empty_crawl_skips_the_model() {
        let fetcher = StubFetcher::new([(techcrunch::LISTING_URL, Canned::Status(500))]);
        let model = Arc::new(ScriptedModel::replying(REPLY));

        let err = run_research_cycle("X", &context(fetcher, model.clone()))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AllSourcesEmpty));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_returns_documents_and_result() {
        let listing = r#"<a href="https://techcrunch.com/2026/01/14/chips">x</a>"#;
        let article = "<h1>Chips</h1><p>Fabs expand.</p>";
        let fetcher = StubFetcher::new([
            (techcrunch::LISTING_URL, Canned::Page(listing.into())),
            ("https://techcrunch.com/2026/01/14/chips", Canned::Page(article.into())),
        ]);
        let model = Arc::new(ScriptedModel::replying(REPLY));

        let outcome = run_research_cycle("X", &context(fetcher, model.clone()))
            .await
            .unwrap();

        assert_eq!(outcome.documents.len(), 1);
        assert_eq!(outcome.documents.documents()[0].source, Source::TechCrunch);
        assert_eq!(outcome.summary(), "Analysis of 1 articles regarding X. Key findings: a; b; c");
        assert_eq!(model.call_count(), 1);

        let request = &model.requests.lock().unwrap()[0];
        assert_eq!(request.model, ProviderConfig::default().model_name);
        assert!(request.messages[1].content.contains("[1] Chips (techcrunch):\nFabs expand...."));

        let report = outcome.into_report();
        assert_eq!(report.article_count, 1);
        assert_eq!(report.topic, "X");
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let listing = r#"<a href="https://techcrunch.com/2026/01/14/chips">x</a>"#;
        let fetcher = StubFetcher::new([
            (techcrunch::LISTING_URL, Canned::Page(listing.into())),
            ("https://techcrunch.com/2026/01/14/chips", Canned::Page("<p>Body</p>".into())),
        ]);
        let model = Arc::new(ScriptedModel::new([Err(Error::ModelCall("401".into()))]));

        let err = run_research_cycle("X", &context(fetcher, model)).await.unwrap_err();

        assert!(matches!(err, Error::ModelCall(_)));
    }

    #[test]
    fn test_context_from_settings_rejects_bad_provider() {
        let mut settings = Settings::default();
        settings.provider.base_url = "not a url".into();
        assert!(matches!(
            ResearchContext::from_settings(&settings, 0),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_context_from_settings_builds_configured_sources() {
        let mut settings = Settings::default();
        settings.crawl.sources = vec![Source::Yahoo];
        let context = ResearchContext::from_settings(&settings, 2).unwrap();
        assert_eq!(context.extractors.len(), 1);
        assert_eq!(context.extractors[0].source(), Source::Yahoo);
    }
}
