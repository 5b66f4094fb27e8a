//! News source scrapers for collecting articles about a research topic.
//!
//! Each source implements [`SourceExtractor`] with the same two-phase
//! pattern:
//!
//! 1. **Discovery**: read a listing page and pick at most a handful of
//!    article links
//! 2. **Extraction**: fetch each article and reduce it to a
//!    [`NormalizedDocument`]
//!
//! [`SourceExtractor::crawl`] ties the two together and is the only thing the
//! orchestrator calls.
//!
//! # Supported Sources
//!
//! | Source | Module | Engine | Discovery |
//! |--------|--------|--------|-----------|
//! | TechCrunch | [`techcrunch`] | HTTP | Regex over date-structured article URLs |
//! | NVIDIA Newsroom | [`nvidia`] | Browser | `main a`, falling back to every link |
//! | Yahoo Finance Tech | [`yahoo`] | Browser | Stream list items, falling back to `/news/` links |
//!
//! # Failure Handling
//!
//! - A listing page that cannot be fetched ends that source with no documents
//! - A listing page with no candidates is a normal, empty result
//! - An article that fails is logged and skipped; the rest still run

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep_until, timeout_at};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::CrawlConfig;
use crate::error::{ArticleError, FetchError};
use crate::fetch::{Engine, FetchProvider, Fetcher};
use crate::models::{NormalizedDocument, RawArticleRef, Source};

pub mod nvidia;
pub mod techcrunch;
pub mod yahoo;

pub use nvidia::NvidiaScraper;
pub use techcrunch::TechCrunchScraper;
pub use yahoo::YahooScraper;

/// Title used when an article page offers nothing better.
pub const NO_TITLE: &str = "No Title";

#[async_trait]
pub trait SourceExtractor: Send + Sync {
    fn source(&self) -> Source;

    /// The kind of fetch session this source needs.
    fn engine(&self) -> Engine;

    /// Find candidate articles on the source's listing page.
    ///
    /// Returns at most `config.max_articles_per_source` references. An empty
    /// list is a valid answer, not an error.
    async fn discover(
        &self,
        fetcher: &dyn Fetcher,
        config: &CrawlConfig,
    ) -> Result<Vec<RawArticleRef>, FetchError>;

    /// Fetch one article and normalize it.
    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        article: &RawArticleRef,
        config: &CrawlConfig,
    ) -> Result<NormalizedDocument, ArticleError>;

    /// Discover, then extract every candidate, returning whatever succeeded.
    ///
    /// Opens one fetch session for the whole run and always closes it before
    /// returning. Articles are extracted `config.article_concurrency` at a
    /// time, keeping discovery order. When the per-source budget runs out,
    /// documents finished so far are kept and the rest are abandoned.
    #[instrument(level = "info", skip_all, fields(source = %self.source()))]
    async fn crawl(
        &self,
        provider: &dyn FetchProvider,
        config: &CrawlConfig,
    ) -> Vec<NormalizedDocument> {
        let t0 = Instant::now();
        let deadline = tokio::time::Instant::now() + config.source_timeout();

        let fetcher = match provider.open(self.engine()).await {
            Ok(fetcher) => fetcher,
            Err(e) => {
                error!(error = %e, "Could not open fetch session; skipping source");
                return Vec::new();
            }
        };

        let refs = match timeout_at(deadline, self.discover(fetcher.as_ref(), config)).await {
            Ok(Ok(refs)) => refs,
            Ok(Err(e)) => {
                error!(error = %e, "Listing fetch failed");
                Vec::new()
            }
            Err(_) => {
                error!(budget = ?config.source_timeout(), "Discovery ran out of time");
                Vec::new()
            }
        };
        let refs = cap_refs(refs, config.max_articles_per_source);
        if refs.is_empty() {
            info!("Discovery found no candidate articles");
        }

        let fetcher_ref = fetcher.as_ref();
        let documents: Vec<NormalizedDocument> = stream::iter(refs.iter().cloned())
            .map(|article: RawArticleRef| async move {
                match self.extract(fetcher_ref, &article, config).await {
                    Ok(doc) if doc.is_valid() => {
                        debug!(url = %article.url, "Extracted article");
                        Some(doc)
                    }
                    Ok(_) => {
                        warn!(url = %article.url, "Article produced no title; skipping");
                        None
                    }
                    Err(e) => {
                        warn!(url = %article.url, error = %e, "Article extraction failed; skipping");
                        None
                    }
                }
            })
            .buffered(config.article_concurrency())
            .take_until(sleep_until(deadline))
            .filter_map(std::future::ready)
            .collect()
            .await;

        if tokio::time::Instant::now() >= deadline {
            warn!(kept = documents.len(), "Source ran out of time; keeping finished articles");
        }

        if let Err(e) = fetcher.close().await {
            warn!(error = %e, "Failed to close fetch session");
        }

        info!(
            discovered = refs.len(),
            count = documents.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Source crawl finished"
        );
        documents
    }
}

/// Build the extractor for one source.
pub fn extractor_for(source: Source) -> Arc<dyn SourceExtractor> {
    match source {
        Source::TechCrunch => Arc::new(TechCrunchScraper::new()),
        Source::Nvidia => Arc::new(NvidiaScraper::new()),
        Source::Yahoo => Arc::new(YahooScraper::new()),
    }
}

/// Extractors for the configured sources, duplicates removed.
pub fn extractors_for(sources: &[Source]) -> Vec<Arc<dyn SourceExtractor>> {
    sources.iter().unique().map(|s| extractor_for(*s)).collect()
}

/// Drop repeated URLs and keep the first `max` references.
pub(crate) fn cap_refs(refs: Vec<RawArticleRef>, max: usize) -> Vec<RawArticleRef> {
    refs.into_iter()
        .unique_by(|r| r.url.clone())
        .take(max)
        .collect()
}

static BLANKS: Lazy<regex::Regex> = Lazy::new(|| regex::Regex::new(r"\s+").expect("valid regex"));

const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Text a reader would see inside `element`: script, style, and noscript
/// contents are left out, inline elements run together with their
/// neighbours, block elements are separated by a space, and runs of
/// whitespace become one space.
pub(crate) fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible(element, &mut out);
    BLANKS.replace_all(&out, " ").trim().to_string()
}

fn push_visible(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(&**text);
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            if HIDDEN_ELEMENTS.contains(&name) {
                continue;
            }
            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push(' ');
            }
            push_visible(child, out);
            if block {
                out.push(' ');
            }
        }
    }
}

/// Visible text of the first element, across `selectors` in order, that has
/// any.
pub(crate) fn first_text(document: &Html, selectors: &[&Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        document
            .select(selector)
            .map(visible_text)
            .find(|text| !text.is_empty())
    })
}

/// Anchors matched by `selector`, resolved against `base` and paired with
/// their visible text.
pub(crate) fn collect_anchors(document: &Html, selector: &Selector, base: &Url) -> Vec<RawArticleRef> {
    document
        .select(selector)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            let url = base.join(href).ok()?;
            if !matches!(url.scheme(), "http" | "https") {
                return None;
            }
            Some(RawArticleRef {
                url: url.to_string(),
                title: visible_text(a),
            })
        })
        .collect()
}

static META_PUBLISHED: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="article:published_time"], meta[name="article:published_time"], meta[itemprop="datePublished"]"#)
        .expect("valid selector")
});
static TIME_DATETIME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time[datetime]").expect("valid selector"));
static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector"));

/// The first structured publish-date hint on an article page.
///
/// Looks at article meta tags, then `<time datetime>`, then JSON-LD
/// `datePublished`. The value is returned as written; parsing is the
/// normalizer's job.
pub(crate) fn published_hint(document: &Html) -> Option<String> {
    let from_meta = document
        .select(&META_PUBLISHED)
        .filter_map(|m| m.value().attr("content"))
        .map(str::trim)
        .find(|s| !s.is_empty());
    if let Some(value) = from_meta {
        return Some(value.to_string());
    }

    let from_time = document
        .select(&TIME_DATETIME)
        .filter_map(|t| t.value().attr("datetime"))
        .map(str::trim)
        .find(|s| !s.is_empty());
    if let Some(value) = from_time {
        return Some(value.to_string());
    }

    document.select(&JSON_LD).find_map(|script| {
        let raw = script.text().collect::<String>();
        let json: serde_json::Value = serde_json::from_str(raw.trim()).ok()?;
        json_ld_date(&json)
    })
}

fn json_ld_date(json: &serde_json::Value) -> Option<String> {
    match json {
        serde_json::Value::Array(items) => items.iter().find_map(json_ld_date),
        serde_json::Value::Object(obj) => obj
            .get("datePublished")
            .and_then(|d| d.as_str())
            .map(str::to_string)
            .or_else(|| obj.get("@graph").and_then(json_ld_date)),
        _ => None,
    }
}
