//! NVIDIA Newsroom "In the News" scraper.
//!
//! The listing at [nvidianews.nvidia.com](https://nvidianews.nvidia.com/in-the-news)
//! is assembled client-side, so both the listing and the linked articles
//! (mostly on third-party sites) are fetched through the browser engine.
//!
//! # Discovery
//!
//! Links inside `<main>` are taken first. Some page variants render the list
//! outside `<main>`; when `main a` finds nothing, every `a[href]` on the
//! page is considered instead. Either way, anchors with ten characters of
//! text or fewer are navigation chrome and are skipped.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

use super::{collect_anchors, first_text, published_hint, SourceExtractor, NO_TITLE};
use crate::config::CrawlConfig;
use crate::error::{ArticleError, FetchError};
use crate::fetch::{Engine, FetchMode, Fetcher, ReadySignal};
use crate::models::{NormalizedDocument, RawArticleRef, Source};
use crate::normalize::{normalize_document, DateInput};
use crate::utils::truncate_chars;

pub const LISTING_URL: &str = "https://nvidianews.nvidia.com/in-the-news";

const MIN_TITLE_CHARS: usize = 10;

static PRIMARY_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("main a").expect("valid selector"));
static FALLBACK_LINKS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("valid selector"));
static HEADLINE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

#[derive(Debug, Clone, Default)]
pub struct NvidiaScraper;

impl NvidiaScraper {
    pub fn new() -> Self {
        Self
    }
}

/// Candidate articles on a rendered listing page.
pub(crate) fn listing_links(html: &str, base: &Url, max: usize) -> Vec<RawArticleRef> {
    let document = Html::parse_document(html);
    let keep = |r: &RawArticleRef| r.title.chars().count() > MIN_TITLE_CHARS;

    let mut refs: Vec<RawArticleRef> = collect_anchors(&document, &PRIMARY_LINKS, base)
        .into_iter()
        .filter(keep)
        .collect();
    if refs.is_empty() {
        refs = collect_anchors(&document, &FALLBACK_LINKS, base)
            .into_iter()
            .filter(keep)
            .collect();
    }
    super::cap_refs(refs, max)
}

#[async_trait]
impl SourceExtractor for NvidiaScraper {
    fn source(&self) -> Source {
        Source::Nvidia
    }

    fn engine(&self) -> Engine {
        Engine::Browser
    }

    #[instrument(level = "info", skip_all)]
    async fn discover(
        &self,
        fetcher: &dyn Fetcher,
        config: &CrawlConfig,
    ) -> Result<Vec<RawArticleRef>, FetchError> {
        let mode = FetchMode::rendered(
            ReadySignal::Selector {
                css: "main".to_string(),
                wait: Duration::from_secs(10),
            },
            config.listing_render_timeout(),
        );
        let page = fetcher.fetch(LISTING_URL, &mode).await?;
        let base = Url::parse(&page.url).or_else(|_| Url::parse(LISTING_URL)).map_err(|e| {
            FetchError::Render {
                url: page.url.clone(),
                reason: e.to_string(),
            }
        })?;
        let refs = listing_links(&page.body, &base, config.max_articles_per_source);
        info!(count = refs.len(), source = LISTING_URL, "Indexed NVIDIA article URLs");
        Ok(refs)
    }

    #[instrument(level = "info", skip_all, fields(url = %article.url))]
    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        article: &RawArticleRef,
        config: &CrawlConfig,
    ) -> Result<NormalizedDocument, ArticleError> {
        let mode = FetchMode::rendered(ReadySignal::Loaded, config.article_render_timeout());
        let page = fetcher.fetch(&article.url, &mode).await?;
        let document = Html::parse_document(&page.body);

        let body = first_text(&document, &[&BODY]).ok_or_else(|| ArticleError::EmptyBody {
            url: article.url.clone(),
        })?;
        let body = truncate_chars(&body, config.max_body_chars);

        let title = Some(article.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| first_text(&document, &[&HEADLINE]))
            .unwrap_or_else(|| NO_TITLE.to_string());

        let published_at = published_hint(&document)
            .map(DateInput::Text)
            .unwrap_or_else(|| DateInput::Instant(Utc::now()));

        Ok(normalize_document(&title, &article.url, &body, Source::Nvidia, Some(published_at)))
    }
}
