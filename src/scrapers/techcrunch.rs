//! TechCrunch article scraper.
//!
//! This module scrapes articles from the [TechCrunch latest
//! feed](https://techcrunch.com/latest/). The listing is server-rendered, so
//! plain HTTP is enough and article links can be picked straight out of the
//! markup.
//!
//! # URL Pattern
//!
//! Articles live under date-structured paths like
//! `https://techcrunch.com/2026/01/14/article-slug/`.

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument};

use super::{first_text, SourceExtractor, NO_TITLE};
use crate::config::CrawlConfig;
use crate::error::{ArticleError, FetchError};
use crate::fetch::{Engine, FetchMode, Fetcher};
use crate::models::{NormalizedDocument, RawArticleRef, Source};
use crate::normalize::{clean_content, normalize_document, DateInput};
use crate::utils::truncate_chars;

pub const LISTING_URL: &str = "https://techcrunch.com/latest/";

static ARTICLE_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"href="(https://techcrunch\.com/\d{4}/\d{2}/\d{2}/[^"]+)""#).expect("valid regex")
});
static HEADLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>").expect("valid regex"));
static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p>").expect("valid regex"));
static DATETIME_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"datetime="([^"]+)""#).expect("valid regex"));
static FALLBACK_BODY: Lazy<[Selector; 3]> = Lazy::new(|| {
    ["article", "main", "body"].map(|css| Selector::parse(css).expect("valid selector"))
});

#[derive(Debug, Clone, Default)]
pub struct TechCrunchScraper;

impl TechCrunchScraper {
    pub fn new() -> Self {
        Self
    }
}

/// Article links found in listing markup, in page order.
///
/// Stops scanning once `max` distinct links have been seen.
pub(crate) fn article_links(html: &str, max: usize) -> Vec<RawArticleRef> {
    let mut refs: Vec<RawArticleRef> = Vec::new();
    for cap in ARTICLE_LINK.captures_iter(html) {
        if refs.len() >= max {
            break;
        }
        let url = cap[1].to_string();
        if refs.iter().any(|r| r.url == url) {
            continue;
        }
        refs.push(RawArticleRef {
            title: title_from_slug(&url),
            url,
        });
    }
    refs
}

fn title_from_slug(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .replace('-', " ")
}

/// Paragraph text, markup stripped, joined with blank lines, or `None` if
/// there is none.
fn paragraphs(html: &str) -> Option<String> {
    let joined = PARAGRAPH
        .captures_iter(html)
        .map(|cap| clean_content(&cap[1]))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!joined.is_empty()).then_some(joined)
}

#[async_trait]
impl SourceExtractor for TechCrunchScraper {
    fn source(&self) -> Source {
        Source::TechCrunch
    }

    fn engine(&self) -> Engine {
        Engine::Http
    }

    #[instrument(level = "info", skip_all)]
    async fn discover(
        &self,
        fetcher: &dyn Fetcher,
        config: &CrawlConfig,
    ) -> Result<Vec<RawArticleRef>, FetchError> {
        let page = fetcher.fetch(LISTING_URL, &FetchMode::Static).await?;
        let refs = article_links(&page.body, config.max_articles_per_source);
        info!(count = refs.len(), source = LISTING_URL, "Indexed TechCrunch article URLs");
        debug!(urls = ?refs.iter().map(|r| &r.url).collect::<Vec<_>>(), "TechCrunch URLs");
        Ok(refs)
    }

    #[instrument(level = "info", skip_all, fields(url = %article.url))]
    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        article: &RawArticleRef,
        config: &CrawlConfig,
    ) -> Result<NormalizedDocument, ArticleError> {
        let page = fetcher.fetch(&article.url, &FetchMode::Static).await?;
        let html = page.body;

        let title = HEADLINE
            .captures(&html)
            .map(|cap| clean_content(&cap[1]))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());

        let body = match paragraphs(&html) {
            Some(body) => body,
            None => {
                let document = Html::parse_document(&html);
                let [article_sel, main_sel, body_sel] = &*FALLBACK_BODY;
                first_text(&document, &[article_sel, main_sel, body_sel]).ok_or_else(|| {
                    ArticleError::EmptyBody {
                        url: article.url.clone(),
                    }
                })?
            }
        };
        let body = truncate_chars(&body, config.max_body_chars);

        let published_at = DATETIME_ATTR
            .captures(&html)
            .map(|cap| DateInput::Text(cap[1].to_string()))
            .unwrap_or_else(|| DateInput::Instant(Utc::now()));

        let doc = normalize_document(&title, &article.url, &body, Source::TechCrunch, Some(published_at));
        info!(chars = doc.content.len(), "Parsed TechCrunch article");
        Ok(doc)
    }
}
