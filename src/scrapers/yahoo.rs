//! Yahoo Finance technology news scraper.
//!
//! The [tech topic page](https://finance.yahoo.com/topic/tech/) streams its
//! stories in with JavaScript, so pages are rendered and given a short
//! settle delay before being read.
//!
//! # Discovery
//!
//! | Pass | Selector | Kept when |
//! |------|----------|-----------|
//! | Stream | `#Fin-Stream li a` | text longer than 10 chars, not a `/video/` link |
//! | Fallback | `a[href*="/news/"]` | text longer than 20 chars |
//!
//! The fallback only runs when the stream pass keeps nothing.

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

pub const LISTING_URL: &str = "https://finance.yahoo.com/topic/tech/";

const LISTING_SETTLE: Duration = Duration::from_secs(2);
const ARTICLE_SETTLE: Duration = Duration::from_secs(1);

static STREAM_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#Fin-Stream li a").expect("valid selector"));
static NEWS_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/news/"]"#).expect("valid selector"));
static HEADLINE: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static ARTICLE_BODY: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".caas-body").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));

#[derive(Debug, Clone, Default)]
pub struct YahooScraper;

impl YahooScraper {
    pub fn new() -> Self {
        Self
    }
}

pub(crate) fn listing_links(html: &str, base: &Url, max: usize) -> Vec<RawArticleRef> {
    let document = Html::parse_document(html);

    let mut refs: Vec<RawArticleRef> = collect_anchors(&document, &STREAM_LINKS, base)
        .into_iter()
        .filter(|r| r.title.chars().count() > 10 && !r.url.contains("/video/"))
        .collect();
    if refs.is_empty() {
        refs = collect_anchors(&document, &NEWS_LINKS, base)
            .into_iter()
            .filter(|r| r.title.chars().count() > 20)
            .collect();
    }
    super::cap_refs(refs, max)
}

#[async_trait]
impl SourceExtractor for YahooScraper {
    fn source(&self) -> Source {
        Source::Yahoo
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
            ReadySignal::Settle(LISTING_SETTLE),
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
        info!(count = refs.len(), source = LISTING_URL, "Indexed Yahoo Finance article URLs");
        Ok(refs)
    }

    #[instrument(level = "info", skip_all, fields(url = %article.url))]
    async fn extract(
        &self,
        fetcher: &dyn Fetcher,
        article: &RawArticleRef,
        config: &CrawlConfig,
    ) -> Result<NormalizedDocument, ArticleError> {
        let mode = FetchMode::rendered(
            ReadySignal::Settle(ARTICLE_SETTLE),
            config.article_render_timeout(),
        );
        let page = fetcher.fetch(&article.url, &mode).await?;
        let document = Html::parse_document(&page.body);

        let body = first_text(&document, &[&ARTICLE_BODY, &BODY]).ok_or_else(|| {
            ArticleError::EmptyBody {
                url: article.url.clone(),
            }
        })?;
        let body = truncate_chars(&body, config.max_body_chars);

        let title = Some(article.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| first_text(&document, &[&HEADLINE]))
            .unwrap_or_else(|| NO_TITLE.to_string());

        let published_at = published_hint(&document)
            .map(DateInput::Text)
            .unwrap_or_else(|| DateInput::Instant(Utc::now()));

        Ok(normalize_document(&title, &article.url, &body, Source::Yahoo, Some(published_at)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{Canned, StubFetcher, StubProvider};

    fn base() -> Url {
        Url::parse(LISTING_URL).unwrap()
    }

    #[test]
    fn test_stream_links_skip_video_and_short_titles() {
        let html = r#"
            <ul id="Fin-Stream">
              <li><a href="/news/chipmakers-rally-120000000.html">Chipmakers rally on AI demand</a></li>
              <li><a href="/video/earnings-recap-1.html">Earnings recap video segment</a></li>
              <li><a href="/news/short.html">Short</a></li>
              <li><a href="https://finance.yahoo.com/news/cloud-spend-130000000.html">Cloud spending keeps climbing</a></li>
            </ul>
        "#;
        let refs = listing_links(html, &base(), 5);
        let urls: Vec<_> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            [
                "https://finance.yahoo.com/news/chipmakers-rally-120000000.html",
                "https://finance.yahoo.com/news/cloud-spend-130000000.html"
            ]
        );
    }

    #[test]
    fn test_falls_back_to_news_links_with_longer_titles() {
        let html = r#"
            <div>
              <a href="/news/a.html">Short news headline</a>
              <a href="/news/b.html">A headline that is comfortably long enough</a>
              <a href="/markets/c.html">Not a news link though it is long enough</a>
            </div>
        "#;
        let refs = listing_links(html, &base(), 5);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].url, "https://finance.yahoo.com/news/b.html");
    }

    #[test]
    fn test_fallback_title_must_exceed_twenty_chars() {
        let html = r#"
            <a href="/news/twenty.html">Exactly twenty chars</a>
            <a href="/news/twenty-one.html">Exactly twenty chars!</a>
        "#;
        let refs = listing_links(html, &base(), 5);
        let urls: Vec<_> = refs.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["https://finance.yahoo.com/news/twenty-one.html"]);
    }

    #[tokio::test]
    async fn test_extract_prefers_article_body_container() {
        let url = "https://finance.yahoo.com/news/chips.html";
        let page = r#"
            <html><body>
              <header>Yahoo Finance navigation</header>
              <h1>Chip stocks climb</h1>
              <div class="caas-body"><p>Shares rose 4%.</p><p>Analysts cite AI demand.</p></div>
            </body></html>
        "#;
        let fetcher = StubFetcher::new([(url, Canned::Page(page.into()))]);
        let article = RawArticleRef {
            url: url.into(),
            title: String::new(),
        };

        let doc = YahooScraper::new()
            .extract(&fetcher, &article, &CrawlConfig::default())
            .await
            .unwrap();

        assert_eq!(doc.title, "Chip stocks climb");
        assert_eq!(doc.content, "Shares rose 4%. Analysts cite AI demand.");
        assert_eq!(doc.source, Source::Yahoo);

        let calls = fetcher.calls.lock().unwrap();
        assert!(matches!(
            &calls[0].1,
            FetchMode::Rendered { ready: ReadySignal::Settle(d), .. } if *d == ARTICLE_SETTLE
        ));
    }

    #[tokio::test]
    async fn test_extract_without_container_or_headline() {
        let url = "https://finance.yahoo.com/news/plain.html";
        let fetcher = StubFetcher::new([(url, Canned::Page("<body>Plain page text</body>".into()))]);
        let article = RawArticleRef {
            url: url.into(),
            title: " ".into(),
        };

        let doc = YahooScraper::new()
            .extract(&fetcher, &article, &CrawlConfig::default())
            .await
            .unwrap();

        assert_eq!(doc.title, NO_TITLE);
        assert_eq!(doc.content, "Plain page text");
    }

    #[tokio::test]
    async fn test_crawl_with_unreachable_listing_closes_session() {
        let fetcher = StubFetcher::new([(LISTING_URL, Canned::Status(503))]);
        let provider = StubProvider::new(fetcher.clone());

        let docs = YahooScraper::new().crawl(&provider, &CrawlConfig::default()).await;

        assert!(docs.is_empty());
        assert_eq!(fetcher.close_count(), 1);
        assert_eq!(*provider.opened.lock().unwrap(), vec![Engine::Browser]);
    }
}
