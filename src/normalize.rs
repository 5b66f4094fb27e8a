//! Turning fetched markup into plain, uniform documents.
//!
//! Everything here is pure: no I/O, no clock, no shared state. The same
//! inputs always produce the same [`NormalizedDocument`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::models::{NormalizedDocument, Source};

// Unterminated blocks run to the end of the input.
static SCRIPT_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?(?:</script\s*>|\z)").expect("valid regex"));
static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?(?:</style\s*>|\z)").expect("valid regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// A publish date as handed over by a scraper.
#[derive(Debug, Clone, PartialEq)]
pub enum DateInput {
    Text(String),
    Instant(DateTime<Utc>),
    /// Milliseconds since the Unix epoch.
    Millis(i64),
}

impl From<&str> for DateInput {
    fn from(s: &str) -> Self {
        DateInput::Text(s.to_string())
    }
}

impl From<String> for DateInput {
    fn from(s: String) -> Self {
        DateInput::Text(s)
    }
}

impl From<DateTime<Utc>> for DateInput {
    fn from(d: DateTime<Utc>) -> Self {
        DateInput::Instant(d)
    }
}

/// Strip markup from `raw`, leaving whitespace-collapsed text.
///
/// Script and style blocks are removed together with their contents. Tag
/// stripping repeats until no `<...>` sequence is left, so the output is a
/// fixed point: cleaning it again returns it unchanged.
pub fn clean_content(raw: &str) -> String {
    let without_scripts = SCRIPT_BLOCK.replace_all(raw, " ");
    let mut text = STYLE_BLOCK.replace_all(&without_scripts, " ").into_owned();

    while TAG.is_match(&text) {
        text = TAG.replace_all(&text, " ").into_owned();
    }

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Parse a date hint into an instant, or `None` if it is not a real date.
pub fn parse_published_at(input: &DateInput) -> Option<DateTime<Utc>> {
    match input {
        DateInput::Instant(d) => Some(*d),
        DateInput::Millis(ms) => DateTime::from_timestamp_millis(*ms),
        DateInput::Text(s) => parse_date_text(s.trim()),
    }
}

fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = DateTime::parse_from_rfc2822(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Build a [`NormalizedDocument`] from scraped pieces.
///
/// Title and URL are trimmed, content goes through [`clean_content`], and a
/// date that cannot be parsed is dropped rather than reported.
pub fn normalize_document(
    title: &str,
    url: &str,
    raw_content: &str,
    source: Source,
    published_at: Option<DateInput>,
) -> NormalizedDocument {
    let published_at = published_at.and_then(|input| {
        let parsed = parse_published_at(&input);
        if parsed.is_none() {
            debug!(?input, %url, "Discarding unparseable publish date");
        }
        parsed
    });

    NormalizedDocument {
        title: title.trim().to_string(),
        url: url.trim().to_string(),
        content: clean_content(raw_content),
        source,
        published_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_clean_content_removes_script_and_style() {
        let html = r#"<div>Hello <script>alert("bad")</script> <style>body { color: red; }</style>World</div>"#;
        assert_eq!(clean_content(html), "Hello World");
    }

    #[test]
    fn test_clean_content_removes_tags() {
        assert_eq!(clean_content("<p>Hello <b>World</b></p>"), "Hello World");
        assert_eq!(clean_content("<P>Upper</P><DIV class='x'>case</DIV>"), "Upper case");
    }

    #[test]
    fn test_clean_content_handles_script_attributes_and_case() {
        let html = "a<SCRIPT type=\"text/javascript\">var x = 1;</SCRIPT>b";
        assert_eq!(clean_content(html), "a b");
    }

    #[test]
    fn test_clean_content_drops_unterminated_script() {
        assert_eq!(clean_content("keep <script>var leaked = 1;"), "keep");
    }

    #[test]
    fn test_clean_content_collapses_whitespace() {
        assert_eq!(clean_content("  a \n\n\t b  "), "a b");
        assert_eq!(clean_content(""), "");
    }

    #[test]
    fn test_clean_content_nested_tag_fragments() {
        let once = clean_content("<<b>x>y");
        assert_eq!(once, "x>y");
        assert_eq!(clean_content(&once), once);
    }

    #[test]
    fn test_normalize_document_trims_and_parses() {
        let doc = normalize_document(
            "  My Title  ",
            "https://example.com/news ",
            "<p>Some content</p>",
            Source::TechCrunch,
            Some("2026-01-14T12:00:00Z".into()),
        );

        assert_eq!(doc.title, "My Title");
        assert_eq!(doc.url, "https://example.com/news");
        assert_eq!(doc.content, "Some content");
        assert_eq!(doc.source, Source::TechCrunch);
        assert_eq!(
            doc.published_at,
            Some(Utc.with_ymd_and_hms(2026, 1, 14, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_normalize_document_drops_invalid_dates() {
        for bad in ["", "yesterday", "2026-13-45", "not a date at all", "32/01/2026"] {
            let doc = normalize_document("t", "u", "c", Source::Yahoo, Some(bad.into()));
            assert_eq!(doc.published_at, None, "input {bad:?}");
        }
        let doc = normalize_document("t", "u", "c", Source::Yahoo, Some(DateInput::Millis(i64::MAX)));
        assert_eq!(doc.published_at, None);
    }

    #[test]
    fn test_parse_published_at_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 14, 10, 0, 0).unwrap();
        for s in [
            "2026-01-14T10:00:00Z",
            "2026-01-14T12:00:00+02:00",
            "Wed, 14 Jan 2026 10:00:00 +0000",
            "2026-01-14T10:00:00",
            "2026-01-14 10:00:00",
        ] {
            assert_eq!(parse_published_at(&s.into()), Some(expected), "input {s:?}");
        }
        assert_eq!(
            parse_published_at(&"2026-01-14".into()),
            Some(Utc.with_ymd_and_hms(2026, 1, 14, 0, 0, 0).unwrap())
        );
        assert_eq!(
            parse_published_at(&DateInput::Millis(0)),
            Some(Utc.timestamp_opt(0, 0).unwrap())
        );
    }

    #[test]
    fn test_normalize_document_is_deterministic() {
        let a = normalize_document("t", "u", "<p>x</p>", Source::Nvidia, Some("2026-01-01".into()));
        let b = normalize_document("t", "u", "<p>x</p>", Source::Nvidia, Some("2026-01-01".into()));
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_clean_content_is_idempotent(raw in "\\PC{0,200}") {
            let once = clean_content(&raw);
            prop_assert_eq!(clean_content(&once), once);
        }

        #[test]
        fn prop_script_and_style_text_never_survives(
            before in "[A-Z ]{0,20}",
            secret in "[a-z]{8,16}",
            after in "[A-Z ]{0,20}",
            use_style in any::<bool>(),
        ) {
            let tag = if use_style { "style" } else { "script" };
            let html = format!("<div>{before}<{tag}>{secret}</{tag}>{after}</div>");
            let cleaned = clean_content(&html);
            prop_assert!(!cleaned.contains(&secret));
            prop_assert!(!cleaned.contains('<'));
        }

        #[test]
        fn prop_bad_dates_never_panic(s in "\\PC{0,40}") {
            let _ = normalize_document("t", "u", "c", Source::TechCrunch, Some(s.into()));
        }
    }
}
