//! Data models for crawled documents and their structured analysis.
//!
//! This module defines the core data structures used throughout the crate:
//! - [`Source`]: The news sources the crawler knows how to read
//! - [`RawArticleRef`]: A candidate article discovered on a listing page
//! - [`NormalizedDocument`]: Markup-free article text in a uniform shape
//! - [`CrawlBatch`]: All documents collected by one orchestrator run
//! - [`StructuredResult`]: The JSON object produced by the model
//! - [`TechNewsAnalysis`]: A typed view of that object
//! - [`ResearchReport`]: What the CLI hands to storage
//!
//! The analysis models use camelCase field names to match the JSON shape
//! requested from the LLM, hence the `#[allow(non_snake_case)]` attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::utils::truncate_chars;

/// A news source with its own discovery and extraction heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    TechCrunch,
    Nvidia,
    Yahoo,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::TechCrunch, Source::Nvidia, Source::Yahoo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::TechCrunch => "techcrunch",
            Source::Nvidia => "nvidia",
            Source::Yahoo => "yahoo",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "techcrunch" | "tc" => Ok(Source::TechCrunch),
            "nvidia" | "nv" => Ok(Source::Nvidia),
            "yahoo" | "yh" => Ok(Source::Yahoo),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// A candidate article link found on a listing page.
///
/// Short-lived: it is dropped once the article has been fetched, or never
/// fetched at all if it falls past the per-source cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticleRef {
    pub url: String,
    pub title: String,
}

/// An article reduced to plain text plus a little metadata.
///
/// Built once by [`crate::normalize::normalize_document`] and not modified
/// afterwards. `content` never contains tag syntax, and `published_at` is
/// either a valid instant or absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedDocument {
    pub title: String,
    pub url: String,
    pub content: String,
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl NormalizedDocument {
    pub fn is_valid(&self) -> bool {
        !self.title.is_empty()
    }
}

/// A truncated, read-only view of one document as it appears in a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptDocument<'a> {
    pub title: &'a str,
    pub source: Source,
    pub excerpt: String,
}

/// The documents produced by one crawl, in the order their sources finished.
///
/// Order across sources is not meaningful and is not stable between runs.
/// Within one source, documents keep the order of discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrawlBatch {
    documents: Vec<NormalizedDocument>,
}

impl CrawlBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, documents: impl IntoIterator<Item = NormalizedDocument>) {
        self.documents.extend(documents);
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[NormalizedDocument] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<NormalizedDocument> {
        self.documents
    }

    pub fn from_source(&self, source: Source) -> impl Iterator<Item = &NormalizedDocument> {
        self.documents.iter().filter(move |d| d.source == source)
    }

    /// The first `max_docs` documents with content cut to `max_chars`.
    ///
    /// The batch itself is left untouched; storage still receives the full
    /// text.
    pub fn prompt_view(&self, max_docs: usize, max_chars: usize) -> Vec<PromptDocument<'_>> {
        self.documents
            .iter()
            .take(max_docs)
            .map(|d| PromptDocument {
                title: &d.title,
                source: d.source,
                excerpt: truncate_chars(&d.content, max_chars),
            })
            .collect()
    }
}

impl From<Vec<NormalizedDocument>> for CrawlBatch {
    fn from(documents: Vec<NormalizedDocument>) -> Self {
        Self { documents }
    }
}

/// The JSON object returned by the model, kept exactly as parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructuredResult(pub serde_json::Value);

impl StructuredResult {
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn topic(&self) -> Option<&str> {
        self.0.get("topic").and_then(|t| t.as_str())
    }

    /// String entries of `keyFindings`; non-string entries are skipped.
    pub fn key_findings(&self) -> Vec<&str> {
        self.0
            .get("keyFindings")
            .and_then(|k| k.as_array())
            .map(|items| items.iter().filter_map(|i| i.as_str()).collect())
            .unwrap_or_default()
    }

    /// The one-line summary stored next to the result.
    pub fn summary(&self, article_count: usize, topic: &str) -> String {
        format!(
            "Analysis of {} articles regarding {}. Key findings: {}",
            article_count,
            topic,
            self.key_findings().join("; ")
        )
    }

    /// Deserialize into the typed analysis shape.
    pub fn typed(&self) -> Result<TechNewsAnalysis, serde_json::Error> {
        TechNewsAnalysis::deserialize(&self.0)
    }
}

/// Overall tone of the coverage around a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

/// Kind of a named entity in the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Company,
    Product,
    Person,
    Organization,
}

/// A company, product, person, or organization relevant to the topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityType,
    pub relevance: String,
}

/// A dated event mentioned in the coverage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub event: String,
}

/// Typed form of a [`StructuredResult`].
#[allow(non_snake_case)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechNewsAnalysis {
    pub topic: String,
    pub keyFindings: Vec<String>,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub timeline: Vec<TimelineEvent>,
}

/// Everything one research cycle produced, as written to disk.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchReport {
    pub topic: String,
    pub generated_at: DateTime<Utc>,
    pub article_count: usize,
    pub summary: String,
    pub documents: CrawlBatch,
    pub result: StructuredResult,
}
