//! # research_crawl
//!
//! Crawls a handful of tech news sources for a research topic, normalizes
//! the articles into plain-text documents, and asks an OpenAI-compatible
//! model for one schema-shaped analysis of the lot.
//!
//! ## Architecture
//!
//! 1. **Fetching** ([`fetch`]): plain HTTP or a headless browser, one session per source
//! 2. **Scraping** ([`scrapers`]): per-source discovery and extraction
//! 3. **Normalizing** ([`normalize`]): markup stripped, whitespace collapsed, dates parsed
//! 4. **Crawling** ([`crawl`]): every source at once, settle-all
//! 5. **Extraction** ([`llm`]): one JSON-mode chat completion, parsed and checked
//!
//! [`research::run_research_cycle`] runs the whole thing for one topic.

pub mod cli;
pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod llm;
pub mod models;
pub mod normalize;
pub mod outputs;
pub mod research;
pub mod scrapers;
pub mod utils;

pub use error::{Error, Result};
pub use research::{run_research_cycle, ResearchContext, ResearchOutcome};
