//! Runtime configuration: LLM provider, crawl limits, and schema policy.
//!
//! Settings can be read from a YAML file and then overridden from the
//! command line (see [`crate::cli::Cli`]). Every crawl limit has a default,
//! so an empty file is a valid configuration.
//!
//! ```yaml
//! provider:
//!   base_url: https://api.groq.com/openai/v1
//!   model_name: llama-3.3-70b-versatile
//! crawl:
//!   article_concurrency: 3
//!   enable_browser: false
//! schema_enforcement: strict
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::models::Source;

/// Connection details for an OpenAI-compatible chat completion endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Some self-hosted endpoints accept requests without a key.
    #[serde(default)]
    pub api_key: Option<String>,
    pub model_name: String,
}

// Keeps the key out of logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model_name: "gpt-4o-mini".to_string(),
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("provider base_url is empty".into()));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(Error::Config(format!(
                "provider base_url is not a URL: {}",
                self.base_url
            )));
        }
        if self.model_name.trim().is_empty() {
            return Err(Error::Config("provider model_name is empty".into()));
        }
        Ok(())
    }
}

/// Limits and switches for one crawl.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrawlConfig {
    /// Cap on references taken from each listing page.
    pub max_articles_per_source: usize,
    /// Article text is cut to this many characters before normalization.
    pub max_body_chars: usize,
    /// Documents included in the extraction prompt.
    pub max_prompt_documents: usize,
    /// Characters of each document included in the extraction prompt.
    pub max_prompt_chars: usize,
    /// Articles fetched at once within a single source.
    pub article_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub listing_render_timeout_secs: u64,
    pub article_render_timeout_secs: u64,
    /// Wall-clock budget for one source, discovery included.
    pub source_timeout_secs: u64,
    pub user_agent: String,
    /// When false, rendered sources are fetched with plain HTTP instead.
    pub enable_browser: bool,
    pub sources: Vec<Source>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_articles_per_source: 5,
            max_body_chars: 5000,
            max_prompt_documents: 10,
            max_prompt_chars: 500,
            article_concurrency: 2,
            fetch_timeout_secs: 30,
            listing_render_timeout_secs: 30,
            article_render_timeout_secs: 20,
            source_timeout_secs: 120,
            user_agent: format!("research_crawl/{}", env!("CARGO_PKG_VERSION")),
            enable_browser: true,
            sources: Source::ALL.to_vec(),
        }
    }
}

impl CrawlConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn listing_render_timeout(&self) -> Duration {
        Duration::from_secs(self.listing_render_timeout_secs)
    }

    pub fn article_render_timeout(&self) -> Duration {
        Duration::from_secs(self.article_render_timeout_secs)
    }

    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs)
    }

    /// Concurrency never drops below one article at a time.
    pub fn article_concurrency(&self) -> usize {
        self.article_concurrency.max(1)
    }
}

/// How strictly the model's JSON reply is checked against the schema.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaEnforcement {
    /// Violations are logged; the reply is returned as parsed.
    #[default]
    Advisory,
    /// Violations fail the call as an unusable reply.
    Strict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub provider: ProviderConfig,
    pub crawl: CrawlConfig,
    pub schema_enforcement: SchemaEnforcement,
}

impl Settings {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::Config(format!("invalid settings: {e}")))
    }

    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        let settings = Self::from_yaml(&text)?;
        info!(sources = ?settings.crawl.sources, "Loaded settings");
        Ok(settings)
    }
}
