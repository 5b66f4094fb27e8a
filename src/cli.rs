//! Command-line interface definitions for research_crawl.
//!
//! Provider options fall back to the usual OpenAI environment variables, so
//! a configured shell only needs the topic.

use clap::Parser;

use crate::config::{SchemaEnforcement, Settings};
use crate::error::{Error, Result};
use crate::models::Source;

/// Crawl tech news for a topic and extract a structured analysis.
///
/// # Examples
///
/// ```sh
/// # Everything from the environment
/// research_crawl "AI chips"
///
/// # Local model, static fetching only, one source
/// research_crawl "AI chips" --base-url http://localhost:11434/v1 --model llama3 \
///     --no-browser --sources techcrunch
///
/// # Keep the report
/// research_crawl "AI chips" -j ./reports --max-retries 3
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Research topic to analyze
    pub topic: String,

    /// Optional path to a settings YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// API key for the model provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model name
    #[arg(long, env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Sources to crawl (techcrunch, nvidia, yahoo)
    #[arg(long, value_delimiter = ',')]
    pub sources: Option<Vec<Source>>,

    /// Fetch rendered sources as plain HTML instead of launching a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Reject model replies that do not match the schema
    #[arg(long)]
    pub strict_schema: bool,

    /// Retries for failed model calls
    #[arg(long, default_value_t = 0)]
    pub max_retries: usize,

    /// Output directory for the JSON report
    #[arg(short, long)]
    pub json_output_dir: Option<String>,
}

impl Cli {
    /// Load the settings file, if any, and apply command-line overrides.
    pub async fn settings(&self) -> Result<Settings> {
        let base = match &self.config {
            Some(path) => Settings::load(path).await?,
            None => Settings::default(),
        };
        self.apply(base)
    }

    fn apply(&self, mut settings: Settings) -> Result<Settings> {
        if self.topic.trim().is_empty() {
            return Err(Error::Config("topic must not be empty".into()));
        }
        if let Some(url) = &self.base_url {
            settings.provider.base_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            settings.provider.api_key = Some(key.clone());
        }
        if let Some(model) = &self.model {
            settings.provider.model_name = model.clone();
        }
        if let Some(sources) = &self.sources {
            settings.crawl.sources = sources.clone();
        }
        if self.no_browser {
            settings.crawl.enable_browser = false;
        }
        if self.strict_schema {
            settings.schema_enforcement = SchemaEnforcement::Strict;
        }
        Ok(settings)
    }
}
