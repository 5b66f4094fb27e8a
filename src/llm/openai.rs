//! Chat completions over any OpenAI-compatible HTTP endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

use super::client::{ChatRequest, ModelClient};
use crate::config::ProviderConfig;
use crate::error::{Error, Result};
use crate::utils::truncate_for_log;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Talks to `{base_url}/chat/completions`.
///
/// The `Authorization` header is only sent when an API key is configured;
/// local servers such as Ollama or LM Studio accept requests without one.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiClient {
    pub fn new(provider: &ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key: provider.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.api_key.is_some())
            .finish()
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    #[instrument(level = "info", skip_all, fields(model = %request.model))]
    async fn chat_completion(&self, request: &ChatRequest) -> Result<String> {
        let t0 = Instant::now();

        let mut builder = self.http.post(self.endpoint()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Model request failed");
            Error::ModelCall(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, body = %truncate_for_log(&text, 300), "Model endpoint returned an error");
            return Err(Error::ModelCall(format!(
                "HTTP {status}: {}",
                truncate_for_log(&text, 300)
            )));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::ModelCall(format!("unreadable completion response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(
            chars = content.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Chat completion returned"
        );
        Ok(content)
    }
}
