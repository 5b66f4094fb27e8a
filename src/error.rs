//! Error types for the crawl and extraction pipeline.
//!
//! Failures fall into two groups:
//!
//! - **Contained** failures ([`FetchError`], [`ArticleError`]) are scoped to a
//!   single fetch, article, or source. They are logged and the offending item
//!   is skipped; they never cross the crawl orchestrator boundary.
//! - **Cycle** failures ([`Error`]) end a research cycle and are reported to
//!   the caller with enough detail to tell "nothing was found" apart from
//!   "the model was unreachable" and "the model answered but not usefully".

use std::time::Duration;
use thiserror::Error;

/// Result type for research cycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to retrieve one URL.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// The request or navigation did not finish in time.
    #[error("timed out after {after:?} fetching {url}")]
    Timeout { url: String, after: Duration },

    /// Transport-level failure (DNS, TLS, connection reset, body read).
    #[error("network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// The headless browser could not be launched or has gone away.
    #[error("browser unavailable: {0}")]
    Browser(String),

    /// The page loaded but could not be rendered or read back.
    #[error("render failed for {url}: {reason}")]
    Render { url: String, reason: String },
}

impl FetchError {
    pub fn url(&self) -> Option<&str> {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Timeout { url, .. }
            | FetchError::Network { url, .. }
            | FetchError::Render { url, .. } => Some(url),
            FetchError::Browser(_) => None,
        }
    }
}

/// Failure to turn one discovered article into a document.
#[derive(Debug, Error)]
pub enum ArticleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The page was fetched but yielded no usable text.
    #[error("no article text found at {url}")]
    EmptyBody { url: String },
}

/// Failure of a whole research cycle.
#[derive(Debug, Error)]
pub enum Error {
    /// Every source settled without producing a single document.
    #[error("no articles were found from any source")]
    AllSourcesEmpty,

    /// The model endpoint could not be reached or rejected the request.
    #[error("model call failed: {0}")]
    ModelCall(String),

    /// The model answered, but the reply was empty, not JSON, or did not
    /// match the extraction schema.
    #[error("model reply was not usable: {reason}")]
    ModelParse { reason: String, preview: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code reported by the CLI for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::AllSourcesEmpty => 2,
            Error::ModelCall(_) => 3,
            Error::ModelParse { .. } => 4,
            Error::Config(_) | Error::Io(_) | Error::Json(_) => 1,
        }
    }

    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ModelCall(_))
    }
}
