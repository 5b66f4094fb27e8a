//! Structured extraction through an OpenAI-compatible chat model.
//!
//! # Modules
//!
//! | Module | Role |
//! |--------|------|
//! | [`client`] | [`ModelClient`] trait and the request types |
//! | [`openai`] | reqwest implementation against `/chat/completions` |
//! | [`retry`] | exponential backoff decorator for transient failures |
//! | [`schema`] | the requested JSON shape, its prompt rendering, and validation |
//! | [`extract`] | [`StructuredExtractor`]: prompt, call, parse, check |

pub mod client;
pub mod extract;
pub mod openai;
pub mod retry;
pub mod schema;

pub use client::{ChatRequest, Message, ModelClient, ResponseFormat};
pub use extract::StructuredExtractor;
pub use openai::OpenAiClient;
pub use retry::RetryingClient;
pub use schema::{ExtractionSchema, Violation};
