//! The seam between the extractor and whatever serves chat completions.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user", or "assistant"
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Output constraint sent along with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    /// Ask for a syntactically valid JSON object. The shape is not enforced.
    JsonObject,
    Text,
}

/// A chat completion request in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            response_format: None,
        }
    }

    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn json_object(mut self) -> Self {
        self.response_format = Some(ResponseFormat::JsonObject);
        self
    }
}

/// Anything that can answer a chat completion with the reply text.
///
/// Failing to reach the model, or the model refusing the request, is
/// [`crate::error::Error::ModelCall`]. An empty reply is returned as an empty
/// string; judging the content is the caller's job.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<String>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serializes_in_wire_shape() {
        let request = ChatRequest::new("gpt-4o-mini")
            .message(Message::system("sys"))
            .message(Message::user("hi"))
            .json_object();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "hi"}
                ],
                "response_format": {"type": "json_object"}
            })
        );
    }

    #[test]
    fn test_response_format_omitted_when_unset() {
        let value = serde_json::to_value(ChatRequest::new("m")).unwrap();
        assert!(value.get("response_format").is_none());
    }
}
