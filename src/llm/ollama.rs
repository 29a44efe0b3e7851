//! Ollama provider.
//!
//! Uses the non-streaming `POST /api/chat` endpoint so the whole conversation
//! history is sent on every turn.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::client::{build_http_client, error_from_response};
use super::{GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};
use crate::error::LlmError;

/// Default Ollama server address.
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Default model served by Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3:latest";

/// Client for a local or remote Ollama server.
pub struct OllamaClient {
    base_url: String,
    default_model: String,
    http_client: Client,
}

impl OllamaClient {
    /// Create a client against `base_url` using `model` by default.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: model.into(),
            http_client: build_http_client()?,
        })
    }

    /// Create a client against the default local server.
    pub fn local(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(OLLAMA_BASE_URL, model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: String,
    message: Message,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[async_trait]
impl LlmProvider for OllamaClient {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let options = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            })
        } else {
            None
        };

        let body = ChatRequest {
            model,
            messages: &request.messages,
            stream: false,
            options,
        };

        let response = self
            .http_client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        tracing::trace!(
            model = %parsed.model,
            prompt_tokens = parsed.prompt_eval_count,
            completion_tokens = parsed.eval_count,
            "Ollama chat completed"
        );

        Ok(GenerationResponse {
            model: parsed.model,
            message: parsed.message,
            usage: Usage {
                prompt_tokens: parsed.prompt_eval_count,
                completion_tokens: parsed.eval_count,
            },
        })
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_client_defaults() {
        let client = OllamaClient::local(DEFAULT_OLLAMA_MODEL).unwrap();
        assert_eq!(client.base_url(), OLLAMA_BASE_URL);
        assert_eq!(client.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(client.default_model(), "gemma3:latest");
    }

    #[test]
    fn test_chat_request_serialization() {
        let messages = vec![Message::user("hi")];
        let body = ChatRequest {
            model: "gemma3:latest",
            messages: &messages,
            stream: false,
            options: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["content"], "hi");
        assert!(json.get("options").is_none());
    }

    #[test]
    fn test_chat_response_parsing() {
        let body = r#"{"model":"gemma3:latest","created_at":"2024-01-01T00:00:00Z",
            "message":{"role":"assistant","content":"42"},"done":true,
            "prompt_eval_count":12,"eval_count":3}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, "42");
        assert_eq!(parsed.prompt_eval_count + parsed.eval_count, 15);
    }

    #[tokio::test]
    async fn test_generate_connection_error() {
        let client = OllamaClient::new("http://localhost:65535", "gemma3:latest").unwrap();
        let err = client
            .generate(GenerationRequest::new("", vec![Message::user("ping")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::RequestFailed(_)));
    }
}
