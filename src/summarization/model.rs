//! Language model call used for abstractive summaries

use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// External model call: accepts a prompt and token budget, returns text.
///
/// Fallible and possibly slow; callers impose their own timeout.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn summarize(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String, ModelError>;
}

/// Model call errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Initialization error: {0}")]
    InitializationError(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Model returned an empty response")]
    EmptyResponse,
}

/// OpenAI-compatible chat completion client
pub struct LlmClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: usize,
}

impl LlmClient {
    /// Create a new client from configuration
    pub fn new(config: &LlmConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ModelError::InitializationError(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.resolve_api_key(),
            max_retries: config.max_retries.max(1),
        })
    }

    async fn send_once(&self, request: &ChatCompletionRequest) -> Result<String, ModelError> {
        let mut req = self.client.post(&self.endpoint).json(request);

        if let Some(ref api_key) = self.api_key {
            req = req.header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let response = req
            .send()
            .await
            .map_err(|e| ModelError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let parsed = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ModelError::ApiError(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn summarize(
        &self,
        prompt: &str,
        max_tokens: usize,
        temperature: f32,
    ) -> Result<String, ModelError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a concise summarizer of conversations. Preserve key topics, entities, decisions and open questions.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        };

        let mut last_error = None;
        for attempt in 0..self.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} for summarization", attempt);
                tokio::time::sleep(Duration::from_millis(100 * (1 << attempt))).await;
            }

            match self.send_once(&request).await {
                Ok(text) => {
                    debug!("Model summarization successful");
                    return Ok(text);
                }
                Err(e) => last_error = Some(e),
            }
        }

        warn!("Model summarization failed after {} attempts", self.max_retries);
        Err(last_error.unwrap_or(ModelError::EmptyResponse))
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_for(server: &mockito::ServerGuard) -> LlmConfig {
        LlmConfig {
            endpoint: format!("{}/v1/chat/completions", server.url()),
            api_key: Some(SecretString::new("test-key".to_string())),
            max_retries: 2,
            ..LlmConfig::default()
        }
    }

    #[tokio::test]
    async fn test_successful_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"A short summary."}}]}"#)
            .create_async()
            .await;

        let client = LlmClient::new(&config_for(&server)).unwrap();
        let text = client.summarize("prompt", 100, 0.3).await.unwrap();
        assert_eq!(text, "A short summary.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retries_then_fails_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .expect(2)
            .create_async()
            .await;

        let client = LlmClient::new(&config_for(&server)).unwrap();
        let result = client.summarize("prompt", 100, 0.3).await;
        assert!(matches!(result, Err(ModelError::ApiError(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let client = LlmClient::new(&config_for(&server)).unwrap();
        let result = client.summarize("prompt", 100, 0.3).await;
        assert!(matches!(result, Err(ModelError::EmptyResponse)));
    }
}
