//! Chat backend over an Ollama-compatible API
//!
//! Transient failures (network errors, 5xx) retry with doubling backoff up
//! to `max_retries`; 4xx responses fail immediately.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use mnemo_config::LlmConfig;
use mnemo_core::{Error, GenerateRequest, GenerateResponse, LanguageModel, Message, Result, Role};

/// Backend configuration, derived from the settings section
#[derive(Debug, Clone)]
pub struct ChatBackendConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl From<&LlmConfig> for ChatBackendConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: message.content.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    #[serde(default)]
    eval_count: Option<usize>,
}

/// Chat completion client
pub struct ChatBackend {
    client: Client,
    config: ChatBackendConfig,
}

impl ChatBackend {
    pub fn new(config: ChatBackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    async fn execute(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut builder = self.client.post(self.api_url("/chat")).json(request);
        if let Some(ref api_key) = self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("llm request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendUnavailable(format!(
                "llm API returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("llm response parse: {}", e)))
    }

    fn is_retryable(status_message: &str) -> bool {
        // reqwest transport errors and 5xx responses carry these markers
        status_message.contains("llm request:") || status_message.contains("llm API returned 5")
    }
}

#[async_trait]
impl LanguageModel for ChatBackend {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse> {
        let start = std::time::Instant::now();

        let chat_request = ChatRequest {
            model: self.config.model.clone(),
            messages: request.to_messages().iter().map(ChatMessage::from).collect(),
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens as i32,
            },
        };

        let mut backoff = self.config.initial_backoff;
        let mut last_error: Option<Error> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(
                    "LLM request failed, retrying in {:?} (attempt {}/{})",
                    backoff,
                    attempt,
                    self.config.max_retries
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }

            match self.execute(&chat_request).await {
                Ok(response) => {
                    return Ok(GenerateResponse {
                        text: response.message.content,
                        tokens: response.eval_count.unwrap_or(0),
                        total_time_ms: start.elapsed().as_millis() as u64,
                    });
                },
                Err(Error::BackendUnavailable(msg)) if Self::is_retryable(&msg) => {
                    last_error = Some(Error::BackendUnavailable(msg));
                },
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::BackendUnavailable("max retries exceeded".to_string())))
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.api_url("/tags"))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = LlmConfig::default();
        let config = ChatBackendConfig::from(&settings);

        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff, Duration::from_millis(100));
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ChatBackend::is_retryable("llm request: connection refused"));
        assert!(ChatBackend::is_retryable("llm API returned 503: busy"));
        assert!(!ChatBackend::is_retryable("llm API returned 400: bad request"));
    }

    #[test]
    fn test_message_roles() {
        let message = Message::system("be brief");
        let chat: ChatMessage = (&message).into();
        assert_eq!(chat.role, "system");

        let message = Message::assistant("ok");
        let chat: ChatMessage = (&message).into();
        assert_eq!(chat.role, "assistant");
    }
}
