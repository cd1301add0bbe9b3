//! Chat client collaborator
//!
//! The gateway only needs `chat(system, user) -> text`. `OpenAiChatClient`
//! speaks the OpenAI-compatible `/chat/completions` protocol and owns the
//! transport retry policy; tests substitute scripted clients.

use crate::config::LlmConfig;
use crate::gateway::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// A language-model chat endpoint
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Sends one system + user exchange and returns the raw reply text
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Reply text, expected (not guaranteed) to contain JSON
    /// * `Err(GatewayError::Transport)` - The endpoint could not be reached after retries
    async fn chat(&self, system: &str, user: &str) -> Result<String, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion APIs
pub struct OpenAiChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_retries: u32,
    backoff: Duration,
    json_mode: bool,
}

impl OpenAiChatClient {
    /// Creates a client from the `[llm]` configuration section
    ///
    /// # Arguments
    ///
    /// * `config` - Endpoint, model and retry settings
    /// * `api_key` - Bearer token, already resolved from the environment
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            "Initialized chat client with model: {}, base_url: {}",
            config.model, config.base_url
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_retries: config.max_retries.max(1),
            backoff: Duration::from_secs(1),
            json_mode: true,
        })
    }

    /// Overrides the base delay of the exponential retry backoff
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Disables the `response_format = json_object` request hint
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    fn create_request_body(&self, system: &str, user: &str) -> serde_json::Value {
        let mut body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        if self.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        body
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<String, String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| format!("Failed to send chat request: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(format!("Chat API error {}: {}", status, error_text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse chat response: {}", e))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String, GatewayError> {
        let body = self.create_request_body(system, user);
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                let delay = self.backoff * 2u32.saturating_pow(attempt - 1);
                debug!("Retrying chat request in {:?} (attempt {})", delay, attempt + 1);
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&body).await {
                Ok(content) => return Ok(content),
                Err(e) => {
                    warn!("Chat request attempt {} failed: {}", attempt + 1, e);
                    last_error = e;
                }
            }
        }

        Err(GatewayError::Transport(last_error))
    }
}
