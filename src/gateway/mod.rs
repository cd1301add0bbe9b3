//! Decision gateway: the points where a language model is consulted
//!
//! Every call exchanges a system + user prompt for reply text, recovers a JSON
//! object from that text and validates it in code. A reply that cannot be
//! recovered or fails validation is retried once with identical input; the
//! second failure surfaces as `GatewayError::Format`.

mod analysis;
mod client;
mod intent;
mod json;

pub use analysis::{build_analysis_prompt, validate_analysis, PageAnalysis, ResourceDescriptor};
pub use client::{ChatClient, OpenAiChatClient};
pub use intent::{validate_intent, CrawlIntent, IntentDefaults};
pub use json::extract_json;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

/// Attempts per gateway call when the reply is malformed
const FORMAT_ATTEMPTS: u32 = 2;

/// Errors from consulting the language model
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Chat transport failed: {0}")]
    Transport(String),

    #[error("Malformed gateway response: {0}")]
    Format(String),
}

/// Schema-checked access to the chat collaborator
pub struct DecisionGateway {
    client: Box<dyn ChatClient>,
}

impl DecisionGateway {
    pub fn new(client: Box<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// The underlying chat client, for free-text calls
    pub fn client(&self) -> &dyn ChatClient {
        self.client.as_ref()
    }

    /// Sends a prompt and validates the JSON object in the reply
    ///
    /// # Arguments
    ///
    /// * `system` - System prompt describing the expected JSON
    /// * `user` - User prompt; sent unmodified on the retry
    /// * `validate` - Schema check; an `Err` counts as a format failure
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - A validated value
    /// * `Err(GatewayError::Transport)` - The chat client failed; not retried here
    /// * `Err(GatewayError::Format)` - Both attempts produced unusable replies
    pub async fn request_json<T, F>(
        &self,
        system: &str,
        user: &str,
        validate: F,
    ) -> Result<T, GatewayError>
    where
        F: Fn(Value) -> Result<T, String>,
    {
        let mut last_error = String::new();

        for attempt in 1..=FORMAT_ATTEMPTS {
            let reply = self.client.chat(system, user).await?;

            let outcome = extract_json(&reply)
                .ok_or_else(|| "reply contains no JSON object".to_string())
                .and_then(&validate);

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt < FORMAT_ATTEMPTS {
                        debug!("Gateway reply rejected ({}), retrying once", e);
                    } else {
                        warn!("Gateway reply rejected twice: {}", e);
                    }
                    last_error = e;
                }
            }
        }

        Err(GatewayError::Format(last_error))
    }

    /// Turns a free-text crawl instruction into crawl parameters
    pub async fn parse_intent(
        &self,
        instruction: &str,
        defaults: &IntentDefaults<'_>,
    ) -> Result<CrawlIntent, GatewayError> {
        self.request_json(intent::INTENT_SYSTEM_PROMPT, instruction, |value| {
            validate_intent(value, defaults)
        })
        .await
    }

    /// Asks which resources and follow-links on a page match the criteria
    ///
    /// # Arguments
    ///
    /// * `text` - Truncated page text
    /// * `links` - Offered links (at most 50); follow-links must come from here
    /// * `criteria` - Free-text relevance criteria
    pub async fn analyze_page(
        &self,
        text: &str,
        links: &[String],
        criteria: &str,
    ) -> Result<PageAnalysis, GatewayError> {
        let prompt = build_analysis_prompt(text, links, criteria);
        self.request_json(analysis::ANALYSIS_SYSTEM_PROMPT, &prompt, |value| {
            validate_analysis(value, links)
        })
        .await
    }
}
