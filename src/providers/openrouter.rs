use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::providers::{FallbackProvider, TextGenerator};

const DEFAULT_MODEL: &str = "meta-llama/llama-3.1-8b-instruct";

/// First provider in the fallback chain. OpenAI-compatible chat
/// completions API.
pub struct OpenRouterProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::provider("openrouter", format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: "https://openrouter.ai/api/v1".to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenRouterProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::provider("openrouter", "No API key configured"))?;

        debug!("Making OpenRouter API request to model: {}", self.model);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: 1024,
            temperature: 0.7,
        };

        let response = self
            .client
            .post(&format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider("openrouter", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("OpenRouter API error: {} - {}", status, error_text);
            return Err(Error::provider(
                "openrouter",
                format!("API error {}: {}", status, error_text),
            ));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::provider("openrouter", format!("Failed to parse response: {}", e))
        })?;

        let text = completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::provider("openrouter", "Empty response body"));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

impl FallbackProvider for OpenRouterProvider {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}
