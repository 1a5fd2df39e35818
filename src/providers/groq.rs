use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::providers::{FallbackProvider, TextGenerator};

const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";

/// Second provider in the fallback chain. OpenAI-compatible API hosted
/// at Groq's endpoint.
pub struct GroqProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GroqProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::provider("groq", format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for GroqProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::provider("groq", "No API key configured"))?;

        debug!("Making Groq API request to model: {}", self.model);

        let request = GroqRequest {
            model: self.model.clone(),
            messages: vec![GroqMessage {
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
            .map_err(|e| Error::provider("groq", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Groq API error: {} - {}", status, error_text);
            return Err(Error::provider(
                "groq",
                format!("API error {}: {}", status, error_text),
            ));
        }

        let completion: GroqResponse = response
            .json()
            .await
            .map_err(|e| Error::provider("groq", format!("Failed to parse response: {}", e)))?;

        let text = completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::provider("groq", "Empty response body"));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "groq"
    }
}

impl FallbackProvider for GroqProvider {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Clone, Serialize)]
struct GroqMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GroqResponse {
    #[serde(default)]
    choices: Vec<GroqChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct GroqChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_follows_key_presence() {
        let with_key = GroqProvider::new(Some("gsk-test".to_string()), Duration::from_secs(30))
            .unwrap();
        assert!(with_key.is_available());

        let without_key = GroqProvider::new(None, Duration::from_secs(30)).unwrap();
        assert!(!without_key.is_available());
    }

    #[tokio::test]
    async fn test_generate_without_key_fails() {
        let provider = GroqProvider::new(None, Duration::from_secs(30)).unwrap();
        assert!(provider.generate("ping").await.is_err());
    }
}
