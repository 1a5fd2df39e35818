use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::providers::{FallbackProvider, TextGenerator};

const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.3";

/// Last provider in the fallback chain. Hugging Face inference API with
/// a text-generation response shape.
pub struct HuggingFaceProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl HuggingFaceProvider {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::provider("huggingface", format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: "https://api-inference.huggingface.co/models".to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for HuggingFaceProvider {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::provider("huggingface", "No API key configured"))?;

        debug!("Making Hugging Face API request to model: {}", self.model);

        let request = InferenceRequest {
            inputs: prompt.to_string(),
            parameters: InferenceParameters {
                max_new_tokens: 1024,
                temperature: 0.7,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&format!("{}/{}", self.base_url, self.model))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::provider("huggingface", format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Hugging Face API error: {} - {}", status, error_text);
            return Err(Error::provider(
                "huggingface",
                format!("API error {}: {}", status, error_text),
            ));
        }

        let outputs: Vec<InferenceOutput> = response.json().await.map_err(|e| {
            Error::provider("huggingface", format!("Failed to parse response: {}", e))
        })?;

        let text = outputs
            .first()
            .map(|o| o.generated_text.clone())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(Error::provider("huggingface", "Empty response body"));
        }

        Ok(text)
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

impl FallbackProvider for HuggingFaceProvider {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Clone, Serialize)]
struct InferenceParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_follows_key_presence() {
        let with_key =
            HuggingFaceProvider::new(Some("hf-test".to_string()), Duration::from_secs(30))
                .unwrap();
        assert!(with_key.is_available());

        let without_key = HuggingFaceProvider::new(None, Duration::from_secs(30)).unwrap();
        assert!(!without_key.is_available());
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"[{"generated_text": "the answer"}]"#;
        let parsed: Vec<InferenceOutput> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].generated_text, "the answer");
    }
}
