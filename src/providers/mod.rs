use async_trait::async_trait;

use crate::error::Result;

pub mod gemini;
pub mod groq;
pub mod huggingface;
pub mod openrouter;

pub use gemini::GeminiClient;
pub use groq::GroqProvider;
pub use huggingface::HuggingFaceProvider;
pub use openrouter::OpenRouterProvider;

/// A handle capable of turning a prompt into generated text. Primary
/// credentials each own one of these; fallback providers implement the
/// extended trait below.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
    fn name(&self) -> &str;
}

/// A secondary provider in the fallback chain. Availability is computed
/// from secret presence at startup; unavailable providers are excluded
/// from the chain, never retried at call time.
pub trait FallbackProvider: TextGenerator {
    fn is_available(&self) -> bool;
}
