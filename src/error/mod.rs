use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No eligible credential available")]
    NoCredentialAvailable,

    #[error("Provider {provider} returned an empty response")]
    EmptyResponse { provider: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("All fallback providers failed")]
    AllProvidersFailed,

    #[error("No fallback providers are configured")]
    NoProvidersAvailable,

    #[error("Request timed out after {elapsed_ms}ms calling {provider}")]
    Timeout { provider: String, elapsed_ms: u64 },

    #[error("AI generation failed: {0}")]
    GatewayFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn empty_response(provider: impl Into<String>) -> Self {
        Error::EmptyResponse {
            provider: provider.into(),
        }
    }

    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Error::RateLimited(msg.into())
    }

    pub fn gateway_failed(msg: impl Into<String>) -> Self {
        Error::GatewayFailed(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Heuristic rate-limit classifier. Upstream error shapes are not
    /// uniform, so a structured 429 signal is preferred and string
    /// matching on the message is the last resort.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Http(e) => e
                .status()
                .map(|s| s == reqwest::StatusCode::TOO_MANY_REQUESTS)
                .unwrap_or(false),
            _ => {
                let msg = self.to_string().to_lowercase();
                msg.contains("rate limit")
                    || msg.contains("quota exceeded")
                    || msg.contains("too many requests")
                    || msg.contains("429")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_rate_limit_detection() {
        assert!(Error::rate_limited("resource exhausted").is_rate_limit());
    }

    #[test]
    fn test_message_rate_limit_detection() {
        assert!(Error::provider("groq", "Too Many Requests").is_rate_limit());
        assert!(Error::provider("openrouter", "quota exceeded for key").is_rate_limit());
        assert!(Error::provider("gemini", "API error 429: slow down").is_rate_limit());
        assert!(!Error::provider("groq", "connection reset by peer").is_rate_limit());
    }

    #[test]
    fn test_non_rate_limit_errors() {
        assert!(!Error::NoCredentialAvailable.is_rate_limit());
        assert!(!Error::empty_response("gemini").is_rate_limit());
        assert!(!Error::gateway_failed("all paths exhausted").is_rate_limit());
    }
}
