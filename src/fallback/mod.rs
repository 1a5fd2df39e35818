use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::providers::FallbackProvider;

/// Ordered chain of secondary providers, tried sequentially after the
/// primary pool is exhausted. Each provider gets exactly one attempt per
/// call; resilience here comes from breadth, not retries.
pub struct FallbackChain {
    providers: Vec<Arc<dyn FallbackProvider>>,
    request_timeout: Duration,
    successes: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct FallbackResult {
    pub text: String,
    pub provider_name: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FallbackStats {
    pub providers: usize,
    pub successes: u64,
}

impl FallbackChain {
    /// Providers without a configured secret are excluded here, at
    /// startup, not retried at call time.
    pub fn new(providers: Vec<Arc<dyn FallbackProvider>>, request_timeout: Duration) -> Self {
        let available: Vec<_> = providers
            .into_iter()
            .filter(|p| {
                if p.is_available() {
                    true
                } else {
                    info!("Excluding fallback provider {} (no secret configured)", p.name());
                    false
                }
            })
            .collect();

        info!("Fallback chain initialized with {} providers", available.len());

        Self {
            providers: available,
            request_timeout,
            successes: AtomicU64::new(0),
        }
    }

    pub fn has_providers(&self) -> bool {
        !self.providers.is_empty()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub async fn generate_fallback(&self, prompt: &str) -> Result<FallbackResult> {
        if self.providers.is_empty() {
            return Err(Error::NoProvidersAvailable);
        }

        for provider in &self.providers {
            debug!("Trying fallback provider: {}", provider.name());

            let result = match timeout(self.request_timeout, provider.generate(prompt)).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    provider: provider.name().to_string(),
                    elapsed_ms: self.request_timeout.as_millis() as u64,
                }),
            };

            match result {
                Ok(text) if !text.trim().is_empty() => {
                    self.successes.fetch_add(1, Ordering::Relaxed);
                    info!("Fallback provider {} succeeded", provider.name());
                    return Ok(FallbackResult {
                        text,
                        provider_name: provider.name().to_string(),
                    });
                }
                Ok(_) => {
                    warn!(
                        "Fallback provider {} returned empty content, continuing",
                        provider.name()
                    );
                }
                Err(e) => {
                    warn!("Fallback provider {} failed: {}, continuing", provider.name(), e);
                }
            }
        }

        Err(Error::AllProvidersFailed)
    }

    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            providers: self.providers.len(),
            successes: self.successes.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.successes.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    use crate::providers::TextGenerator;

    struct ScriptedProvider {
        name: String,
        available: bool,
        reply: Result<String>,
        calls: AtomicU32,
    }

    impl ScriptedProvider {
        fn ok(name: &str, text: &str) -> Self {
            Self {
                name: name.to_string(),
                available: true,
                reply: Ok(text.to_string()),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                available: true,
                reply: Err(Error::provider(name, "upstream unavailable")),
                calls: AtomicU32::new(0),
            }
        }

        fn unconfigured(name: &str) -> Self {
            Self {
                name: name.to_string(),
                available: false,
                reply: Err(Error::provider(name, "No API key configured")),
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedProvider {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(Error::provider(self.name.as_str(), "upstream unavailable")),
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    impl FallbackProvider for ScriptedProvider {
        fn is_available(&self) -> bool {
            self.available
        }
    }

    fn chain_of(providers: Vec<Arc<dyn FallbackProvider>>) -> FallbackChain {
        FallbackChain::new(providers, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let first = Arc::new(ScriptedProvider::ok("openrouter", "from openrouter"));
        let second = Arc::new(ScriptedProvider::ok("groq", "from groq"));
        let chain = chain_of(vec![first.clone(), second.clone()]);

        let result = chain.generate_fallback("ping").await.unwrap();
        assert_eq!(result.provider_name, "openrouter");
        assert_eq!(result.text, "from openrouter");
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 0);
    }

    #[tokio::test]
    async fn test_continues_past_failures_in_order() {
        let first = Arc::new(ScriptedProvider::failing("openrouter"));
        let second = Arc::new(ScriptedProvider::ok("groq", "from groq"));
        let chain = chain_of(vec![first.clone(), second.clone()]);

        let result = chain.generate_fallback("ping").await.unwrap();
        assert_eq!(result.provider_name, "groq");
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_fails_with_all_providers_failed() {
        let first = Arc::new(ScriptedProvider::failing("openrouter"));
        let second = Arc::new(ScriptedProvider::failing("groq"));
        let chain = chain_of(vec![first.clone(), second.clone()]);

        let result = chain.generate_fallback("ping").await;
        assert!(matches!(result, Err(Error::AllProvidersFailed)));
        // Each provider got exactly one attempt
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_chain_fails_immediately() {
        let chain = chain_of(vec![]);
        let result = chain.generate_fallback("ping").await;
        assert!(matches!(result, Err(Error::NoProvidersAvailable)));
    }

    #[tokio::test]
    async fn test_unconfigured_providers_excluded_at_startup() {
        let missing = Arc::new(ScriptedProvider::unconfigured("openrouter"));
        let configured = Arc::new(ScriptedProvider::ok("groq", "from groq"));
        let chain = chain_of(vec![missing.clone(), configured]);

        assert_eq!(chain.provider_count(), 1);

        let result = chain.generate_fallback("ping").await.unwrap();
        assert_eq!(result.provider_name, "groq");
        assert_eq!(missing.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_counts_as_provider_failure() {
        let blank = Arc::new(ScriptedProvider::ok("openrouter", "   "));
        let real = Arc::new(ScriptedProvider::ok("groq", "content"));
        let chain = chain_of(vec![blank, real]);

        let result = chain.generate_fallback("ping").await.unwrap();
        assert_eq!(result.provider_name, "groq");
    }

    #[tokio::test]
    async fn test_success_counter_and_reset() {
        let provider = Arc::new(ScriptedProvider::ok("openrouter", "pong"));
        let chain = chain_of(vec![provider]);

        chain.generate_fallback("a").await.unwrap();
        chain.generate_fallback("b").await.unwrap();
        assert_eq!(chain.stats().successes, 2);

        chain.reset();
        assert_eq!(chain.stats().successes, 0);
        assert_eq!(chain.stats().providers, 1);
    }
}
