use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::fallback::{FallbackChain, FallbackStats};
use crate::pool::{CredentialPool, PoolStatus};
use crate::providers::{
    FallbackProvider, GeminiClient, GroqProvider, HuggingFaceProvider, OpenRouterProvider,
};

/// Orchestrates a generation request: a concurrency-gated retry loop
/// against the credential pool, then the fallback chain once the primary
/// path is exhausted. The fallback path is deliberately not gated; it is
/// the rare, already-degraded path and backpressure there would only make
/// a bad situation worse.
pub struct RequestGateway {
    pool: CredentialPool,
    chain: FallbackChain,
    limiter: Arc<Semaphore>,
    options: GatewayOptions,
    counters: Counters,
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub max_attempts: u32,
    pub request_timeout: Duration,
    /// Backoff when no credential is eligible, scaled linearly by attempt.
    pub no_credential_backoff: Duration,
    /// Backoff after a non-rate-limit error, scaled linearly by attempt.
    pub error_backoff: Duration,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            request_timeout: Duration::from_secs(30),
            no_credential_backoff: Duration::from_millis(1000),
            error_backoff: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: AtomicU64,
    primary_successes: AtomicU64,
    fallback_successes: AtomicU64,
    rate_limit_events: AtomicU64,
    total_latency_ms: AtomicU64,
}

/// Successful result of a gateway call.
#[derive(Debug, Clone, Serialize)]
pub struct Generation {
    pub text: String,
    pub provider_name: String,
    pub used_fallback: bool,
    pub correlation_id: Uuid,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub total_requests: u64,
    pub primary_successes: u64,
    pub fallback_successes: u64,
    pub rate_limit_events: u64,
    pub average_latency_ms: u64,
    pub pool: PoolStatus,
    pub fallback: FallbackStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub primary_available: bool,
    pub fallback_available: bool,
    pub details: String,
}

impl RequestGateway {
    pub fn new(
        pool: CredentialPool,
        chain: FallbackChain,
        max_concurrent: usize,
        options: GatewayOptions,
    ) -> Self {
        info!(
            "Gateway initialized: {} credentials, {} fallback providers, concurrency ceiling {}",
            pool.len(),
            chain.provider_count(),
            max_concurrent
        );

        Self {
            pool,
            chain,
            limiter: Arc::new(Semaphore::new(max_concurrent)),
            options,
            counters: Counters::default(),
        }
    }

    /// Builds the pool (one Gemini client per configured key) and the
    /// fallback chain from configuration.
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        config.validate()?;

        let pool = CredentialPool::new(config.cooldown(), config.max_error_count);
        for key in &config.primary.api_keys {
            let client = GeminiClient::new(
                key.clone(),
                config.primary.model.clone(),
                config.request_timeout(),
            )?;
            pool.add_credential(key, Arc::new(client));
        }

        let providers: Vec<Arc<dyn FallbackProvider>> = vec![
            Arc::new(OpenRouterProvider::new(
                config.fallback.openrouter_api_key.clone(),
                config.request_timeout(),
            )?),
            Arc::new(GroqProvider::new(
                config.fallback.groq_api_key.clone(),
                config.request_timeout(),
            )?),
            Arc::new(HuggingFaceProvider::new(
                config.fallback.huggingface_api_key.clone(),
                config.request_timeout(),
            )?),
        ];
        let chain = FallbackChain::new(providers, config.request_timeout());

        let options = GatewayOptions {
            max_attempts: config.max_attempts,
            request_timeout: config.request_timeout(),
            ..GatewayOptions::default()
        };

        Ok(Self::new(pool, chain, config.max_concurrent, options))
    }

    pub async fn generate(&self, prompt: &str) -> Result<Generation> {
        let correlation_id = Uuid::new_v4();
        let started = Instant::now();
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        debug!(%correlation_id, "Gateway request started");

        if let Some((text, provider_name)) = self.try_primary(prompt, correlation_id).await {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            self.counters.primary_successes.fetch_add(1, Ordering::Relaxed);
            self.counters
                .total_latency_ms
                .fetch_add(elapsed_ms, Ordering::Relaxed);
            info!(%correlation_id, provider = %provider_name, elapsed_ms, "Primary request succeeded");
            return Ok(Generation {
                text,
                provider_name,
                used_fallback: false,
                correlation_id,
                elapsed_ms,
            });
        }

        warn!(%correlation_id, "Primary pool exhausted, invoking fallback chain");

        match self.chain.generate_fallback(prompt).await {
            Ok(result) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.counters.fallback_successes.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .total_latency_ms
                    .fetch_add(elapsed_ms, Ordering::Relaxed);
                info!(%correlation_id, provider = %result.provider_name, elapsed_ms, "Fallback request succeeded");
                Ok(Generation {
                    text: result.text,
                    provider_name: result.provider_name,
                    used_fallback: true,
                    correlation_id,
                    elapsed_ms,
                })
            }
            Err(e) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                self.counters
                    .total_latency_ms
                    .fetch_add(elapsed_ms, Ordering::Relaxed);
                error!(%correlation_id, elapsed_ms, "All generation paths exhausted: {}", e);
                Err(Error::gateway_failed(format!(
                    "primary pool exhausted and fallback failed: {}",
                    e
                )))
            }
        }
    }

    /// Primary attempt loop, bounded by the concurrency permit for its
    /// whole duration. Returns the generated text and provider name, or
    /// `None` once the pool is exhausted for this call. The permit is
    /// dropped before the fallback chain runs.
    async fn try_primary(&self, prompt: &str, correlation_id: Uuid) -> Option<(String, String)> {
        let _permit = self.limiter.acquire().await.ok()?;

        for attempt in 1..=self.options.max_attempts {
            let Some(credential) = self.pool.select_credential() else {
                if attempt == self.options.max_attempts {
                    debug!(%correlation_id, "No eligible credential on final attempt");
                    return None;
                }
                let delay = self.options.no_credential_backoff * attempt;
                debug!(%correlation_id, attempt, "No eligible credential, backing off {:?}", delay);
                sleep(delay).await;
                continue;
            };

            debug!(%correlation_id, credential = %credential.label, attempt, "Issuing primary call");

            let result = match timeout(
                self.options.request_timeout,
                credential.client.generate(prompt),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout {
                    provider: credential.client.name().to_string(),
                    elapsed_ms: self.options.request_timeout.as_millis() as u64,
                }),
            };

            let result = result.and_then(|text| {
                if text.trim().is_empty() {
                    Err(Error::empty_response(credential.client.name()))
                } else {
                    Ok(text)
                }
            });

            match result {
                Ok(text) => {
                    self.pool.mark_success(&credential);
                    return Some((text, credential.client.name().to_string()));
                }
                Err(e) if e.is_rate_limit() => {
                    // The credential is cooling down now; the next attempt
                    // will likely pick a different one, so no added sleep.
                    warn!(%correlation_id, credential = %credential.label, attempt, "Rate limited: {}", e);
                    self.pool.mark_rate_limited(&credential);
                    self.counters.rate_limit_events.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(%correlation_id, credential = %credential.label, attempt, "Primary call failed: {}", e);
                    self.pool.mark_error(&credential);
                    if attempt < self.options.max_attempts {
                        sleep(self.options.error_backoff * attempt).await;
                    }
                }
            }
        }

        None
    }

    pub fn stats(&self) -> GatewayStats {
        let total_requests = self.counters.total_requests.load(Ordering::Relaxed);
        let total_latency_ms = self.counters.total_latency_ms.load(Ordering::Relaxed);

        GatewayStats {
            total_requests,
            primary_successes: self.counters.primary_successes.load(Ordering::Relaxed),
            fallback_successes: self.counters.fallback_successes.load(Ordering::Relaxed),
            rate_limit_events: self.counters.rate_limit_events.load(Ordering::Relaxed),
            average_latency_ms: if total_requests > 0 {
                total_latency_ms / total_requests
            } else {
                0
            },
            pool: self.pool.status(),
            fallback: self.chain.stats(),
        }
    }

    /// Three-state health, recomputed on every call, never cached.
    pub fn health_check(&self) -> HealthReport {
        let pool_status = self.pool.status();
        let primary_available = pool_status.eligible > 0;
        let fallback_available = self.chain.has_providers();

        let status = if primary_available {
            HealthState::Healthy
        } else if fallback_available {
            HealthState::Degraded
        } else {
            HealthState::Unhealthy
        };

        HealthReport {
            status,
            primary_available,
            fallback_available,
            details: format!(
                "{}/{} credentials eligible ({} cooling down), {} fallback providers",
                pool_status.eligible,
                pool_status.total,
                pool_status.in_cooldown,
                self.chain.provider_count()
            ),
        }
    }

    /// Full-system reset: gateway counters, pool state, and the chain's
    /// success counter.
    pub fn reset_stats(&self) {
        self.counters.total_requests.store(0, Ordering::Relaxed);
        self.counters.primary_successes.store(0, Ordering::Relaxed);
        self.counters.fallback_successes.store(0, Ordering::Relaxed);
        self.counters.rate_limit_events.store(0, Ordering::Relaxed);
        self.counters.total_latency_ms.store(0, Ordering::Relaxed);
        self.pool.reset_all();
        self.chain.reset();
        info!("Gateway statistics reset");
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }
}
