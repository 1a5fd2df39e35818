//! End-to-end gateway flow against mock providers, using only the
//! public crate surface.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use promptgate::{
    CredentialPool, Error, FallbackChain, FallbackProvider, GatewayOptions, HealthState,
    RequestGateway, Result, TextGenerator,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Succeeds only after a configured number of rate-limited rejections.
struct FlakyClient {
    rejections: AtomicU32,
    calls: AtomicU32,
}

impl FlakyClient {
    fn new(rejections: u32) -> Arc<Self> {
        Arc::new(Self {
            rejections: AtomicU32::new(rejections),
            calls: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl TextGenerator for FlakyClient {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejections.load(Ordering::SeqCst) > 0 {
            self.rejections.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::rate_limited("quota exceeded"));
        }
        Ok("primary reply".to_string())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

struct StableFallback;

#[async_trait]
impl TextGenerator for StableFallback {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok("fallback reply".to_string())
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

impl FallbackProvider for StableFallback {
    fn is_available(&self) -> bool {
        true
    }
}

fn fast_options() -> GatewayOptions {
    GatewayOptions {
        max_attempts: 3,
        request_timeout: Duration::from_secs(5),
        no_credential_backoff: Duration::from_millis(1),
        error_backoff: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn rate_limited_credentials_drain_to_second_key() {
    init_tracing();

    // First key always rejected, second key healthy; the retry loop
    // should land on the second credential without touching fallback.
    let pool = CredentialPool::new(Duration::from_secs(60), 5);
    pool.add_credential("AIzaSyIntegration01", FlakyClient::new(u32::MAX));
    pool.add_credential("AIzaSyIntegration02", FlakyClient::new(0));

    let chain = FallbackChain::new(vec![Arc::new(StableFallback)], Duration::from_secs(5));
    let gateway = RequestGateway::new(pool, chain, 2, fast_options());

    let result = gateway.generate("scan summary please").await.unwrap();
    assert!(!result.used_fallback);
    assert_eq!(result.text, "primary reply");

    let stats = gateway.stats();
    assert_eq!(stats.primary_successes, 1);
    assert_eq!(stats.rate_limit_events, 1);
    assert_eq!(stats.fallback_successes, 0);
    assert_eq!(stats.pool.in_cooldown, 1);
}

#[tokio::test]
async fn degraded_gateway_serves_from_fallback_and_reports_health() {
    init_tracing();

    let pool = CredentialPool::new(Duration::from_secs(60), 5);
    pool.add_credential("AIzaSyIntegration01", FlakyClient::new(u32::MAX));

    let chain = FallbackChain::new(vec![Arc::new(StableFallback)], Duration::from_secs(5));
    let gateway = RequestGateway::new(pool, chain, 2, fast_options());

    let result = gateway.generate("vulnerability digest").await.unwrap();
    assert!(result.used_fallback);
    assert_eq!(result.provider_name, "openrouter");

    let report = gateway.health_check();
    assert_eq!(report.status, HealthState::Degraded);
    assert!(!report.primary_available);
    assert!(report.fallback_available);

    gateway.reset_stats();
    assert_eq!(gateway.health_check().status, HealthState::Healthy);
}
