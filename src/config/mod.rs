use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};

/// Gateway configuration, read once at startup. Layered sources: an
/// optional TOML file, then environment variables with a `PROMPTGATE_`
/// prefix (`__` as the nesting separator, commas for the key list).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryConfig {
    /// One credential is created per key, in list order.
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "default_primary_model")]
    pub model: String,
}

/// Secrets for the fallback chain. A missing secret permanently disables
/// that provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub openrouter_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
}

fn default_max_concurrent() -> usize {
    2
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_max_error_count() -> u32 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_primary_model() -> String {
    "gemini-1.5-flash".to_string()
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            model: default_primary_model(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            cooldown_secs: default_cooldown_secs(),
            max_error_count: default_max_error_count(),
            max_attempts: default_max_attempts(),
            request_timeout_secs: default_request_timeout_secs(),
            primary: PrimaryConfig::default(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_file {
            info!("Loading configuration from: {:?}", path);
            builder = builder.add_source(File::from(path.to_path_buf()).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("PROMPTGATE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("primary.api_keys"),
            )
            .build()?;

        let config: GatewayConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            "Configuration loaded: {} primary credentials, model {}",
            config.primary.api_keys.len(),
            config.primary.model
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary.api_keys.is_empty() {
            return Err(Error::validation("At least one primary API key is required"));
        }
        if self.primary.api_keys.iter().any(|k| k.trim().is_empty()) {
            return Err(Error::validation("Primary API keys must not be blank"));
        }
        if self.primary.model.is_empty() {
            return Err(Error::validation("Primary model must not be empty"));
        }
        if self.max_concurrent == 0 {
            return Err(Error::validation("max_concurrent must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(Error::validation("max_attempts must be at least 1"));
        }
        if self.cooldown_secs == 0 {
            return Err(Error::validation("cooldown_secs must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::validation("request_timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
