//! Resilient AI text-generation gateway.
//!
//! A primary provider backed by a pool of interchangeable credentials
//! (per-credential cooldown and error tracking), an ordered chain of
//! fallback providers, and an orchestrating gateway that bounds
//! concurrent primary load, retries with backoff, and exposes
//! statistics and health.

pub mod config;
pub mod error;
pub mod fallback;
pub mod gateway;
pub mod pool;
pub mod providers;

pub use config::GatewayConfig;
pub use error::{Error, Result};
pub use fallback::{FallbackChain, FallbackResult, FallbackStats};
pub use gateway::{
    Generation, GatewayOptions, GatewayStats, HealthReport, HealthState, RequestGateway,
};
pub use pool::{CredentialPool, PoolStatus, SelectedCredential};
pub use providers::{FallbackProvider, TextGenerator};
