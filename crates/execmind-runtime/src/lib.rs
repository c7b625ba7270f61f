//! # execmind-runtime
//!
//! Resilient multi-provider model dispatch for ExecMind.
//!
//! This crate wraps the pure policy in `execmind-core` with everything that
//! talks to the outside world:
//! - Provider clients behind the [`LlmProvider`] trait
//! - Per-provider circuit breaking
//! - Bounded retry with exponential backoff, jitter and failover
//! - A TTL response cache for guarded output
//! - Usage telemetry with cost estimates
//!
//! ## Example
//!
//! ```rust,ignore
//! use execmind_runtime::{Dispatcher, EchoProvider, IntentFlags, Role};
//! use std::collections::HashMap;
//!
//! let dispatcher = Dispatcher::builder()
//!     .providers(EchoProvider::standard_set().into_iter().collect())
//!     .build()?;
//!
//! let vars: HashMap<String, serde_json::Value> = HashMap::new();
//! let text = dispatcher
//!     .dispatch(Role::Suggestion, "Nudge me.", &IntentFlags::default().quiet(), "v1", &vars)
//!     .await?;
//! ```

use thiserror::Error;

pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod providers;
pub mod resilience;
pub mod telemetry;

pub use cache::{CacheConfig, ResponseCache};
pub use config::{ConfigError, ProviderSpec, RuntimeConfig};
pub use dispatcher::{DispatchState, Dispatcher, DispatcherBuilder};
pub use providers::{
    EchoProvider, GenerationOptions, LlmProvider, ProviderError, ProviderRegistry, ProviderSet,
};
pub use resilience::{
    CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot, ResilientExecutor, RetryPolicy,
};
pub use telemetry::{ProviderUsage, TelemetryConfig, TelemetryRecorder, TelemetrySnapshot};

pub use execmind_core::{
    Budget, Depth, GuardViolation, IntentFlags, PolicyError, Role, RoutingDecision,
};

/// Errors surfaced by a dispatch.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("All providers exhausted for {role}")]
    AllProvidersExhausted { role: Role },

    #[error(transparent)]
    Guard(#[from] GuardViolation),

    #[error("Provider not registered: {0}")]
    ProviderNotRegistered(String),

    #[error("Dispatcher not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid guard policy: {0}")]
    Policy(#[from] PolicyError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
}
