//! LLM provider abstractions for execmind-runtime.
//!
//! This module defines the capability every generation backend implements,
//! plus the built-in backends:
//! - [`EchoProvider`]: offline, deterministic; always available
//! - `OpenAiCompatibleProvider`: OpenAI chat completions (feature `openai`)
//! - `AnthropicProvider`: Anthropic messages API (feature `anthropic`)
//!
//! ## Security
//!
//! HTTP providers hold credentials in [`ApiCredential`], which never prints
//! its value through `Debug` or `Display`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod echo;
mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "openai")]
mod openai;

pub use echo::{EchoProvider, EchoProviderFactory};
pub use factory::{ProviderFactory, ProviderRegistry, ProviderSet};
pub use secrets::{ApiCredential, KeySource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

#[cfg(feature = "openai")]
pub use openai::{OpenAiCompatibleProvider, OpenAiProviderFactory};

/// Errors from LLM providers.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Status code used to classify the failure.
    ///
    /// Transport-level failures carry no status from upstream and are
    /// reported as 500.
    pub fn status(&self) -> u16 {
        match self {
            ProviderError::ApiError { status, .. } => *status,
            ProviderError::RateLimited { .. } => 429,
            ProviderError::AuthError => 401,
            ProviderError::NotConfigured(_) => 400,
            ProviderError::HttpError(_)
            | ProviderError::ParseError(_)
            | ProviderError::Timeout(_) => 500,
        }
    }

    /// Whether another attempt against the same provider may succeed.
    pub fn is_retryable(&self) -> bool {
        crate::resilience::is_retryable_status(self.status())
    }
}

/// Per-request generation settings chosen by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOptions {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,
}

impl GenerationOptions {
    /// Create generation options.
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            max_tokens,
        }
    }
}

/// A generation backend.
///
/// Any type satisfying this contract can be registered with a dispatcher.
/// Failures carry a status through [`ProviderError::status`], which drives
/// retry and failover decisions.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider identity, used for routing and circuit state.
    fn name(&self) -> &str;

    /// Generate text for a rendered prompt.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError>;
}
