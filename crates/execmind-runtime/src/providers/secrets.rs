//! API keys for HTTP providers.
//!
//! A provider's key comes from its inline `api_key` setting. When that is
//! missing or blank, the environment variable named by `api_key_env` is read
//! instead; each provider type supplies its own default variable. Keys are
//! held in a [`SecretString`] and never printed.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a provider's key was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// The `api_key` setting, or a key passed in code
    Inline,
    /// The named environment variable
    Env(String),
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Inline => write!(f, "inline"),
            KeySource::Env(var) => write!(f, "${var}"),
        }
    }
}

/// The API key of one provider.
pub struct ApiCredential {
    provider: String,
    key: SecretString,
    source: KeySource,
}

impl ApiCredential {
    /// Wrap a key supplied directly.
    pub fn inline(provider: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            key: SecretString::from(key.into()),
            source: KeySource::Inline,
        }
    }

    /// Resolve a provider's key from its settings and the process environment.
    pub fn resolve(
        provider: &str,
        settings: &JsonValue,
        default_env: &str,
    ) -> Result<Self, ProviderError> {
        Self::resolve_with(provider, settings, default_env, |var| std::env::var(var).ok())
    }

    /// Resolve a provider's key, reading variables through `lookup`.
    pub fn resolve_with<F>(
        provider: &str,
        settings: &JsonValue,
        default_env: &str,
        lookup: F,
    ) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = non_blank(settings["api_key"].as_str()) {
            return Ok(Self::inline(provider, key));
        }

        let var = key_env(settings, default_env);
        match lookup(var).filter(|value| !value.trim().is_empty()) {
            Some(key) => Ok(Self {
                provider: provider.to_string(),
                key: SecretString::from(key),
                source: KeySource::Env(var.to_string()),
            }),
            None => Err(ProviderError::NotConfigured(format!(
                "{provider}: no API key; set 'api_key' or the {var} environment variable"
            ))),
        }
    }

    /// The key itself, for the request header only.
    pub fn expose(&self) -> &str {
        self.key.expose_secret()
    }

    /// Where the key was found.
    pub fn source(&self) -> &KeySource {
        &self.source
    }
}

/// The environment variable a provider's settings point at.
fn key_env<'a>(settings: &'a JsonValue, default_env: &'a str) -> &'a str {
    non_blank(settings["api_key_env"].as_str()).unwrap_or(default_env)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("provider", &self.provider)
            .field("key", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} key ({}) [REDACTED]", self.provider, self.source)
    }
}
