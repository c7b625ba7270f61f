//! Runtime configuration.
//!
//! Loaded from YAML, with every section optional:
//!
//! ```yaml
//! router:
//!   preferred_provider: anthropic
//! guard:
//!   suggestion:
//!     max_tokens: 120
//!     max_sentences: 2
//! cache:
//!   ttl: 48h
//! circuit_breaker:
//!   failure_threshold: 3
//!   cooldown: 20s
//! retry:
//!   max_attempts: 3
//!   base_delay: 1s
//! providers:
//!   - type: echo
//!     name: openai
//! ```
//!
//! [`RuntimeConfig::apply_env`] then overlays the deployment environment.
//! Values that fail to parse leave the existing setting in place.

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use execmind_core::{GuardPolicy, Role, RouterPolicy};

use crate::cache::CacheConfig;
use crate::resilience::{CircuitBreakerConfig, RetryPolicy};
use crate::telemetry::TelemetryConfig;

/// Errors loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One configured provider client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Factory type, e.g. `echo`, `openai`, `anthropic`
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Factory-specific settings (`name`, `api_key`, `base_url`, ...)
    #[serde(flatten)]
    pub settings: JsonMap<String, JsonValue>,
}

impl ProviderSpec {
    /// Spec with no settings.
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            settings: JsonMap::new(),
        }
    }

    /// Add a setting.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub router: RouterPolicy,
    pub guard: GuardPolicy,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub retry: RetryPolicy,
    pub telemetry: TelemetryConfig,
    pub providers: Vec<ProviderSpec>,
}

impl RuntimeConfig {
    /// Parse configuration from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Overlay settings from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay settings from an arbitrary variable lookup.
    ///
    /// | Variable | Setting |
    /// |---|---|
    /// | `LLM_PROVIDER` | `router.preferred_provider` |
    /// | `GUARD_MAX_TOKENS_PLANNER` | planning guard `max_tokens` |
    /// | `GUARD_MAX_TOKENS_SUGGESTION` | suggestion guard `max_tokens` |
    /// | `SUGGESTION_CACHE_TTL_MS` | `cache.ttl` (milliseconds) |
    /// | `EXECMIND_CIRCUIT_THRESHOLD` | `circuit_breaker.failure_threshold` |
    /// | `EXECMIND_CIRCUIT_COOLDOWN` | `circuit_breaker.cooldown` (`20s`, or seconds) |
    /// | `EXECMIND_RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(provider) = var("LLM_PROVIDER") {
            self.router.preferred_provider = provider.to_ascii_lowercase();
        }
        if let Some(n) = var("GUARD_MAX_TOKENS_PLANNER").and_then(|v| parse_or_warn(&v)) {
            self.guard.set_max_tokens(Role::Planning, n);
        }
        if let Some(n) = var("GUARD_MAX_TOKENS_SUGGESTION").and_then(|v| parse_or_warn(&v)) {
            self.guard.set_max_tokens(Role::Suggestion, n);
        }
        if let Some(ms) = var("SUGGESTION_CACHE_TTL_MS").and_then(|v| parse_or_warn::<u64>(&v)) {
            self.cache.ttl = Duration::from_millis(ms);
        }
        if let Some(n) = var("EXECMIND_CIRCUIT_THRESHOLD").and_then(|v| parse_or_warn(&v)) {
            self.circuit_breaker.failure_threshold = n;
        }
        if let Some(cooldown) = var("EXECMIND_CIRCUIT_COOLDOWN").and_then(|v| {
            let parsed = duration_serde::parse(&v);
            if parsed.is_none() {
                tracing::warn!(value = %v, "Ignoring unparseable duration");
            }
            parsed
        }) {
            self.circuit_breaker.cooldown = cooldown;
        }
        if let Some(n) = var("EXECMIND_RETRY_MAX_ATTEMPTS").and_then(|v| parse_or_warn(&v)) {
            self.retry.max_attempts = n;
        }

        self
    }
}

fn parse_or_warn<T: std::str::FromStr>(value: &str) -> Option<T> {
    let parsed = value.parse().ok();
    if parsed.is_none() {
        tracing::warn!(value, "Ignoring unparseable number");
    }
    parsed
}

/// Durations as humantime strings (`"20s"`, `"48h"`), or integer seconds.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    pub fn parse(value: &str) -> Option<Duration> {
        let value = value.trim();
        value
            .parse::<u64>()
            .map(Duration::from_secs)
            .ok()
            .or_else(|| humantime::parse_duration(value).ok())
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => parse(&text)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid duration: {text}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.router.preferred_provider, "openai");
        assert_eq!(config.guard.rule(Role::Planning).max_tokens, 500);
        assert_eq!(config.guard.rule(Role::Suggestion).max_sentences, Some(2));
        assert_eq!(config.cache.ttl, Duration::from_secs(172_800));
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(20));
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RuntimeConfig::from_yaml("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
router:
  preferred_provider: anthropic
  economy_model: claude-3-5-haiku
guard:
  suggestion:
    max_tokens: 90
    max_sentences: 1
cache:
  ttl: 2h
circuit_breaker:
  cooldown: 45
retry:
  max_attempts: 2
  base_delay: 500ms
telemetry:
  cost_per_token: 0.00001
  model_rates:
    gpt-4o: 0.00003
providers:
  - type: echo
    name: openai
    label: OpenAI
  - type: openai
    name: xai
    base_url: https://api.x.ai/v1
    api_key_env: XAI_API_KEY
"#;
        let config = RuntimeConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.router.preferred_provider, "anthropic");
        assert_eq!(config.router.economy_model, "claude-3-5-haiku");
        assert_eq!(config.router.capable_model, "gpt-4o");

        let suggestion = config.guard.rule(Role::Suggestion);
        assert_eq!(suggestion.max_tokens, 90);
        assert_eq!(suggestion.max_sentences, Some(1));
        assert_eq!(suggestion.cta_pattern, None);
        assert_eq!(config.guard.rule(Role::Planning).max_tokens, 500);

        assert_eq!(config.cache.ttl, Duration::from_secs(7200));
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(45));
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.retry.base_delay, Duration::from_millis(500));
        assert_eq!(config.telemetry.rate("gpt-4o"), 0.00003);

        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].provider_type, "openai");
        assert_eq!(config.providers[1].settings["name"], "xai");
        assert_eq!(config.providers[1].settings["api_key_env"], "XAI_API_KEY");
    }

    #[test]
    fn test_invalid_yaml() {
        let err = RuntimeConfig::from_yaml("circuit_breaker:\n  cooldown: soon").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = RuntimeConfig::from_yaml_file("/nonexistent/execmind.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/execmind.yaml"));
    }

    #[test]
    fn test_env_overlay() {
        let config = RuntimeConfig::default().apply_env_from(env(&[
            ("LLM_PROVIDER", "Anthropic"),
            ("GUARD_MAX_TOKENS_PLANNER", "800"),
            ("GUARD_MAX_TOKENS_SUGGESTION", "100"),
            ("SUGGESTION_CACHE_TTL_MS", "60000"),
            ("EXECMIND_CIRCUIT_THRESHOLD", "5"),
            ("EXECMIND_CIRCUIT_COOLDOWN", "1m"),
            ("EXECMIND_RETRY_MAX_ATTEMPTS", "4"),
        ]));

        assert_eq!(config.router.preferred_provider, "anthropic");
        assert_eq!(config.guard.rule(Role::Planning).max_tokens, 800);
        assert_eq!(config.guard.rule(Role::Suggestion).max_tokens, 100);
        // Token overrides keep the rest of the rule.
        assert_eq!(config.guard.rule(Role::Suggestion).max_sentences, Some(2));
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.cooldown, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 4);
    }

    #[test]
    fn test_env_overlay_is_lenient() {
        let config = RuntimeConfig::default().apply_env_from(env(&[
            ("LLM_PROVIDER", "   "),
            ("GUARD_MAX_TOKENS_PLANNER", "lots"),
            ("SUGGESTION_CACHE_TTL_MS", "-5"),
            ("EXECMIND_CIRCUIT_COOLDOWN", "whenever"),
        ]));
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_provider_spec_builder() {
        let spec = ProviderSpec::new("echo").with("name", "google");
        assert_eq!(spec.provider_type, "echo");
        assert_eq!(spec.settings["name"], "google");
    }

    #[test]
    fn test_serialize_round_trips_durations() {
        let yaml = serde_yaml::to_string(&RuntimeConfig::default()).unwrap();
        assert!(yaml.contains("cooldown: 20s"));
        assert_eq!(RuntimeConfig::from_yaml(&yaml).unwrap(), RuntimeConfig::default());
    }
}
