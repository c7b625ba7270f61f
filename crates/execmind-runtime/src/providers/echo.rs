//! Offline echo provider.
//!
//! Reflects the prompt back with the provider label, model and routed token
//! budget, e.g. `OpenAI(gpt-4o-mini,512): <prompt>`. Used when no upstream credentials are
//! configured, and as a deterministic backend in demos.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{factory::ProviderFactory, GenerationOptions, LlmProvider, ProviderError};

/// Deterministic provider that echoes its input.
#[derive(Debug, Clone)]
pub struct EchoProvider {
    name: String,
    label: String,
}

impl EchoProvider {
    /// Create an echo provider. The label defaults to the name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
        }
    }

    /// Set the display label used in generated text.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Echo stand-ins for the four standard backends.
    pub fn standard_set() -> Vec<Arc<dyn LlmProvider>> {
        [
            ("openai", "OpenAI"),
            ("anthropic", "Anthropic"),
            ("google", "Google"),
            ("xai", "xAI"),
        ]
        .into_iter()
        .map(|(name, label)| Arc::new(Self::new(name).with_label(label)) as Arc<dyn LlmProvider>)
        .collect()
    }
}

#[async_trait]
impl LlmProvider for EchoProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        Ok(format!(
            "{}({},{}): {}",
            self.label, options.model, options.max_tokens, prompt
        ))
    }
}

/// Factory for echo providers.
///
/// ## Configuration Format
/// ```json
/// {
///   "name": "openai",      // Required, provider identity
///   "label": "OpenAI"      // Optional, text prefix
/// }
/// ```
pub struct EchoProviderFactory;

impl ProviderFactory for EchoProviderFactory {
    fn provider_type(&self) -> &'static str {
        "echo"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;

        let name = config["name"].as_str().unwrap_or("echo");
        let mut provider = EchoProvider::new(name);
        if let Some(label) = config["label"].as_str() {
            provider = provider.with_label(label);
        }
        Ok(Arc::new(provider))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        match config.get("name") {
            Some(JsonValue::String(name)) if !name.trim().is_empty() => Ok(()),
            Some(_) => Err(ProviderError::NotConfigured(
                "echo provider 'name' must be a non-empty string".to_string(),
            )),
            None => Ok(()),
        }
    }

    fn description(&self) -> &'static str {
        "Offline provider that echoes the prompt"
    }
}
