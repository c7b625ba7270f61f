//! OpenAI-compatible chat completions provider.
//!
//! Serves any backend speaking the `/chat/completions` wire format; xAI is
//! configured as this provider type with its own base URL and key variable.

use super::{
    factory::ProviderFactory,
    secrets::ApiCredential,
    GenerationOptions, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Default environment variable for the API key.
pub const OPENAI_API_KEY_ENV: &str = "LLM_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Chat completions provider.
pub struct OpenAiCompatibleProvider {
    name: String,
    credential: ApiCredential,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("name", &self.name)
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl OpenAiCompatibleProvider {
    /// Create a provider for api.openai.com.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "openai".to_string(),
            credential: ApiCredential::inline("openai", api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    /// Create from provider settings.
    ///
    /// The key comes from `api_key`, else from the variable named by
    /// `api_key_env` (default `LLM_API_KEY`).
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let name = config["name"].as_str().unwrap_or("openai");
        let credential = ApiCredential::resolve(name, config, OPENAI_API_KEY_ENV)?;

        Ok(Self {
            name: name.to_string(),
            credential,
            base_url: config["base_url"]
                .as_str()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            timeout: config["timeout_secs"]
                .as_u64()
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            client: reqwest::Client::new(),
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &options.model,
            max_tokens: options.max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        match status {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(ProviderError::RateLimited { retry_after });
            }
            401 => return Err(ProviderError::AuthError),
            200..=299 => {}
            _ => {
                let message = response
                    .json::<ErrorBody>()
                    .await
                    .map(|body| body.error.message)
                    .unwrap_or_else(|e| e.to_string());
                return Err(ProviderError::ApiError { status, message });
            }
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseError("response contained no choices".to_string()))
    }
}

/// Factory for OpenAI-compatible providers.
///
/// ## Configuration Format
/// ```json
/// {
///   "name": "xai",                        // Optional, defaults to "openai"
///   "api_key": "sk-...",                  // Optional, falls back to api_key_env
///   "api_key_env": "XAI_API_KEY",         // Optional, defaults to LLM_API_KEY
///   "base_url": "https://api.x.ai/v1",    // Optional
///   "timeout_secs": 30                    // Optional
/// }
/// ```
pub struct OpenAiProviderFactory;

impl ProviderFactory for OpenAiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "openai"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OpenAiCompatibleProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        let name = config["name"].as_str().unwrap_or("openai");
        ApiCredential::resolve(name, config, OPENAI_API_KEY_ENV)?;

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn description(&self) -> &'static str {
        "OpenAI-compatible chat completions"
    }
}
