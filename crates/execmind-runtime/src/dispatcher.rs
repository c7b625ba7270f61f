//! The dispatch boundary.
//!
//! One dispatch runs:
//! 1. Route: pick provider order, model and token budget
//! 2. Cache lookup by request fingerprint
//! 3. On miss, resilient execution across providers
//! 4. Output guard
//! 5. Cache write of the guarded text

use std::sync::Arc;

use serde_json::Value as JsonValue;

use execmind_core::{IntentFlags, ModelRouter, OutputGuard, Role, RoutingDecision};

use crate::cache::ResponseCache;
use crate::config::RuntimeConfig;
use crate::providers::{GenerationOptions, LlmProvider, ProviderRegistry, ProviderSet};
use crate::resilience::{CircuitBreakerRegistry, ResilientExecutor};
use crate::telemetry::{TelemetryRecorder, TelemetrySnapshot};
use crate::DispatchError;

/// Process-wide mutable state shared by every dispatch.
///
/// Cloning shares the underlying state; build a fresh value for isolation.
#[derive(Debug, Clone)]
pub struct DispatchState {
    pub circuits: Arc<CircuitBreakerRegistry>,
    pub cache: ResponseCache,
    pub telemetry: Arc<TelemetryRecorder>,
}

impl DispatchState {
    /// Create empty state sized by the configuration.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            circuits: Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone())),
            cache: ResponseCache::new(&config.cache),
            telemetry: Arc::new(TelemetryRecorder::new(config.telemetry.clone())),
        }
    }
}

impl Default for DispatchState {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}

/// Turns (role, prompt, flags) into policy-checked, cached text.
///
/// # Architecture
/// - Routing and guarding are pure (`execmind-core`)
/// - Provider attempts are strictly sequential within a dispatch
/// - Circuits, cache and telemetry are shared across concurrent dispatches
#[derive(Debug)]
pub struct Dispatcher {
    router: ModelRouter,
    guard: OutputGuard,
    executor: ResilientExecutor,
    providers: ProviderSet,
    state: DispatchState,
}

impl Dispatcher {
    /// Start building a dispatcher.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Build a dispatcher whose providers come from the configuration.
    pub fn from_config(
        config: RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, DispatchError> {
        let providers = ProviderSet::from_specs(registry, &config.providers)?;
        Self::builder().config(config).providers(providers).build()
    }

    /// Dispatch one request.
    ///
    /// Provider failures are handled internally; only exhaustion of every
    /// provider or a guard violation reaches the caller. Guard violations
    /// are never cached.
    pub async fn dispatch<'a, I>(
        &self,
        role: Role,
        prompt: &str,
        flags: &IntentFlags,
        prompt_version: &str,
        variables: I,
    ) -> Result<String, DispatchError>
    where
        I: IntoIterator<Item = (&'a String, &'a JsonValue)>,
    {
        let decision = self.router.decide(role, flags);
        let key = ResponseCache::key(role, prompt_version, variables);

        if let Some(text) = self.state.cache.get(&key).await {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(text);
        }
        tracing::debug!(key = %key, "Cache miss");

        let candidates = self.resolve(&decision)?;
        let options = GenerationOptions::new(decision.model, decision.max_tokens);

        let raw = self
            .executor
            .execute(role, prompt, &options, &candidates)
            .await?;
        let guarded = self.guard.enforce(role, &raw)?;

        self.state.cache.put(key, guarded.clone()).await;
        Ok(guarded)
    }

    /// The routing decision a request would get.
    pub fn route(&self, role: Role, flags: &IntentFlags) -> RoutingDecision {
        self.router.decide(role, flags)
    }

    /// Copy of the usage recorded so far.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.state.telemetry.snapshot()
    }

    /// Circuit state for every provider.
    pub fn circuits(&self) -> &CircuitBreakerRegistry {
        &self.state.circuits
    }

    /// The shared response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.state.cache
    }

    /// The output guard in use.
    pub fn guard(&self) -> &OutputGuard {
        &self.guard
    }

    /// Registered providers.
    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// The shared state, for building sibling dispatchers.
    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    fn resolve(&self, decision: &RoutingDecision) -> Result<Vec<Arc<dyn LlmProvider>>, DispatchError> {
        decision
            .providers
            .iter()
            .map(|name| {
                self.providers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| DispatchError::ProviderNotRegistered(name.clone()))
            })
            .collect()
    }
}

/// Builder for [`Dispatcher`].
#[derive(Debug, Default)]
pub struct DispatcherBuilder {
    config: RuntimeConfig,
    providers: ProviderSet,
    state: Option<DispatchState>,
}

impl DispatcherBuilder {
    /// Use this configuration. Its `providers` list is not instantiated
    /// here; see [`Dispatcher::from_config`].
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Register one provider.
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(provider);
        self
    }

    /// Register every provider in a set.
    pub fn providers(mut self, providers: ProviderSet) -> Self {
        for name in providers.names() {
            if let Some(provider) = providers.get(name) {
                self.providers.insert(provider.clone());
            }
        }
        self
    }

    /// Share existing state instead of creating it from the configuration.
    pub fn state(mut self, state: DispatchState) -> Self {
        self.state = Some(state);
        self
    }

    /// Build the dispatcher.
    pub fn build(self) -> Result<Dispatcher, DispatchError> {
        if self.providers.is_empty() {
            return Err(DispatchError::NotConfigured(
                "no providers registered".to_string(),
            ));
        }

        let guard = OutputGuard::new(&self.config.guard)?;
        let router = ModelRouter::new(self.config.router.clone(), self.providers.names());
        let state = self
            .state
            .unwrap_or_else(|| DispatchState::new(&self.config));
        let executor = ResilientExecutor::new(
            self.config.retry.clone(),
            state.circuits.clone(),
            state.telemetry.clone(),
        );

        tracing::debug!(
            providers = ?self.providers.names(),
            preferred = %self.config.router.preferred_provider,
            "Dispatcher ready"
        );

        Ok(Dispatcher {
            router,
            guard,
            executor,
            providers: self.providers,
            state,
        })
    }
}
