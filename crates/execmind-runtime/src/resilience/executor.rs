//! Retry and failover across an ordered provider list.

use std::sync::Arc;

use execmind_core::{count_tokens, Role};
use tokio::time::Instant;

use super::{CircuitBreakerRegistry, RetryPolicy};
use crate::providers::{GenerationOptions, LlmProvider};
use crate::telemetry::TelemetryRecorder;
use crate::DispatchError;

/// Drives provider calls for one request.
///
/// Providers are tried strictly in order. Each gets up to
/// `retry.max_attempts` tries; client errors other than 429 abandon the
/// provider at once, anything else is retried after a backoff delay.
/// Providers whose circuit is open are skipped without consuming a try.
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    retry: RetryPolicy,
    circuits: Arc<CircuitBreakerRegistry>,
    telemetry: Arc<TelemetryRecorder>,
}

impl ResilientExecutor {
    /// Create an executor over shared circuit and telemetry state.
    pub fn new(
        retry: RetryPolicy,
        circuits: Arc<CircuitBreakerRegistry>,
        telemetry: Arc<TelemetryRecorder>,
    ) -> Self {
        Self {
            retry,
            circuits,
            telemetry,
        }
    }

    /// The retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Generate text from the first provider that succeeds.
    pub async fn execute(
        &self,
        role: Role,
        prompt: &str,
        options: &GenerationOptions,
        providers: &[Arc<dyn LlmProvider>],
    ) -> Result<String, DispatchError> {
        let max_attempts = self.retry.max_attempts.max(1);

        for provider in providers {
            let name = provider.name();

            if self.circuits.is_open(name) {
                tracing::debug!(provider = name, "Circuit open, skipping provider");
                continue;
            }

            for attempt in 1..=max_attempts {
                let started = Instant::now();

                match provider.generate(prompt, options).await {
                    Ok(text) => {
                        self.telemetry.record(
                            name,
                            &options.model,
                            count_tokens(prompt),
                            count_tokens(&text),
                            started.elapsed(),
                        );
                        self.circuits.record_success(name);
                        return Ok(text);
                    }
                    Err(err) => {
                        self.circuits.record_failure(name);

                        if !err.is_retryable() {
                            tracing::warn!(
                                provider = name,
                                attempt,
                                status = err.status(),
                                error = %err,
                                "Non-retryable provider error, failing over"
                            );
                            break;
                        }

                        if attempt == max_attempts {
                            tracing::warn!(
                                provider = name,
                                attempts = max_attempts,
                                status = err.status(),
                                error = %err,
                                "Provider exhausted, failing over"
                            );
                            break;
                        }

                        let delay = self.retry.delay_for_attempt(attempt);
                        tracing::warn!(
                            provider = name,
                            attempt,
                            status = err.status(),
                            delay = ?delay,
                            error = %err,
                            "Retrying provider after backoff"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        tracing::warn!(role = %role, "All providers exhausted");
        Err(DispatchError::AllProvidersExhausted { role })
    }
}
