//! Usage telemetry for model calls.
//!
//! Tracks request counts, token sums, latency and estimated cost, plus a
//! per-provider breakdown of calls by model. Readers get deep-copied
//! [`TelemetrySnapshot`]s and never see shared state.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Cost model for usage estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Cost per token when no model-specific rate is set
    pub cost_per_token: f64,

    /// Per-model cost overrides
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub model_rates: BTreeMap<String, f64>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            cost_per_token: 0.000002,
            model_rates: BTreeMap::new(),
        }
    }
}

impl TelemetryConfig {
    /// Cost per token for a model.
    pub fn rate(&self, model: &str) -> f64 {
        self.model_rates
            .get(model)
            .copied()
            .unwrap_or(self.cost_per_token)
    }
}

/// Calls served by one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderUsage {
    /// Successful calls
    pub count: u64,

    /// Successful calls per model
    pub models: BTreeMap<String, u64>,
}

/// Point-in-time copy of the recorded usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub request_count: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub estimated_cost: f64,
    pub total_latency_ms: f64,
    /// Keyed by lowercase provider name
    pub provider_usage: BTreeMap<String, ProviderUsage>,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Totals {
    request_count: u64,
    tokens_in: u64,
    tokens_out: u64,
    estimated_cost: f64,
    total_latency_ms: f64,
    providers: BTreeMap<String, ProviderUsage>,
}

/// Process-wide usage recorder.
///
/// Every counter lives behind one lock, so a snapshot never observes a
/// call counted in the totals but missing from its provider.
#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    config: TelemetryConfig,
    totals: Mutex<Totals>,
}

impl TelemetryRecorder {
    /// Create a recorder with the given cost model.
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Record one successful model call.
    pub fn record(
        &self,
        provider: &str,
        model: &str,
        tokens_in: usize,
        tokens_out: usize,
        latency: Duration,
    ) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        let tokens = (tokens_in + tokens_out) as f64;

        {
            let mut totals = self.totals.lock();
            totals.request_count += 1;
            totals.tokens_in += tokens_in as u64;
            totals.tokens_out += tokens_out as u64;
            totals.estimated_cost += tokens * self.config.rate(model);
            totals.total_latency_ms += latency_ms;

            let usage = totals
                .providers
                .entry(provider.to_ascii_lowercase())
                .or_default();
            usage.count += 1;
            *usage.models.entry(model.to_string()).or_insert(0) += 1;
        }

        tracing::info!(
            provider,
            model,
            tokens_in,
            tokens_out,
            latency_ms,
            "Model call recorded"
        );
    }

    /// Copy the current usage.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        let totals = self.totals.lock();
        TelemetrySnapshot {
            request_count: totals.request_count,
            tokens_in: totals.tokens_in,
            tokens_out: totals.tokens_out,
            estimated_cost: totals.estimated_cost,
            total_latency_ms: totals.total_latency_ms,
            provider_usage: totals.providers.clone(),
            captured_at: Utc::now(),
        }
    }

    /// Clear all counters.
    pub fn reset(&self) {
        *self.totals.lock() = Totals::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_record_accumulates() {
        let recorder = TelemetryRecorder::default();
        recorder.record("OpenAI", "gpt-4o", 10, 20, Duration::from_millis(150));
        recorder.record("openai", "gpt-4o-mini", 5, 5, Duration::from_millis(50));
        recorder.record("xai", "gpt-4o", 1, 1, Duration::from_millis(10));

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.request_count, 3);
        assert_eq!(snapshot.tokens_in, 16);
        assert_eq!(snapshot.tokens_out, 26);
        assert!((snapshot.total_latency_ms - 210.0).abs() < 1e-6);
        assert!((snapshot.estimated_cost - 42.0 * 0.000002).abs() < 1e-12);

        let openai = &snapshot.provider_usage["openai"];
        assert_eq!(openai.count, 2);
        assert_eq!(openai.models["gpt-4o"], 1);
        assert_eq!(openai.models["gpt-4o-mini"], 1);
        assert_eq!(snapshot.provider_usage["xai"].count, 1);
    }

    #[test]
    fn test_model_rate_override() {
        let mut config = TelemetryConfig::default();
        config.model_rates.insert("gpt-4o".to_string(), 0.00001);
        let recorder = TelemetryRecorder::new(config);

        recorder.record("openai", "gpt-4o", 50, 50, Duration::ZERO);
        recorder.record("openai", "gpt-4o-mini", 50, 50, Duration::ZERO);

        let expected = 100.0 * 0.00001 + 100.0 * 0.000002;
        assert!((recorder.snapshot().estimated_cost - expected).abs() < 1e-12);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let recorder = TelemetryRecorder::default();
        recorder.record("anthropic", "gpt-4o", 1, 1, Duration::ZERO);

        let mut snapshot = recorder.snapshot();
        snapshot.request_count = 99;
        snapshot
            .provider_usage
            .get_mut("anthropic")
            .unwrap()
            .models
            .clear();

        let fresh = recorder.snapshot();
        assert_eq!(fresh.request_count, 1);
        assert_eq!(fresh.provider_usage["anthropic"].models["gpt-4o"], 1);
    }

    #[test]
    fn test_reset() {
        let recorder = TelemetryRecorder::default();
        recorder.record("google", "gpt-4o", 3, 3, Duration::from_millis(5));
        recorder.reset();

        let snapshot = recorder.snapshot();
        assert_eq!(snapshot.request_count, 0);
        assert!(snapshot.provider_usage.is_empty());
    }

    #[test]
    fn test_snapshot_consistent_under_concurrent_records() {
        let recorder = Arc::new(TelemetryRecorder::default());
        let stop = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = ["openai", "anthropic", "openai", "xai"]
            .into_iter()
            .map(|provider| {
                let recorder = recorder.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        recorder.record(provider, "gpt-4o", 1, 1, Duration::ZERO);
                    }
                })
            })
            .collect();

        for _ in 0..20_000 {
            let snapshot = recorder.snapshot();
            let per_provider: u64 = snapshot.provider_usage.values().map(|u| u.count).sum();
            assert_eq!(per_provider, snapshot.request_count);
            assert_eq!(snapshot.tokens_in, snapshot.request_count);
        }

        stop.store(true, Ordering::Relaxed);
        for writer in writers {
            writer.join().unwrap();
        }
    }

    #[test]
    fn test_snapshot_serializes() {
        let recorder = TelemetryRecorder::default();
        recorder.record("openai", "gpt-4o", 1, 2, Duration::ZERO);

        let json = serde_json::to_value(recorder.snapshot()).unwrap();
        assert_eq!(json["request_count"], 1);
        assert_eq!(json["provider_usage"]["openai"]["models"]["gpt-4o"], 1);
        assert!(json["captured_at"].is_string());
    }
}
