//! Per-provider circuit breaking.
//!
//! Repeated failures open a provider's circuit for a cooldown window, during
//! which dispatches skip it entirely. There is no half-open probe: once the
//! cooldown passes the provider is eligible again, and its failure count is
//! kept until a success resets it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::duration_serde;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// How long an open circuit stays open
    #[serde(with = "duration_serde")]
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CircuitEntry {
    failures: u32,
    open_until: Option<Instant>,
}

impl CircuitEntry {
    fn cooldown_remaining(&self, now: Instant) -> Option<Duration> {
        self.open_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

/// Point-in-time view of one provider's circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitSnapshot {
    /// Provider name (lowercase)
    pub provider: String,

    /// Consecutive failures since the last success
    pub failures: u32,

    /// Whether the provider is currently skipped
    pub open: bool,

    /// Time left before the provider is eligible again
    pub cooldown_remaining: Option<Duration>,
}

/// Circuit state for every provider seen by this process.
///
/// Entries are created lazily and updated under per-provider locks, so
/// concurrent dispatches against different providers never contend.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    circuits: DashMap<String, CircuitEntry>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create a registry with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            circuits: DashMap::new(),
            config,
        }
    }

    /// The configuration in use.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Check if a provider's cooldown is still running.
    pub fn is_open(&self, provider: &str) -> bool {
        self.circuits
            .get(&key(provider))
            .and_then(|entry| entry.cooldown_remaining(Instant::now()))
            .is_some()
    }

    /// Record a successful call: the circuit closes and the count resets.
    pub fn record_success(&self, provider: &str) {
        let mut entry = self.circuits.entry(key(provider)).or_default();
        if entry.failures > 0 || entry.open_until.is_some() {
            tracing::debug!(provider, failures = entry.failures, "Circuit reset after success");
        }
        *entry = CircuitEntry::default();
    }

    /// Record a failed call, opening the circuit at the threshold.
    pub fn record_failure(&self, provider: &str) {
        let mut entry = self.circuits.entry(key(provider)).or_default();
        entry.failures = entry.failures.saturating_add(1);

        if entry.failures >= self.config.failure_threshold {
            entry.open_until = Some(Instant::now() + self.config.cooldown);
            tracing::warn!(
                provider,
                failures = entry.failures,
                cooldown = ?self.config.cooldown,
                "Circuit opened after repeated failures"
            );
        }
    }

    /// Current state of a provider's circuit.
    pub fn state(&self, provider: &str) -> CircuitSnapshot {
        let name = key(provider);
        let entry = self
            .circuits
            .get(&name)
            .map(|entry| *entry)
            .unwrap_or_default();
        snapshot(name, entry)
    }

    /// State of every provider seen so far, sorted by name.
    pub fn states(&self) -> Vec<CircuitSnapshot> {
        let mut states: Vec<CircuitSnapshot> = self
            .circuits
            .iter()
            .map(|item| snapshot(item.key().clone(), *item.value()))
            .collect();
        states.sort_by(|a, b| a.provider.cmp(&b.provider));
        states
    }

    /// Reset all circuits to closed.
    pub fn reset(&self) {
        self.circuits.clear();
    }
}

fn key(provider: &str) -> String {
    provider.to_ascii_lowercase()
}

fn snapshot(provider: String, entry: CircuitEntry) -> CircuitSnapshot {
    let cooldown_remaining = entry.cooldown_remaining(Instant::now());
    CircuitSnapshot {
        provider,
        failures: entry.failures,
        open: cooldown_remaining.is_some(),
        cooldown_remaining,
    }
}
