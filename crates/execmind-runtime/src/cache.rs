//! Response cache for guarded model output.
//!
//! Entries are keyed by [`Fingerprint`] and expire lazily: a lookup older
//! than the TTL is treated as a miss and evicted on the spot. Only text that
//! already passed the output guard is stored, so hits are returned as-is.
//!
//! The store holds at most `max_entries`. Past that bound moka may drop
//! entries before their TTL, which only costs a later miss.

use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tokio::time::Instant;

use execmind_core::{Fingerprint, Role};

use crate::config::duration_serde;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which an entry is treated as absent
    #[serde(with = "duration_serde")]
    pub ttl: Duration,

    /// Capacity bound for the in-memory store
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(48 * 60 * 60),
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    text: String,
    created_at: Instant,
}

/// Content-addressed cache of validated output.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    cache: Cache<Fingerprint, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    /// Create a cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder().max_capacity(config.max_entries).build();
        Self {
            cache,
            ttl: config.ttl,
        }
    }

    /// Derive the key for a request.
    pub fn key<'a, I>(role: Role, prompt_version: &str, variables: I) -> Fingerprint
    where
        I: IntoIterator<Item = (&'a String, &'a JsonValue)>,
    {
        Fingerprint::new(role, prompt_version, variables)
    }

    /// Look up fresh output, evicting it if it has expired.
    pub async fn get(&self, key: &Fingerprint) -> Option<String> {
        let entry = self.cache.get(key).await?;

        if entry.created_at.elapsed() > self.ttl {
            if self.evict_if_stale(key, entry.created_at).await {
                tracing::debug!(key = %key, "Cache entry expired");
            }
            return None;
        }

        Some(entry.text)
    }

    /// Remove the entry only if it is still the one written at `stale_at`.
    /// A `put` racing with the expiry check keeps its fresh entry.
    async fn evict_if_stale(&self, key: &Fingerprint, stale_at: Instant) -> bool {
        let result = self
            .cache
            .entry(key.clone())
            .and_compute_with(|current| {
                let op = match current {
                    Some(current) if current.value().created_at == stale_at => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        matches!(result, CompResult::Removed(_))
    }

    /// Store output, replacing any previous entry.
    pub async fn put(&self, key: Fingerprint, text: impl Into<String>) {
        let entry = CacheEntry {
            text: text.into(),
            created_at: Instant::now(),
        };
        self.cache.insert(key, entry).await;
    }

    /// Number of stored entries, expired ones included until looked up.
    pub async fn len(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every entry.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
