//! Resilience patterns for execmind-runtime.
//!
//! This module provides:
//! - Per-provider circuit breaking
//! - Bounded retry with exponential backoff and jitter
//! - The executor that fails over across an ordered provider list

mod backoff;
mod circuit_breaker;
mod executor;

pub use backoff::RetryPolicy;
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry, CircuitSnapshot};
pub use executor::ResilientExecutor;

/// Whether a failure with this status may succeed on another try.
///
/// Client errors (4xx) are final, except 429 which signals rate limiting.
/// Everything else, including network-level failures reported as 500, is
/// transient.
pub fn is_retryable_status(status: u16) -> bool {
    !(400..500).contains(&status) || status == 429
}
