//! # execmind-core
//!
//! Deterministic policy for ExecMind model dispatch.
//!
//! This crate answers, without touching the network:
//! - Which providers should serve this request, and in what order?
//! - Which model and token budget should they use?
//! - Is this generated text acceptable for the role that asked for it?
//! - Which cache entry does this request map to?
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: Same role and flags always produce the same routing decision
//! 2. **No LLM calls**: Routing and guarding are pure functions
//! 3. **Typed failures**: Every rejected output names its role and reason
//! 4. **Stable fingerprints**: Semantically identical variables share a cache key
//!
//! ## Example
//!
//! ```rust,ignore
//! use execmind_core::{IntentFlags, ModelRouter, OutputGuard, Role, RouterPolicy};
//!
//! let router = ModelRouter::new(RouterPolicy::default(), ["openai", "anthropic"]);
//! let decision = router.decide(Role::Suggestion, &IntentFlags::default().quiet());
//! assert_eq!(decision.model, "gpt-4o-mini");
//!
//! let guard = OutputGuard::with_defaults();
//! let text = guard.enforce(Role::Suggestion, "Follow up with the investor today.")?;
//! ```

pub mod fingerprint;
pub mod guard;
pub mod role;
pub mod router;
pub mod tokens;

// Re-export main types at crate root
pub use fingerprint::{context_hash, normalize_variables, Fingerprint};
pub use guard::{GuardPolicy, GuardRule, GuardViolation, OutputGuard, PolicyError};
pub use role::{Budget, Depth, IntentFlags, Role, UnknownRole};
pub use router::{ModelRouter, RouterPolicy, RoutingDecision, TokenTiers};
pub use tokens::count_tokens;
