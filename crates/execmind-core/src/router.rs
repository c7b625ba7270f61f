//! Model routing.
//!
//! Maps a role and its intent flags to an ordered provider list, a model
//! and a token budget. Routing is a pure function of the policy, the set of
//! registered providers and the request; it never fails and performs no I/O.

use serde::{Deserialize, Serialize};

use crate::role::{Budget, Depth, IntentFlags, Role};

/// Token budget per depth tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenTiers {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

impl Default for TokenTiers {
    fn default() -> Self {
        Self {
            low: 256,
            medium: 512,
            high: 1024,
        }
    }
}

impl TokenTiers {
    /// Token budget for a depth.
    pub fn for_depth(&self, depth: Depth) -> u32 {
        match depth {
            Depth::Low => self.low,
            Depth::Medium => self.medium,
            Depth::High => self.high,
        }
    }
}

/// Routing policy (configuration-derived).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterPolicy {
    /// Provider tried first when registered
    pub preferred_provider: String,

    /// Higher-capability model
    pub capable_model: String,

    /// Cheaper model
    pub economy_model: String,

    /// Token budget per depth
    pub token_tiers: TokenTiers,
}

impl Default for RouterPolicy {
    fn default() -> Self {
        Self {
            preferred_provider: "openai".to_string(),
            capable_model: "gpt-4o".to_string(),
            economy_model: "gpt-4o-mini".to_string(),
            token_tiers: TokenTiers::default(),
        }
    }
}

/// The computed provider order, model and token budget for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Provider names, preferred first, then the rest in canonical order
    pub providers: Vec<String>,

    /// Model identifier passed to every provider
    pub model: String,

    /// Maximum tokens to request
    pub max_tokens: u32,
}

/// Deterministic router over a fixed provider set.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    policy: RouterPolicy,
    /// Registered providers, lowercase, sorted and deduplicated
    providers: Vec<String>,
}

impl ModelRouter {
    /// Create a router for the given registered providers.
    ///
    /// Provider names are normalized to lowercase. Canonical fallback order
    /// is alphabetical.
    pub fn new<I, S>(policy: RouterPolicy, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut providers: Vec<String> = providers
            .into_iter()
            .map(|p| p.as_ref().trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        providers.sort();
        providers.dedup();

        Self { policy, providers }
    }

    /// The routing policy in use.
    pub fn policy(&self) -> &RouterPolicy {
        &self.policy
    }

    /// Registered providers in canonical order.
    pub fn registered(&self) -> &[String] {
        &self.providers
    }

    /// Compute the routing decision for a request.
    pub fn decide(&self, role: Role, flags: &IntentFlags) -> RoutingDecision {
        RoutingDecision {
            providers: self.provider_order(),
            model: self.select_model(role, flags).to_string(),
            max_tokens: self.policy.token_tiers.for_depth(flags.effective_depth()),
        }
    }

    /// Pick the model for a role.
    ///
    /// Planning uses the capable model only at high depth. Suggestions use
    /// the economy model when quiet. A low budget always wins.
    pub fn select_model(&self, role: Role, flags: &IntentFlags) -> &str {
        if flags.budget == Some(Budget::Low) {
            return &self.policy.economy_model;
        }

        let capable = match role {
            Role::Planning => flags.effective_depth() == Depth::High,
            Role::Suggestion => !flags.quiet,
        };

        if capable {
            &self.policy.capable_model
        } else {
            &self.policy.economy_model
        }
    }

    /// Preferred provider first, then every other registered provider.
    pub fn provider_order(&self) -> Vec<String> {
        let preferred = self.policy.preferred_provider.trim().to_ascii_lowercase();

        if !self.providers.contains(&preferred) {
            tracing::debug!(
                preferred = %preferred,
                "Preferred provider not registered, using canonical order"
            );
            return self.providers.clone();
        }

        std::iter::once(preferred.clone())
            .chain(self.providers.iter().filter(|p| **p != preferred).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn router() -> ModelRouter {
        ModelRouter::new(RouterPolicy::default(), ["xai", "openai", "google", "anthropic"])
    }

    #[test]
    fn test_token_budget_by_depth() {
        let router = router();
        let flags = IntentFlags::default();
        assert_eq!(router.decide(Role::Planning, &flags).max_tokens, 512);

        let low = flags.with_depth(Depth::Low);
        assert_eq!(router.decide(Role::Planning, &low).max_tokens, 256);

        let high = flags.with_depth(Depth::High);
        assert_eq!(router.decide(Role::Suggestion, &high).max_tokens, 1024);
    }

    #[test]
    fn test_planning_model_selection() {
        let router = router();
        let flags = IntentFlags::default();
        assert_eq!(router.decide(Role::Planning, &flags).model, "gpt-4o-mini");

        let high = flags.with_depth(Depth::High);
        assert_eq!(router.decide(Role::Planning, &high).model, "gpt-4o");
    }

    #[test]
    fn test_suggestion_model_selection() {
        let router = router();
        assert_eq!(
            router.decide(Role::Suggestion, &IntentFlags::default()).model,
            "gpt-4o"
        );
        assert_eq!(
            router.decide(Role::Suggestion, &IntentFlags::default().quiet()).model,
            "gpt-4o-mini"
        );
    }

    #[test]
    fn test_low_budget_forces_economy_model() {
        let router = router();
        let flags = IntentFlags::default()
            .with_depth(Depth::High)
            .with_budget(Budget::Low);

        assert_eq!(router.decide(Role::Planning, &flags).model, "gpt-4o-mini");
        assert_eq!(router.decide(Role::Suggestion, &flags).model, "gpt-4o-mini");
    }

    #[test]
    fn test_provider_order_preferred_first_then_alphabetical() {
        let decision = router().decide(Role::Planning, &IntentFlags::default());
        assert_eq!(decision.providers, vec!["openai", "anthropic", "google", "xai"]);

        let policy = RouterPolicy {
            preferred_provider: "XAI".to_string(),
            ..Default::default()
        };
        let router = ModelRouter::new(policy, ["openai", "anthropic", "google", "xai"]);
        let decision = router.decide(Role::Suggestion, &IntentFlags::default());
        assert_eq!(decision.providers, vec!["xai", "anthropic", "google", "openai"]);
    }

    #[test]
    fn test_unregistered_preferred_provider_falls_back_to_canonical() {
        let policy = RouterPolicy {
            preferred_provider: "mistral".to_string(),
            ..Default::default()
        };
        let router = ModelRouter::new(policy, ["openai", "anthropic"]);
        assert_eq!(router.provider_order(), vec!["anthropic", "openai"]);
    }

    #[test]
    fn test_duplicate_providers_collapse() {
        let router = ModelRouter::new(RouterPolicy::default(), ["OpenAI", "openai", " anthropic "]);
        assert_eq!(router.registered(), &["anthropic".to_string(), "openai".to_string()]);
    }

    fn arb_flags() -> impl Strategy<Value = IntentFlags> {
        let depth = prop_oneof![
            Just(None),
            Just(Some(Depth::Low)),
            Just(Some(Depth::Medium)),
            Just(Some(Depth::High)),
        ];
        let budget = prop_oneof![
            Just(None),
            Just(Some(Budget::Low)),
            Just(Some(Budget::Standard)),
            Just(Some(Budget::High)),
        ];
        (depth, budget, any::<bool>()).prop_map(|(depth, budget, quiet)| IntentFlags {
            depth,
            budget,
            quiet,
        })
    }

    proptest! {
        #[test]
        fn prop_decide_is_deterministic(flags in arb_flags(), planning in any::<bool>()) {
            let role = if planning { Role::Planning } else { Role::Suggestion };
            let router = router();
            prop_assert_eq!(router.decide(role, &flags), router.decide(role, &flags));
        }

        #[test]
        fn prop_every_registered_provider_listed_once(flags in arb_flags()) {
            let decision = router().decide(Role::Suggestion, &flags);
            let mut sorted = decision.providers.clone();
            sorted.sort();
            prop_assert_eq!(sorted, vec!["anthropic", "google", "openai", "xai"]);
            prop_assert_eq!(decision.providers[0].as_str(), "openai");
        }
    }
}
