//! Output guard.
//!
//! Generated text is checked against a per-role policy before it reaches a
//! caller or the response cache. Checks run in a fixed order and the first
//! failure aborts:
//!
//! 1. Whitespace-token count of the trimmed text must not exceed `max_tokens`
//! 2. If `max_sentences` is set, the sentence count must be in `1..=max_sentences`
//! 3. If a call-to-action pattern and cap are set, matches must not exceed the cap
//!
//! Accepted text is returned trimmed and otherwise unchanged.

mod patterns;

pub use patterns::{count_matches, count_sentences, DEFAULT_CTA_PATTERN};

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::role::Role;
use crate::tokens::count_tokens;

/// Generated text failed the role's policy.
///
/// Terminal for the request: never retried, never cached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Guard violation for {role}: {reason}")]
pub struct GuardViolation {
    pub role: Role,
    pub reason: String,
}

/// A guard policy could not be compiled.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid call-to-action pattern for {role}: {source}")]
    InvalidPattern {
        role: Role,
        #[source]
        source: regex::Error,
    },
}

/// Output policy for one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRule {
    /// Maximum whitespace tokens in the output
    pub max_tokens: usize,

    /// Maximum sentences (minimum is always 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sentences: Option<usize>,

    /// Pattern describing permitted call-to-action phrases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_pattern: Option<String>,

    /// Maximum call-to-action matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cta_matches: Option<usize>,
}

impl GuardRule {
    /// Default rule for a role.
    pub fn default_for(role: Role) -> Self {
        match role {
            Role::Planning => Self {
                max_tokens: 500,
                max_sentences: None,
                cta_pattern: None,
                max_cta_matches: None,
            },
            Role::Suggestion => Self {
                max_tokens: 150,
                max_sentences: Some(2),
                cta_pattern: Some(DEFAULT_CTA_PATTERN.to_string()),
                max_cta_matches: Some(1),
            },
        }
    }
}

/// Guard rules keyed by role.
///
/// Roles missing from the map use [`GuardRule::default_for`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuardPolicy {
    rules: BTreeMap<Role, GuardRule>,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            rules: Role::ALL
                .iter()
                .map(|role| (*role, GuardRule::default_for(*role)))
                .collect(),
        }
    }
}

impl GuardPolicy {
    /// Rule for a role, falling back to the built-in default.
    pub fn rule(&self, role: Role) -> GuardRule {
        self.rules
            .get(&role)
            .cloned()
            .unwrap_or_else(|| GuardRule::default_for(role))
    }

    /// Replace the rule for a role.
    pub fn set_rule(&mut self, role: Role, rule: GuardRule) {
        self.rules.insert(role, rule);
    }

    /// Override only the token limit for a role.
    pub fn set_max_tokens(&mut self, role: Role, max_tokens: usize) {
        let mut rule = self.rule(role);
        rule.max_tokens = max_tokens;
        self.rules.insert(role, rule);
    }
}

/// A rule with its pattern compiled.
#[derive(Debug, Clone)]
struct CompiledRule {
    max_tokens: usize,
    max_sentences: Option<usize>,
    cta: Option<(Regex, usize)>,
}

/// Validates generated text against role-specific policy.
#[derive(Debug, Clone)]
pub struct OutputGuard {
    rules: BTreeMap<Role, CompiledRule>,
}

impl OutputGuard {
    /// Compile a guard from a policy.
    pub fn new(policy: &GuardPolicy) -> Result<Self, PolicyError> {
        let mut rules = BTreeMap::new();

        for role in Role::ALL {
            let rule = policy.rule(role);
            let cta = match (rule.cta_pattern.as_deref(), rule.max_cta_matches) {
                (Some(pattern), Some(cap)) => {
                    let regex = Regex::new(pattern)
                        .map_err(|source| PolicyError::InvalidPattern { role, source })?;
                    Some((regex, cap))
                }
                _ => None,
            };

            rules.insert(
                role,
                CompiledRule {
                    max_tokens: rule.max_tokens,
                    max_sentences: rule.max_sentences,
                    cta,
                },
            );
        }

        Ok(Self { rules })
    }

    /// Guard using the built-in default rules.
    pub fn with_defaults() -> Self {
        Self::new(&GuardPolicy::default()).expect("Invalid built-in guard pattern")
    }

    /// Enforce the role's policy, returning the trimmed text.
    pub fn enforce(&self, role: Role, raw: &str) -> Result<String, GuardViolation> {
        let trimmed = raw.trim();

        let Some(rule) = self.rules.get(&role) else {
            return Ok(trimmed.to_string());
        };

        let tokens = count_tokens(trimmed);
        if tokens > rule.max_tokens {
            return Err(violation(
                role,
                format!(
                    "Output ({} tokens) exceeds max_tokens ({})",
                    tokens, rule.max_tokens
                ),
            ));
        }

        if let Some(max_sentences) = rule.max_sentences {
            let sentences = count_sentences(trimmed);
            if sentences < 1 || sentences > max_sentences {
                return Err(violation(
                    role,
                    format!(
                        "Output has {} sentences (allowed 1-{})",
                        sentences, max_sentences
                    ),
                ));
            }
        }

        if let Some((pattern, cap)) = &rule.cta {
            let matches = count_matches(pattern, trimmed);
            if matches > *cap {
                return Err(violation(
                    role,
                    format!("Call-to-action mentions ({}) exceed allowed {}", matches, cap),
                ));
            }
        }

        Ok(trimmed.to_string())
    }
}

fn violation(role: Role, reason: String) -> GuardViolation {
    tracing::warn!(role = %role, reason = %reason, "Output guard rejected generated text");
    GuardViolation { role, reason }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_short_suggestion_passes_trimmed() {
        let guard = OutputGuard::with_defaults();
        let text = "  Follow up with investor now.\n";
        assert_eq!(
            guard.enforce(Role::Suggestion, text).unwrap(),
            "Follow up with investor now."
        );
    }

    #[test]
    fn test_three_sentence_suggestion_rejected() {
        let guard = OutputGuard::with_defaults();
        let err = guard
            .enforce(Role::Suggestion, "Sentence one. Sentence two. Sentence three.")
            .unwrap_err();

        assert_eq!(err.role, Role::Suggestion);
        assert!(err.reason.contains("3 sentences"));
        assert!(err.reason.contains("1-2"));
    }

    #[test]
    fn test_empty_suggestion_rejected() {
        let guard = OutputGuard::with_defaults();
        let err = guard.enforce(Role::Suggestion, "   ").unwrap_err();
        assert!(err.reason.contains("0 sentences"));
    }

    #[test]
    fn test_token_limit_checked_first() {
        let mut policy = GuardPolicy::default();
        policy.set_max_tokens(Role::Suggestion, 3);
        let guard = OutputGuard::new(&policy).unwrap();

        // Also too many sentences, but the token check fires first.
        let err = guard
            .enforce(Role::Suggestion, "One two. Three four. Five six.")
            .unwrap_err();
        assert!(err.reason.contains("6 tokens"));
        assert!(err.reason.contains("max_tokens (3)"));
    }

    #[test]
    fn test_cta_cap_enforced() {
        let guard = OutputGuard::with_defaults();
        let err = guard
            .enforce(Role::Suggestion, "Follow up with Dana and review the memo.")
            .unwrap_err();
        assert!(err.reason.contains("(2)"));

        assert!(guard
            .enforce(Role::Suggestion, "Review the memo before Friday.")
            .is_ok());
    }

    #[test]
    fn test_planning_has_no_sentence_limit() {
        let guard = OutputGuard::with_defaults();
        let plan = "Step one. Step two. Step three. Step four. Follow up. Review.";
        assert_eq!(guard.enforce(Role::Planning, plan).unwrap(), plan);
    }

    #[test]
    fn test_planning_token_limit() {
        let guard = OutputGuard::with_defaults();
        let long = "word ".repeat(501);
        let err = guard.enforce(Role::Planning, &long).unwrap_err();
        assert_eq!(err.role, Role::Planning);
        assert!(err.reason.contains("501 tokens"));
    }

    #[test]
    fn test_cta_pattern_without_cap_is_ignored() {
        let mut policy = GuardPolicy::default();
        policy.set_rule(
            Role::Suggestion,
            GuardRule {
                max_tokens: 150,
                max_sentences: None,
                cta_pattern: Some(DEFAULT_CTA_PATTERN.to_string()),
                max_cta_matches: None,
            },
        );
        let guard = OutputGuard::new(&policy).unwrap();
        assert!(guard
            .enforce(Role::Suggestion, "Review. Review. Review. Delay.")
            .is_ok());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let mut policy = GuardPolicy::default();
        policy.set_rule(
            Role::Suggestion,
            GuardRule {
                max_tokens: 150,
                max_sentences: Some(2),
                cta_pattern: Some("(unclosed".to_string()),
                max_cta_matches: Some(1),
            },
        );
        assert!(matches!(
            OutputGuard::new(&policy),
            Err(PolicyError::InvalidPattern { role: Role::Suggestion, .. })
        ));
    }

    #[test]
    fn test_policy_deserializes_partial_yaml_shape() {
        let policy: GuardPolicy =
            serde_json::from_str(r#"{"suggestion": {"max_tokens": 40, "max_sentences": 1}}"#)
                .unwrap();

        assert_eq!(policy.rule(Role::Suggestion).max_tokens, 40);
        assert_eq!(policy.rule(Role::Suggestion).cta_pattern, None);
        // Missing roles fall back to defaults
        assert_eq!(policy.rule(Role::Planning).max_tokens, 500);
    }

    proptest! {
        #[test]
        fn prop_accepted_text_is_stable(words in proptest::collection::vec("[a-z]{1,8}", 1..20)) {
            let guard = OutputGuard::with_defaults();
            let text = format!("{}.", words.join(" "));
            if let Ok(first) = guard.enforce(Role::Planning, &text) {
                prop_assert_eq!(guard.enforce(Role::Planning, &first).unwrap(), first.clone());
            }
        }
    }
}
