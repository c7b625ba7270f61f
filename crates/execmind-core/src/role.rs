//! Dispatch roles and routing intent flags.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The category of a dispatch request.
///
/// A role drives both routing (which model, how many tokens) and output
/// policy (what the generated text may look like). Adding a variant forces
/// a router arm and a default guard rule through exhaustive matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Role {
    /// Task decomposition and prioritization
    #[serde(alias = "planner")]
    Planning,

    /// Short proactive nudges shown to the user
    Suggestion,
}

impl Role {
    /// Every known role, in declaration order.
    pub const ALL: [Role; 2] = [Role::Planning, Role::Suggestion];

    /// Stable lowercase name used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Planning => "planning",
            Role::Suggestion => "suggestion",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a role name is not recognized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown role: '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "planning" | "planner" => Ok(Role::Planning),
            "suggestion" => Ok(Role::Suggestion),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// How much reasoning the caller wants; selects the token tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    Low,
    #[default]
    Medium,
    High,
}

/// Spend preference. `Low` forces the economy model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Low,
    #[default]
    Standard,
    High,
}

/// Routing intent supplied with each dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IntentFlags {
    /// Requested depth (defaults to medium)
    #[serde(default)]
    pub depth: Option<Depth>,

    /// Spend preference
    #[serde(default)]
    pub budget: Option<Budget>,

    /// Prefer terse, cheap output
    #[serde(default)]
    pub quiet: bool,
}

impl IntentFlags {
    /// Set the depth.
    pub fn with_depth(mut self, depth: Depth) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Set the budget.
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Mark the request as quiet.
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }

    /// Depth with the medium default applied.
    pub fn effective_depth(&self) -> Depth {
        self.depth.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing_accepts_legacy_name() {
        assert_eq!("planner".parse::<Role>().unwrap(), Role::Planning);
        assert_eq!("Planning".parse::<Role>().unwrap(), Role::Planning);
        assert_eq!(" suggestion ".parse::<Role>().unwrap(), Role::Suggestion);
        assert!("critic".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_roundtrip_names() {
        let json = serde_json::to_string(&Role::Suggestion).unwrap();
        assert_eq!(json, "\"suggestion\"");

        let role: Role = serde_json::from_str("\"planner\"").unwrap();
        assert_eq!(role, Role::Planning);
    }

    #[test]
    fn test_flags_default_to_medium_depth() {
        let flags = IntentFlags::default();
        assert_eq!(flags.effective_depth(), Depth::Medium);
        assert!(!flags.quiet);

        let flags = IntentFlags::default().with_depth(Depth::High).quiet();
        assert_eq!(flags.effective_depth(), Depth::High);
        assert!(flags.quiet);
    }

    #[test]
    fn test_flags_deserialize_partial() {
        let flags: IntentFlags = serde_json::from_str(r#"{"budget": "low"}"#).unwrap();
        assert_eq!(flags.budget, Some(Budget::Low));
        assert_eq!(flags.depth, None);
        assert!(!flags.quiet);
    }
}
