//! Request fingerprints for the response cache.
//!
//! A fingerprint is `role:prompt_version:hash`, where the hash covers the
//! prompt variables after normalization:
//! - keys are sorted
//! - non-scalar values (objects, arrays, null) are replaced by their JSON text
//!
//! so that semantically identical variable sets always collide.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use crate::role::Role;

/// Hex characters kept from the digest.
const HASH_LEN: usize = 12;

/// Normalize prompt variables for hashing.
pub fn normalize_variables<'a, I>(variables: I) -> BTreeMap<String, JsonValue>
where
    I: IntoIterator<Item = (&'a String, &'a JsonValue)>,
{
    variables
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                JsonValue::String(_) | JsonValue::Number(_) | JsonValue::Bool(_) => value.clone(),
                other => JsonValue::String(other.to_string()),
            };
            (key.clone(), value)
        })
        .collect()
}

/// Short, stable hash of normalized prompt variables.
pub fn context_hash<'a, I>(variables: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a JsonValue)>,
{
    let normalized = normalize_variables(variables);
    // BTreeMap serializes in key order, giving a canonical string.
    let canonical = serde_json::to_string(&normalized).unwrap_or_default();

    let digest = Sha256::digest(canonical.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}

/// Cache key identifying a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Derive the fingerprint for a request.
    pub fn new<'a, I>(role: Role, prompt_version: &str, variables: I) -> Self
    where
        I: IntoIterator<Item = (&'a String, &'a JsonValue)>,
    {
        Self(format!(
            "{}:{}:{}",
            role.as_str(),
            prompt_version,
            context_hash(variables)
        ))
    }

    /// The key as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
