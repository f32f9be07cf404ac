//! Stage configuration: an ordered bag of named scalar parameters.

use crate::errors::StageError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Immutable mapping of named parameters (strings, numbers, booleans)
/// consumed by one stage.
///
/// A stage's effective config is its stage-local defaults overlaid with
/// the upstream-propagated fields, upstream values winning for any key
/// present in both. Keys are kept sorted so env-var rendering and
/// serialization are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageConfig {
    values: BTreeMap<String, serde_json::Value>,
}

impl StageConfig {
    /// Creates an empty config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, replacing any existing entry for the key.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Gets a raw value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Gets a string value. Non-string values yield `None`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(serde_json::Value::as_str)
    }

    /// String form of a scalar value: strings as-is, numbers and booleans
    /// via their canonical text form. Arrays, objects, and null yield
    /// `None` - stage configs hold scalars only.
    #[must_use]
    pub fn string_value(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// String form of a scalar, or the given default when the key is
    /// absent or non-scalar.
    #[must_use]
    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.string_value(key).unwrap_or_else(|| default.to_string())
    }

    /// Requires a scalar value, rendered as a string.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the key when it is missing or
    /// not a scalar. No side effects have been attempted at that point.
    pub fn require(&self, key: &str) -> Result<String, StageError> {
        self.string_value(key)
            .ok_or_else(|| StageError::config(format!("Missing required configuration: {key}")))
    }

    /// Requires every listed key to be present as a scalar.
    ///
    /// # Errors
    ///
    /// Returns a single configuration error naming every missing key.
    pub fn require_all(&self, keys: &[&str]) -> Result<(), StageError> {
        let missing: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| self.string_value(key).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StageError::config(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }

    /// Checks if a key exists.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns this config overlaid with another; the other side wins any
    /// key collision.
    #[must_use]
    pub fn overlaid_with(&self, upstream: &Self) -> Self {
        let mut merged = self.clone();
        merged.extend(upstream);
        merged
    }

    /// Merges another config into this one, overwriting collisions with
    /// the newer value. Never removes a key.
    pub fn extend(&mut self, other: &Self) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.values.iter()
    }

    /// Returns all keys in order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the config is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<'a> IntoIterator for &'a StageConfig {
    type Item = (&'a String, &'a serde_json::Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, serde_json::Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
