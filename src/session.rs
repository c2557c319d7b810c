//! Session-scoped property overrides.
//!
//! Every statement carries an ordered map of property overrides, seeded from
//! the connection-level defaults at statement creation and mutated only by
//! in-band `SET k = v` directives. Each job submission reads (never mutates)
//! the map and ships it as a single JSON settings value.

use std::collections::HashMap;

/// Insertion-ordered mapping of session property name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionProperties {
    entries: Vec<(String, String)>,
}

impl SessionProperties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a property set from connection-level defaults.
    ///
    /// The defaults are inserted in sorted key order so a statement's
    /// starting point is deterministic regardless of map iteration order.
    pub fn from_defaults(defaults: &HashMap<String, String>) -> Self {
        let mut keys: Vec<&String> = defaults.keys().collect();
        keys.sort();
        let entries = keys
            .into_iter()
            .map(|k| (k.clone(), defaults[k].clone()))
            .collect();
        Self { entries }
    }

    /// Sets a property, replacing the value in place if the key exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Looks up a property value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of properties set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serializes the properties as the JSON settings payload attached to a
    /// job description.
    pub fn to_json(&self) -> String {
        let mut map = serde_json::Map::new();
        for (k, v) in &self.entries {
            map.insert(k.clone(), serde_json::Value::String(v.clone()));
        }
        serde_json::Value::Object(map).to_string()
    }
}
