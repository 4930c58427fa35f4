//! Attribute bag: the per-record map of dynamic field values.
//!
//! The bag is persisted as a single JSON object text inside the record row.

use crate::core::{DynError, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeBag {
    values: BTreeMap<String, Value>,
}

/// Keys touched by one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub removed: Vec<String>,
    pub added: Vec<String>,
}

impl Reconciliation {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a persisted bag. An empty text is treated as an empty object.
    pub fn decode(encoded: &str) -> Result<Self> {
        if encoded.trim().is_empty() {
            return Ok(Self::new());
        }
        serde_json::from_str(encoded)
            .map_err(|err| DynError::DecodeError(format!("attribute bag got non-valid JSON: {}", err)))
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.values)?)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Make the key set exactly `names`: stale keys are dropped, missing keys
    /// are inserted as `Null`. Values of surviving keys are untouched.
    pub fn reconcile<'a, I>(&mut self, names: I) -> Reconciliation
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: Vec<&str> = names.into_iter().collect();

        let removed: Vec<String> = self
            .values
            .keys()
            .filter(|key| !wanted.contains(&key.as_str()))
            .cloned()
            .collect();
        for key in &removed {
            self.values.remove(key);
        }

        let mut added = Vec::new();
        for name in wanted {
            if !self.values.contains_key(name) {
                self.values.insert(name.to_string(), Value::Null);
                added.push(name.to_string());
            }
        }

        Reconciliation { removed, added }
    }
}

impl FromIterator<(String, Value)> for AttributeBag {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
