use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a schema: the base record type plus the discriminator value
/// read off the record. An empty discriminator selects the default schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaKey {
    pub base_type: String,
    pub discriminator: String,
}

impl SchemaKey {
    pub fn new(base_type: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            base_type: base_type.into(),
            discriminator: discriminator.into(),
        }
    }

    /// Key of the type-less schema for `base_type`.
    pub fn untyped(base_type: impl Into<String>) -> Self {
        Self::new(base_type, "")
    }

    /// Cache key under `namespace`.
    ///
    /// The base type is length-prefixed so that no two distinct keys render
    /// to the same string, whatever characters they contain.
    pub fn cache_key(&self, namespace: &str) -> String {
        format!(
            "{}:{}:{}:{}",
            namespace,
            self.base_type.len(),
            self.base_type,
            self.discriminator
        )
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.discriminator.is_empty() {
            write!(f, "{}", self.base_type)
        } else {
            write!(f, "{} ({})", self.base_type, self.discriminator)
        }
    }
}
