use crate::core::{DynError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of value a schema field holds.
///
/// Stored and parsed by its token (`"IntegerField"`, `"CharField"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Integer,
    Char,
    Text,
    Email,
    Boolean,
    Dropdown,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        Self::Integer,
        Self::Char,
        Self::Text,
        Self::Email,
        Self::Boolean,
        Self::Dropdown,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Self::Integer => "IntegerField",
            Self::Char => "CharField",
            Self::Text => "TextField",
            Self::Email => "EmailField",
            Self::Boolean => "BooleanField",
            Self::Dropdown => "Dropdown",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Integer => "Integer number field",
            Self::Char => "One line of text",
            Self::Text => "Multiline text input",
            Self::Email => "Email",
            Self::Boolean => "Yes/No",
            Self::Dropdown => "Dropdown",
        }
    }

    /// (token, description) pairs for admin type pickers.
    pub fn choices() -> Vec<(&'static str, &'static str)> {
        Self::ALL.iter().map(|t| (t.token(), t.description())).collect()
    }
}

impl FromStr for FieldType {
    type Err = DynError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.token() == s)
            .ok_or_else(|| DynError::ValidationError(format!("'{}' is not a valid field type", s)))
    }
}

impl TryFrom<String> for FieldType {
    type Error = DynError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.token().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}
